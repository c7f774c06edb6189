use std::collections::HashMap;

use super::frame::FrameId;
use crate::storage::PageId;

/// Maps resident page ids to the frame holding them.
///
/// An entry exists exactly while the page occupies a frame: it is inserted when the
/// page is read into a frame and removed when the page is evicted or freed.
pub struct PageDirectory {
    entries: HashMap<PageId, FrameId>,
}

impl PageDirectory {
    pub fn with_capacity(capacity: usize) -> Self {
        PageDirectory {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Returns None if the page is not in the buffer pool
    pub fn get(&self, page_id: PageId) -> Option<FrameId> {
        self.entries.get(&page_id).copied()
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.entries.contains_key(&page_id)
    }

    /// Returns the frame previously mapped to the page, if any
    pub fn insert(&mut self, page_id: PageId, frame_id: FrameId) -> Option<FrameId> {
        debug_assert!(page_id.is_valid(), "The invalid page id cannot be resident");
        self.entries.insert(page_id, frame_id)
    }

    pub fn remove(&mut self, page_id: PageId) -> Option<FrameId> {
        self.entries.remove(&page_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PageId, FrameId)> + '_ {
        self.entries.iter().map(|(page_id, frame_id)| (*page_id, *frame_id))
    }
}
