use crate::config::PAGE_SIZE;
use crate::storage::PageId;

/// The Buffer Pool frame id for internal use only. It is not associated with the page id.
pub type FrameId = u16;

/// Bookkeeping for one frame of the pool.
///
/// A descriptor with an invalid page id is EMPTY: it is never pinned nor dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub page_id: PageId,
    /// How many callers are holding this page. A page can only be evicted if pin_count is 0.
    pub pin_count: u32,
    pub is_dirty: bool,
}

impl FrameDescriptor {
    pub const EMPTY: FrameDescriptor = FrameDescriptor {
        page_id: PageId::INVALID,
        pin_count: 0,
        is_dirty: false,
    };

    pub fn is_empty(&self) -> bool {
        !self.page_id.is_valid()
    }
}

impl Default for FrameDescriptor {
    fn default() -> Self {
        FrameDescriptor::EMPTY
    }
}

pub struct Frame {
    pub descriptor: FrameDescriptor,
    /// Heap allocated frame of size PAGE_SIZE.
    /// It is only guaranteed to contain valid page data if the descriptor is not empty.
    pub data: Box<[u8]>,
}

impl Frame {
    pub fn new() -> Self {
        Frame {
            descriptor: FrameDescriptor::EMPTY,
            data: vec![0u8; PAGE_SIZE].into_boxed_slice(),
        }
    }

    /// Marks the frame as holding a freshly loaded page, pinned once
    pub fn load(&mut self, page_id: PageId) {
        self.descriptor = FrameDescriptor {
            page_id,
            pin_count: 1,
            is_dirty: false,
        };
    }

    /// Forgets the page held by the frame. The bytes are left as they are.
    pub fn reset(&mut self) {
        self.descriptor = FrameDescriptor::EMPTY;
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::new()
    }
}
