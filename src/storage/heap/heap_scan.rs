use crate::errors::HeapError;
use crate::storage::buffer::{PageGuard, SharedBufferPool};
use crate::storage::disk::DiskStore;
use crate::storage::page::SlottedPage;
use crate::storage::{PageId, RecordId, Tuple};

use super::heap_file::HeapResult;

/// The page a scan is positioned on, kept pinned until the scan moves past it
struct ScanPosition<D: DiskStore> {
    guard: PageGuard<D>,
    /// Next slot to return on this page, None once the page is exhausted
    next_slot: Option<u16>,
}

impl<D: DiskStore> ScanPosition<D> {
    fn open(pool: &SharedBufferPool<D>, page_id: PageId) -> HeapResult<Self> {
        let guard = PageGuard::pin(pool, page_id)?;
        let next_slot = guard.read(|data| SlottedPage::new(data).first_record())?;
        Ok(ScanPosition { guard, next_slot })
    }

    fn next_record(&mut self) -> HeapResult<Option<(RecordId, Tuple)>> {
        let Some(slot) = self.next_slot else {
            return Ok(None);
        };

        let (tuple, next_slot) = self.guard.read(|data| {
            let page = SlottedPage::new(data);
            (page.select_record(slot).map(Tuple::from), page.next_record(slot))
        })?;
        self.next_slot = next_slot;

        let rid = RecordId::new(self.guard.page_id(), slot);
        tuple.map(|tuple| Some((rid, tuple))).ok_or(HeapError::InvalidRecordId(rid))
    }
}

/// Sequential scan over the records of a heap file, in page chain order.
///
/// At most one page is pinned at a time. The pin is released when the scan moves to
/// the next page, when it is exhausted, when `close` is called, or when the scan is
/// dropped.
pub struct HeapScan<D: DiskStore> {
    pool: SharedBufferPool<D>,
    pages: std::vec::IntoIter<PageId>,
    current: Option<ScanPosition<D>>,
}

impl<D: DiskStore> HeapScan<D> {
    pub(super) fn new(pool: SharedBufferPool<D>, pages: Vec<PageId>) -> Self {
        HeapScan {
            pool,
            pages: pages.into_iter(),
            current: None,
        }
    }

    /// Stops the scan and unpins the current page
    pub fn close(mut self) -> HeapResult<()> {
        self.pages = Vec::new().into_iter();
        self.release_current()
    }

    fn release_current(&mut self) -> HeapResult<()> {
        if let Some(position) = self.current.take() {
            position.guard.release()?;
        }
        Ok(())
    }
}

impl<D: DiskStore> Iterator for HeapScan<D> {
    type Item = HeapResult<(RecordId, Tuple)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let page_id = self.pages.next()?;
                match ScanPosition::open(&self.pool, page_id) {
                    Ok(position) => self.current = Some(position),
                    Err(err) => {
                        self.pages = Vec::new().into_iter();
                        return Some(Err(err));
                    }
                }
            }

            let step = match self.current.as_mut() {
                Some(position) => position.next_record(),
                None => continue,
            };

            match step {
                Ok(Some(item)) => return Some(Ok(item)),
                Ok(None) => {
                    if let Err(err) = self.release_current() {
                        return Some(Err(err));
                    }
                }
                Err(err) => {
                    self.pages = Vec::new().into_iter();
                    let _ = self.release_current();
                    return Some(Err(err));
                }
            }
        }
    }
}
