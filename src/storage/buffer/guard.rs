use super::buffer_pool::{BufferPoolResult, SharedBufferPool};
use crate::storage::disk::DiskStore;
use crate::storage::PageId;

/// A pinned page that unpins itself when dropped.
///
/// The guard does not keep the pool borrowed: `read` and `write` borrow it only for
/// the duration of the closure, so the closure must not touch the pool itself.
pub struct PageGuard<D: DiskStore> {
    pool: SharedBufferPool<D>,
    page_id: PageId,
    is_dirty: bool,
    released: bool,
}

impl<D: DiskStore> PageGuard<D> {
    /// Pins an existing page, reading it from disk if it is not resident
    pub fn pin(pool: &SharedBufferPool<D>, page_id: PageId) -> BufferPoolResult<Self> {
        pool.borrow_mut().pin(page_id, false)?;
        Ok(PageGuard::new(pool.clone(), page_id))
    }

    /// Allocates `how_many` pages on disk and pins the first one. Its contents are
    /// unspecified until the caller formats them.
    pub fn allocate(pool: &SharedBufferPool<D>, how_many: u32) -> BufferPoolResult<Self> {
        let page_id = pool.borrow_mut().allocate(how_many)?;
        let mut guard = PageGuard::new(pool.clone(), page_id);
        // A fresh page has to reach the disk even if the caller never writes it
        guard.mark_dirty();
        Ok(guard)
    }

    fn new(pool: SharedBufferPool<D>, page_id: PageId) -> Self {
        PageGuard {
            pool,
            page_id,
            is_dirty: false,
            released: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> BufferPoolResult<R> {
        let pool = self.pool.borrow();
        let data = pool.page(self.page_id)?;
        Ok(f(data))
    }

    /// Gives mutable access to the page and marks it dirty
    pub fn write<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> BufferPoolResult<R> {
        let mut pool = self.pool.borrow_mut();
        let data = pool.page_mut(self.page_id)?;
        self.is_dirty = true;
        Ok(f(data))
    }

    /// Unpins the page now and reports whether that worked
    pub fn release(mut self) -> BufferPoolResult<()> {
        self.released = true;
        let result = self.pool.borrow_mut().unpin(self.page_id, self.is_dirty);
        result
    }
}

impl<D: DiskStore> Drop for PageGuard<D> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.pool.try_borrow_mut() {
            Ok(mut pool) => {
                if let Err(err) = pool.unpin(self.page_id, self.is_dirty) {
                    log::error!("Failed to unpin page_id={} on drop: {err}", self.page_id);
                }
            }
            Err(_) => log::error!(
                "Buffer pool is borrowed, leaking the pin of page_id={}",
                self.page_id
            ),
        }
    }
}
