use super::disk_store::{check_buffer_size, check_run, find_free_run, DiskStore};
use crate::config::PAGE_SIZE;
use crate::errors::StorageError;
use crate::storage::PageId;

/// Disk store kept entirely in memory. Used by tests and by throwaway databases.
#[derive(Default)]
pub struct MemoryDisk {
    pages: Vec<Box<[u8]>>,
    /// Allocation map, indexed by page id
    allocated: Vec<bool>,
    /// Upper bound on the number of page slots, None for unbounded
    max_pages: Option<usize>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        MemoryDisk::default()
    }

    /// A store that refuses to grow past `max_pages` page slots
    pub fn with_max_pages(max_pages: usize) -> Self {
        MemoryDisk {
            max_pages: Some(max_pages),
            ..MemoryDisk::default()
        }
    }

    /// Number of pages currently allocated
    pub fn allocated_page_count(&self) -> usize {
        self.allocated.iter().filter(|in_use| **in_use).count()
    }

    pub fn is_allocated(&self, page_id: PageId) -> bool {
        self.allocated
            .get(page_id.get() as usize)
            .copied()
            .unwrap_or(false)
    }

    fn page_index(&self, page_id: PageId) -> Result<usize, StorageError> {
        if self.is_allocated(page_id) {
            Ok(page_id.get() as usize)
        } else {
            Err(StorageError::PageNotAllocated(page_id))
        }
    }
}

impl DiskStore for MemoryDisk {
    fn allocate_page(&mut self, count: u32) -> Result<PageId, StorageError> {
        if count == 0 {
            return Err(StorageError::InvalidRunSize(count));
        }
        let count = count as usize;

        let start = match find_free_run(&self.allocated, count) {
            Some(start) => start,
            None => {
                // A free tail can be extended in place
                let tail_free = self.allocated.iter().rev().take_while(|in_use| !**in_use).count();
                let start = self.allocated.len() - tail_free;
                let new_len = start + count;
                if self.max_pages.is_some_and(|max| new_len > max) || new_len > u32::MAX as usize {
                    return Err(StorageError::StorageFull);
                }
                self.allocated.resize(new_len, false);
                self.pages
                    .resize_with(new_len, || vec![0u8; PAGE_SIZE].into_boxed_slice());
                start
            }
        };

        for index in start..start + count {
            self.allocated[index] = true;
            self.pages[index].fill(0);
        }

        log::debug!("Allocated {count} page(s) starting at page_id={start}");
        Ok(PageId::new(start as u32))
    }

    fn deallocate_page(&mut self, page_id: PageId, count: u32) -> Result<(), StorageError> {
        let range = check_run(&self.allocated, page_id, count)?;
        for index in range {
            self.allocated[index] = false;
        }
        log::debug!("Deallocated {count} page(s) starting at page_id={page_id}");
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        check_buffer_size(buf.len())?;
        let index = self.page_index(page_id)?;
        buf.copy_from_slice(&self.pages[index]);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        check_buffer_size(buf.len())?;
        let index = self.page_index(page_id)?;
        self.pages[index].copy_from_slice(buf);
        Ok(())
    }
}
