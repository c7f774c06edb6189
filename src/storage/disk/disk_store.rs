use crate::errors::StorageError;
use crate::storage::PageId;

/// Raw page storage consumed by the buffer pool.
///
/// All calls are blocking and complete before returning. Page buffers handed to
/// `read_page` and `write_page` must be exactly PAGE_SIZE bytes long.
pub trait DiskStore {
    /// Reserves `count` contiguous pages and returns the id of the first one.
    fn allocate_page(&mut self, count: u32) -> Result<PageId, StorageError>;

    /// Releases `count` pages starting at `page_id`.
    fn deallocate_page(&mut self, page_id: PageId, count: u32) -> Result<(), StorageError>;

    /// Fills `buf` with the persisted bytes of the page.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Persists `buf` as the contents of the page.
    fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError>;

    /// Pushes buffered writes down to the underlying medium.
    fn sync(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// First-fit search for `count` consecutive free slots. Returns the index of the
/// first slot of the run, or None if the run must be appended at the end.
pub(super) fn find_free_run(allocated: &[bool], count: usize) -> Option<usize> {
    let mut run_start = 0;
    let mut run_len = 0;

    for (index, in_use) in allocated.iter().enumerate() {
        if *in_use {
            run_len = 0;
            continue;
        }
        if run_len == 0 {
            run_start = index;
        }
        run_len += 1;
        if run_len == count {
            return Some(run_start);
        }
    }

    None
}

pub(super) fn check_buffer_size(len: usize) -> Result<(), StorageError> {
    use crate::config::PAGE_SIZE;

    if len != PAGE_SIZE {
        return Err(StorageError::InvalidBufferSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

/// Validates a deallocation request against the allocation map
pub(super) fn check_run(
    allocated: &[bool],
    page_id: PageId,
    count: u32,
) -> Result<std::ops::Range<usize>, StorageError> {
    if count == 0 {
        return Err(StorageError::InvalidRunSize(count));
    }
    let start = page_id.get() as usize;
    let range = start..start + count as usize;

    if let Some(missing) = range.clone().find(|i| !allocated.get(*i).copied().unwrap_or(false)) {
        return Err(StorageError::PageNotAllocated(PageId::new(missing as u32)));
    }
    Ok(range)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_find_free_run() {
        assert_eq!(find_free_run(&[], 1), None);
        assert_eq!(find_free_run(&[true, false, true], 1), Some(1));
        assert_eq!(find_free_run(&[true, false, true, false, false], 2), Some(3));
        assert_eq!(find_free_run(&[false, true, false], 2), None);
    }

    #[test]
    fn test_check_run() {
        let allocated = [true, true, false];
        assert_eq!(check_run(&allocated, PageId::new(0), 2).unwrap(), 0..2);
        assert!(matches!(
            check_run(&allocated, PageId::new(1), 2),
            Err(StorageError::PageNotAllocated(id)) if id == PageId::new(2)
        ));
        assert!(matches!(
            check_run(&allocated, PageId::new(0), 0),
            Err(StorageError::InvalidRunSize(0))
        ));
        assert!(matches!(
            check_run(&allocated, PageId::INVALID, 1),
            Err(StorageError::PageNotAllocated(_))
        ));
    }
}
