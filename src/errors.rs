use std::error::Error;

use crate::storage::{PageId, RecordId};

#[derive(Debug)]
pub enum StorageError {
    IOError(std::io::Error),
    /// The page was never allocated, or it was deallocated.
    PageNotAllocated(PageId),
    /// Page buffers must be exactly PAGE_SIZE bytes.
    InvalidBufferSize { expected: usize, actual: usize },
    /// Allocation of a run with a non-positive length.
    InvalidRunSize(u32),
    /// The store cannot grow to hold the requested pages.
    StorageFull,
    /// The backing stream does not hold a whole number of pages.
    Corrupted(String),
}

#[derive(Debug)]
pub enum BufferPoolError {
    /// Every frame is pinned, so no page can be brought into the pool.
    PoolExhausted,
    /// The requested page is not resident in the buffer pool.
    PageNotFound(PageId),
    /// The page is resident but its pin count is already 0.
    PageNotPinned(PageId),
    /// The page is still pinned by someone else and cannot be freed.
    PagePinned(PageId),
    /// Derived error from the disk store
    Storage(StorageError),
}

#[derive(Debug)]
pub enum HeapError {
    /// The record cannot fit in an empty page.
    RecordTooLarge(usize),
    /// The record id does not point to a live record of this heap file.
    InvalidRecordId(RecordId),
    /// Updates must keep the record length unchanged.
    InvalidUpdate(RecordId),
    /// The page chain of the heap file loops back on itself, or reaches a page
    /// that is not a heap page.
    BrokenChain(PageId),
    /// File names must be non empty.
    InvalidFileName(String),
    /// The file catalog page has no room for another entry.
    CatalogFull,
    /// The page does not hold a file catalog.
    CorruptedCatalog(PageId),
    BufferPool(BufferPoolError),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::IOError(err) => write!(f, "IO error: {}", err),
            StorageError::PageNotAllocated(page_id) => {
                write!(f, "Page {} is not allocated", page_id)
            }
            StorageError::InvalidBufferSize { expected, actual } => {
                write!(f, "Invalid buffer size: expected {}, got {}", expected, actual)
            }
            StorageError::InvalidRunSize(count) => write!(f, "Invalid run size: {}", count),
            StorageError::StorageFull => write!(f, "Storage is full"),
            StorageError::Corrupted(msg) => write!(f, "Corrupted storage: {}", msg),
        }
    }
}

impl std::fmt::Display for BufferPoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferPoolError::PoolExhausted => write!(f, "Buffer pool exhausted: all frames are pinned"),
            BufferPoolError::PageNotFound(page_id) => {
                write!(f, "Page {} not found in buffer pool", page_id)
            }
            BufferPoolError::PageNotPinned(page_id) => write!(f, "Page {} is not pinned", page_id),
            BufferPoolError::PagePinned(page_id) => {
                write!(f, "Page {} is still pinned and cannot be freed", page_id)
            }
            BufferPoolError::Storage(err) => write!(f, "Storage error: {}", err),
        }
    }
}

impl std::fmt::Display for HeapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeapError::RecordTooLarge(len) => write!(f, "Record of {} bytes is too large", len),
            HeapError::InvalidRecordId(rid) => write!(f, "Invalid record id {}", rid),
            HeapError::InvalidUpdate(rid) => {
                write!(f, "Invalid update of record {}: length must not change", rid)
            }
            HeapError::BrokenChain(page_id) => {
                write!(f, "Heap file page chain is broken at page {}", page_id)
            }
            HeapError::InvalidFileName(name) => write!(f, "Invalid heap file name {:?}", name),
            HeapError::CatalogFull => write!(f, "File catalog is full"),
            HeapError::CorruptedCatalog(page_id) => {
                write!(f, "Page {} does not hold a file catalog", page_id)
            }
            HeapError::BufferPool(err) => write!(f, "Buffer pool error: {}", err),
        }
    }
}

impl std::convert::From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IOError(err)
    }
}

impl std::convert::From<StorageError> for BufferPoolError {
    fn from(err: StorageError) -> Self {
        BufferPoolError::Storage(err)
    }
}

impl std::convert::From<BufferPoolError> for HeapError {
    fn from(err: BufferPoolError) -> Self {
        HeapError::BufferPool(err)
    }
}

impl std::convert::From<StorageError> for HeapError {
    fn from(err: StorageError) -> Self {
        HeapError::BufferPool(BufferPoolError::Storage(err))
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::IOError(err) => Some(err),
            _ => None,
        }
    }
}

impl Error for BufferPoolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BufferPoolError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl Error for HeapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HeapError::BufferPool(err) => Some(err),
            _ => None,
        }
    }
}
