use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::disk_store::{check_buffer_size, check_run, find_free_run, DiskStore};
use crate::{config::PAGE_SIZE, errors::StorageError, storage::PageId};

const THE_EMPTY_PAGE: [u8; PAGE_SIZE] = [0u8; PAGE_SIZE];

/// Written at the start of deallocated pages so they stay free across reopens.
/// Allocation zeroes the page, which clears it.
const FREE_PAGE_MARKER: &[u8; 16] = b"framedb:freepage";

/// Disk store over any seekable byte stream (usually the database file).
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`. Deallocated pages are stamped
/// with a marker, so a reopened stream knows which of its pages are free. Freed
/// slots are reused by later allocations.
pub struct DiskManager<F: Read + Write + Seek> {
    file: F,
    /// Allocation map, indexed by page id
    allocated: Vec<bool>,
}

impl DiskManager<fs::File> {
    /// Opens the database file, creating it if it does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        log::info!("Opened database file {:?}", path.as_ref());
        DiskManager::new(file)
    }
}

impl<F: Read + Write + Seek> DiskManager<F> {
    pub fn new(mut file: F) -> Result<Self, StorageError> {
        let len = file.seek(SeekFrom::End(0))?;
        if len % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "stream length {len} is not a multiple of the page size {PAGE_SIZE}"
            )));
        }

        let n_pages = (len / PAGE_SIZE as u64) as usize;
        let mut allocated = Vec::with_capacity(n_pages);
        let mut marker = *FREE_PAGE_MARKER;
        for index in 0..n_pages {
            file.seek(SeekFrom::Start(PageId::new(index as u32).file_offset()))?;
            file.read_exact(&mut marker)?;
            allocated.push(&marker != FREE_PAGE_MARKER);
        }

        let disk = DiskManager { file, allocated };
        log::debug!(
            "Disk manager found {n_pages} page(s), {} allocated",
            disk.allocated_page_count()
        );
        Ok(disk)
    }

    /// Number of pages currently allocated
    pub fn allocated_page_count(&self) -> usize {
        self.allocated.iter().filter(|in_use| **in_use).count()
    }

    pub fn into_inner(self) -> F {
        self.file
    }

    fn check_allocated(&self, page_id: PageId) -> Result<(), StorageError> {
        match self.allocated.get(page_id.get() as usize) {
            Some(true) => Ok(()),
            _ => Err(StorageError::PageNotAllocated(page_id)),
        }
    }
}

impl<F: Read + Write + Seek> DiskStore for DiskManager<F> {
    fn allocate_page(&mut self, count: u32) -> Result<PageId, StorageError> {
        if count == 0 {
            return Err(StorageError::InvalidRunSize(count));
        }
        let count = count as usize;

        let start = find_free_run(&self.allocated, count).unwrap_or_else(|| {
            let tail_free = self.allocated.iter().rev().take_while(|in_use| !**in_use).count();
            self.allocated.len() - tail_free
        });
        if start + count > u32::MAX as usize {
            return Err(StorageError::StorageFull);
        }

        // New pages always start zeroed, whether they extend the stream or reuse
        // a freed slot
        self.file
            .seek(SeekFrom::Start(PageId::new(start as u32).file_offset()))?;
        for _ in 0..count {
            self.file.write_all(&THE_EMPTY_PAGE)?;
        }

        if self.allocated.len() < start + count {
            self.allocated.resize(start + count, false);
        }
        for in_use in &mut self.allocated[start..start + count] {
            *in_use = true;
        }

        log::debug!("Allocated {count} page(s) starting at page_id={start}");
        Ok(PageId::new(start as u32))
    }

    fn deallocate_page(&mut self, page_id: PageId, count: u32) -> Result<(), StorageError> {
        let range = check_run(&self.allocated, page_id, count)?;
        for index in range.clone() {
            self.file
                .seek(SeekFrom::Start(PageId::new(index as u32).file_offset()))?;
            self.file.write_all(FREE_PAGE_MARKER)?;
        }
        for index in range {
            self.allocated[index] = false;
        }
        log::debug!("Deallocated {count} page(s) starting at page_id={page_id}");
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        check_buffer_size(buf.len())?;
        self.check_allocated(page_id)?;

        log::trace!("Reading page_id={page_id}");
        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        check_buffer_size(buf.len())?;
        self.check_allocated(page_id)?;

        log::trace!("Writing page_id={page_id}");
        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.file.flush()?;
        Ok(())
    }
}
