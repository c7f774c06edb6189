use std::collections::{HashMap, HashSet};

use super::file_catalog::FileCatalog;
use super::heap_scan::HeapScan;
use crate::errors::{BufferPoolError, HeapError};
use crate::storage::buffer::{PageGuard, SharedBufferPool};
use crate::storage::disk::DiskStore;
use crate::storage::page::{SlotError, SlottedPage, MAX_RECORD_SIZE, SLOTTED_PAGE_SLOT_SIZE};
use crate::storage::{PageId, RecordId, Tuple};

pub type HeapResult<T> = Result<T, HeapError>;

/// An unordered set of records stored on a doubly linked chain of slotted pages.
///
/// The heap file never keeps a page pinned between calls. It receives the buffer
/// pool it works with at construction time.
pub struct HeapFile<D: DiskStore> {
    pool: SharedBufferPool<D>,
    /// Pages in chain order. The first one never changes.
    pages: Vec<PageId>,
    /// Contiguous free bytes of every page of the file
    free_space: HashMap<PageId, usize>,
    record_count: usize,
    /// Catalog entry of a named file
    entry: Option<(FileCatalog, String)>,
    /// Temporary files give their pages back when dropped
    temporary: bool,
    deleted: bool,
}

impl<D: DiskStore> HeapFile<D> {
    /// Creates a new, empty heap file made of a single page
    pub fn create(pool: SharedBufferPool<D>) -> HeapResult<Self> {
        let mut guard = PageGuard::allocate(&pool, 1)?;
        let free = guard.write(|data| {
            let mut page = SlottedPage::new(data);
            page.init();
            page.free_space()
        })?;
        let first_page = guard.page_id();
        guard.release()?;

        log::debug!("Created heap file starting at page_id={first_page}");
        Ok(HeapFile {
            pool,
            pages: vec![first_page],
            free_space: HashMap::from([(first_page, free)]),
            record_count: 0,
            entry: None,
            temporary: false,
            deleted: false,
        })
    }

    /// Creates a heap file whose pages are freed when it goes out of scope
    pub fn temporary(pool: SharedBufferPool<D>) -> HeapResult<Self> {
        let mut file = HeapFile::create(pool)?;
        file.temporary = true;
        Ok(file)
    }

    /// Opens the file registered under `name` in the catalog, or creates and
    /// registers it if there is none.
    pub fn open_or_create(
        pool: SharedBufferPool<D>,
        catalog: FileCatalog,
        name: &str,
    ) -> HeapResult<Self> {
        if name.is_empty() {
            return Err(HeapError::InvalidFileName(name.to_string()));
        }

        let mut file = match catalog.lookup(&pool, name)? {
            Some(first_page) => HeapFile::open(pool, first_page)?,
            None => {
                let file = HeapFile::create(pool)?;
                if let Err(err) = catalog.insert(&file.pool, name, file.first_page_id()) {
                    file.delete_file()?;
                    return Err(err);
                }
                log::info!("Created heap file {name:?}");
                file
            }
        };

        file.entry = Some((catalog, name.to_string()));
        Ok(file)
    }

    /// Opens the heap file whose chain starts at `first_page`, counting its records
    pub fn open(pool: SharedBufferPool<D>, first_page: PageId) -> HeapResult<Self> {
        let mut pages = Vec::new();
        let mut free_space = HashMap::new();
        let mut visited = HashSet::new();
        let mut record_count = 0;

        let mut next = first_page;
        while next.is_valid() {
            if !visited.insert(next) {
                return Err(HeapError::BrokenChain(next));
            }

            let guard = PageGuard::pin(&pool, next)?;
            let header = guard.read(|data| {
                let page = SlottedPage::new(data);
                page.is_well_formed()
                    .then(|| (page.free_space(), page.record_count(), page.next_page()))
            })?;
            guard.release()?;

            let Some((free, records, following)) = header else {
                return Err(HeapError::BrokenChain(next));
            };

            pages.push(next);
            free_space.insert(next, free);
            record_count += records;
            next = following;
        }

        log::debug!(
            "Opened heap file at page_id={first_page}: {} page(s), {record_count} record(s)",
            pages.len()
        );
        Ok(HeapFile {
            pool,
            pages,
            free_space,
            record_count,
            entry: None,
            temporary: false,
            deleted: false,
        })
    }

    pub fn first_page_id(&self) -> PageId {
        self.pages[0]
    }

    pub fn page_ids(&self) -> &[PageId] {
        &self.pages
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Catalog name of the file, None for files opened by page id and temporary files
    pub fn name(&self) -> Option<&str> {
        self.entry.as_ref().map(|(_, name)| name.as_str())
    }

    /// Inserts a record into the page with the most free space, growing the chain
    /// by one page if the record does not fit anywhere.
    pub fn insert_record(&mut self, record: &[u8]) -> HeapResult<RecordId> {
        if record.len() > MAX_RECORD_SIZE {
            return Err(HeapError::RecordTooLarge(record.len()));
        }

        if let Some(page_id) = self.roomiest_page() {
            // The page may still refuse the record if it has no dead slot to reuse
            if let Some(rid) = self.try_insert(page_id, record)? {
                return Ok(rid);
            }
        }

        let page_id = self.append_page()?;
        match self.try_insert(page_id, record)? {
            Some(rid) => Ok(rid),
            None => Err(HeapError::RecordTooLarge(record.len())),
        }
    }

    pub fn get_record(&self, rid: RecordId) -> HeapResult<Tuple> {
        self.check_page(rid)?;

        let guard = PageGuard::pin(&self.pool, rid.page_id)?;
        let tuple = guard.read(|data| SlottedPage::new(data).select_record(rid.slot).map(Tuple::from))?;
        guard.release()?;

        tuple.ok_or(HeapError::InvalidRecordId(rid))
    }

    /// Overwrites a record in place. The new record must have the same length.
    pub fn update_record(&mut self, rid: RecordId, record: &[u8]) -> HeapResult<()> {
        self.check_page(rid)?;

        let mut guard = PageGuard::pin(&self.pool, rid.page_id)?;
        let current = guard.read(|data| SlottedPage::new(data).select_record(rid.slot).map(<[u8]>::len))?;

        // Rejected updates leave the page clean
        let result = match current {
            None => Err(SlotError::InvalidSlot(rid.slot)),
            Some(len) if len != record.len() => Err(SlotError::LengthMismatch {
                expected: len,
                actual: record.len(),
            }),
            Some(_) => guard.write(|data| SlottedPage::new(data).update_record(rid.slot, record))?,
        };
        guard.release()?;

        result.map_err(|err| match err {
            SlotError::InvalidSlot(_) => HeapError::InvalidRecordId(rid),
            SlotError::LengthMismatch { .. } => HeapError::InvalidUpdate(rid),
        })
    }

    pub fn delete_record(&mut self, rid: RecordId) -> HeapResult<()> {
        self.check_page(rid)?;

        let mut guard = PageGuard::pin(&self.pool, rid.page_id)?;
        let (result, free) = guard.write(|data| {
            let mut page = SlottedPage::new(data);
            let result = page.delete_record(rid.slot);
            (result, page.free_space())
        })?;
        guard.release()?;

        result.map_err(|_| HeapError::InvalidRecordId(rid))?;
        self.free_space.insert(rid.page_id, free);
        self.record_count -= 1;
        Ok(())
    }

    /// Starts a sequential scan over every record of the file
    pub fn scan(&self) -> HeapScan<D> {
        HeapScan::new(self.pool.clone(), self.pages.clone())
    }

    /// Frees every page of the file and drops its catalog entry.
    ///
    /// Fails with `PagePinned`, without freeing anything, while a scan or a guard
    /// still holds one of its pages.
    pub fn delete_file(mut self) -> HeapResult<()> {
        self.free_pages()?;
        if let Some((catalog, name)) = &self.entry {
            catalog.remove(&self.pool, name)?;
        }
        Ok(())
    }

    fn free_pages(&mut self) -> HeapResult<()> {
        let mut pool = self.pool.borrow_mut();

        // The file holds no pin between calls, so any pin belongs to someone else
        let pinned = self.pages.iter().copied().find(|page_id| {
            pool.descriptor(*page_id)
                .is_some_and(|descriptor| descriptor.pin_count > 0)
        });
        if let Some(page_id) = pinned {
            return Err(BufferPoolError::PagePinned(page_id).into());
        }

        self.deleted = true;
        for page_id in &self.pages {
            pool.free(*page_id)?;
        }
        log::debug!("Deleted heap file with {} page(s)", self.pages.len());
        Ok(())
    }

    fn check_page(&self, rid: RecordId) -> HeapResult<()> {
        if self.free_space.contains_key(&rid.page_id) {
            Ok(())
        } else {
            Err(HeapError::InvalidRecordId(rid))
        }
    }

    fn roomiest_page(&self) -> Option<PageId> {
        self.pages
            .iter()
            .copied()
            .max_by_key(|page_id| self.free_space.get(page_id).copied().unwrap_or(0))
    }

    fn try_insert(&mut self, page_id: PageId, record: &[u8]) -> HeapResult<Option<RecordId>> {
        let free = self.free_space.get(&page_id).copied().unwrap_or(0);
        if free < record.len() {
            return Ok(None);
        }
        if free < record.len() + SLOTTED_PAGE_SLOT_SIZE {
            log::trace!("Page page_id={page_id} needs a dead slot to take the record");
        }

        let mut guard = PageGuard::pin(&self.pool, page_id)?;
        let (slot, free) = guard.write(|data| {
            let mut page = SlottedPage::new(data);
            (page.insert_record(record), page.free_space())
        })?;
        guard.release()?;

        self.free_space.insert(page_id, free);
        Ok(slot.map(|slot| {
            self.record_count += 1;
            RecordId::new(page_id, slot)
        }))
    }

    /// Links a freshly formatted page after the current last page
    fn append_page(&mut self) -> HeapResult<PageId> {
        let Some(&last_page) = self.pages.last() else {
            return Err(HeapError::BrokenChain(PageId::INVALID));
        };

        let mut guard = PageGuard::allocate(&self.pool, 1)?;
        let page_id = guard.page_id();
        let free = guard.write(|data| {
            let mut page = SlottedPage::new(data);
            page.init();
            page.set_prev_page(last_page);
            page.free_space()
        })?;
        guard.release()?;

        let mut guard = PageGuard::pin(&self.pool, last_page)?;
        guard.write(|data| SlottedPage::new(data).set_next_page(page_id))?;
        guard.release()?;

        log::debug!("Linked page_id={page_id} after page_id={last_page}");
        self.pages.push(page_id);
        self.free_space.insert(page_id, free);
        Ok(page_id)
    }
}

impl<D: DiskStore> Drop for HeapFile<D> {
    fn drop(&mut self) {
        if !self.temporary || self.deleted {
            return;
        }
        if let Err(err) = self.free_pages() {
            log::error!("Failed to delete temporary heap file: {err}");
        }
    }
}
