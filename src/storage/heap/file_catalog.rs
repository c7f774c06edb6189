use crate::errors::{BufferPoolError, HeapError, StorageError};
use crate::storage::buffer::{PageGuard, SharedBufferPool};
use crate::storage::disk::DiskStore;
use crate::storage::page::SlottedPage;
use crate::storage::PageId;

use super::heap_file::HeapResult;

/// The page holding the catalog of every database
pub const CATALOG_PAGE_ID: PageId = PageId::new(0);

/// Page id of the first page, followed by the file name
const ENTRY_NAME_OFFSET: usize = 4;

/// Maps heap file names to the first page of their chain.
///
/// The catalog lives on a single slotted page; each record is one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCatalog {
    page_id: PageId,
}

impl FileCatalog {
    /// Loads the catalog page, formatting it if the store does not have one yet.
    ///
    /// Must run before anything else allocates pages, so the catalog gets
    /// `CATALOG_PAGE_ID`.
    pub fn bootstrap<D: DiskStore>(pool: &SharedBufferPool<D>) -> HeapResult<Self> {
        let (mut guard, fresh) = match PageGuard::pin(pool, CATALOG_PAGE_ID) {
            Ok(guard) => (guard, false),
            Err(BufferPoolError::Storage(StorageError::PageNotAllocated(_))) => {
                let guard = PageGuard::allocate(pool, 1)?;
                if guard.page_id() != CATALOG_PAGE_ID {
                    return Err(HeapError::CorruptedCatalog(CATALOG_PAGE_ID));
                }
                (guard, true)
            }
            Err(err) => return Err(err.into()),
        };

        let (well_formed, blank) = guard.read(|data| {
            let blank = data.iter().all(|byte| *byte == 0);
            (SlottedPage::new(data).is_well_formed(), blank)
        })?;

        if fresh || (!well_formed && blank) {
            guard.write(|data| SlottedPage::new(data).init())?;
            log::debug!("Formatted file catalog at page_id={CATALOG_PAGE_ID}");
        } else if !well_formed {
            return Err(HeapError::CorruptedCatalog(CATALOG_PAGE_ID));
        }
        guard.release()?;

        Ok(FileCatalog {
            page_id: CATALOG_PAGE_ID,
        })
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// First page of the named file, if there is one
    pub fn lookup<D: DiskStore>(
        &self,
        pool: &SharedBufferPool<D>,
        name: &str,
    ) -> HeapResult<Option<PageId>> {
        let guard = PageGuard::pin(pool, self.page_id)?;
        let found = guard.read(|data| {
            let page = SlottedPage::new(data);
            find_entry(&page, name).map(|(_, first_page)| first_page)
        })?;
        guard.release()?;
        Ok(found)
    }

    pub fn insert<D: DiskStore>(
        &self,
        pool: &SharedBufferPool<D>,
        name: &str,
        first_page: PageId,
    ) -> HeapResult<()> {
        check_name(name)?;

        let mut entry = Vec::with_capacity(ENTRY_NAME_OFFSET + name.len());
        entry.extend_from_slice(&first_page.get().to_be_bytes());
        entry.extend_from_slice(name.as_bytes());

        let mut guard = PageGuard::pin(pool, self.page_id)?;
        let exists = guard.read(|data| find_entry(&SlottedPage::new(data), name).is_some())?;
        if exists {
            guard.release()?;
            return Err(HeapError::InvalidFileName(name.to_string()));
        }

        let slot = guard.write(|data| SlottedPage::new(data).insert_record(&entry))?;
        guard.release()?;

        match slot {
            Some(_) => {
                log::debug!("Cataloged heap file {name:?} at page_id={first_page}");
                Ok(())
            }
            None => Err(HeapError::CatalogFull),
        }
    }

    /// Drops the named entry. Returns whether it existed.
    pub fn remove<D: DiskStore>(&self, pool: &SharedBufferPool<D>, name: &str) -> HeapResult<bool> {
        let mut guard = PageGuard::pin(pool, self.page_id)?;
        let slot = guard.read(|data| find_entry(&SlottedPage::new(data), name).map(|(slot, _)| slot))?;

        let Some(slot) = slot else {
            guard.release()?;
            return Ok(false);
        };

        let removed = guard.write(|data| SlottedPage::new(data).delete_record(slot))?;
        guard.release()?;

        removed.map_err(|_| HeapError::CorruptedCatalog(self.page_id))?;
        log::debug!("Removed heap file {name:?} from the catalog");
        Ok(true)
    }

    /// Every cataloged file name with its first page, in slot order
    pub fn entries<D: DiskStore>(
        &self,
        pool: &SharedBufferPool<D>,
    ) -> HeapResult<Vec<(String, PageId)>> {
        let guard = PageGuard::pin(pool, self.page_id)?;
        let entries = guard.read(|data| {
            let page = SlottedPage::new(data);
            let mut entries = Vec::new();
            let mut next = page.first_record();
            while let Some(slot) = next {
                if let Some((name, first_page)) = page.select_record(slot).and_then(decode_entry) {
                    entries.push((name.to_string(), first_page));
                }
                next = page.next_record(slot);
            }
            entries
        })?;
        guard.release()?;
        Ok(entries)
    }
}

fn check_name(name: &str) -> HeapResult<()> {
    if name.is_empty() {
        return Err(HeapError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

fn decode_entry(entry: &[u8]) -> Option<(&str, PageId)> {
    let id = entry.get(..ENTRY_NAME_OFFSET)?;
    let first_page = PageId::new(u32::from_be_bytes([id[0], id[1], id[2], id[3]]));
    let name = std::str::from_utf8(&entry[ENTRY_NAME_OFFSET..]).ok()?;
    Some((name, first_page))
}

fn find_entry<B: AsRef<[u8]>>(page: &SlottedPage<B>, name: &str) -> Option<(u16, PageId)> {
    let mut next = page.first_record();
    while let Some(slot) = next {
        let entry = page.select_record(slot).and_then(decode_entry);
        if let Some((entry_name, first_page)) = entry {
            if entry_name == name {
                return Some((slot, first_page));
            }
        }
        next = page.next_record(slot);
    }
    None
}
