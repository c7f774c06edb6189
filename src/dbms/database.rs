use std::fs;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::config::BufferPoolConfig;
use crate::errors::BufferPoolError;
use crate::storage::buffer::{BufferPool, SharedBufferPool};
use crate::storage::disk::{DiskManager, DiskStore, MemoryDisk};
use crate::storage::heap::{FileCatalog, HeapFile, HeapResult};
use crate::storage::PageId;

/// Owns the buffer pool of one database and hands it to the access methods.
///
/// The first page of the store holds the catalog of named heap files. Dirty pages
/// are written back by `close`. Dropping the database without closing it makes a
/// best effort flush.
pub struct Database<D: DiskStore> {
    /// The filename of the database file. None if the database is in memory.
    filename: Option<PathBuf>,
    buffer_pool: SharedBufferPool<D>,
    catalog: FileCatalog,
    closed: bool,
}

impl Database<MemoryDisk> {
    pub fn in_memory() -> HeapResult<Self> {
        Database::with_config(&BufferPoolConfig::from_env(), MemoryDisk::new())
    }
}

impl Database<DiskManager<fs::File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> HeapResult<Self> {
        let disk = DiskManager::open(path.as_ref())?;
        let mut database = Database::with_config(&BufferPoolConfig::from_env(), disk)?;
        database.filename = Some(path.as_ref().to_path_buf());
        Ok(database)
    }
}

impl<R: Read + Write + Seek> Database<DiskManager<R>> {
    pub fn from_reader(reader: R) -> HeapResult<Self> {
        let disk = DiskManager::new(reader)?;
        Database::with_config(&BufferPoolConfig::from_env(), disk)
    }
}

impl<D: DiskStore> Database<D> {
    pub fn with_config(config: &BufferPoolConfig, disk: D) -> HeapResult<Self> {
        let buffer_pool = BufferPool::with_config(config, disk).into_shared();
        let catalog = FileCatalog::bootstrap(&buffer_pool)?;
        Ok(Database {
            filename: None,
            buffer_pool,
            catalog,
            closed: false,
        })
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// A handle on the buffer pool, to be passed to access methods
    pub fn buffer_pool(&self) -> SharedBufferPool<D> {
        self.buffer_pool.clone()
    }

    pub fn create_heap_file(&self) -> HeapResult<HeapFile<D>> {
        HeapFile::create(self.buffer_pool())
    }

    pub fn create_temporary_heap_file(&self) -> HeapResult<HeapFile<D>> {
        HeapFile::temporary(self.buffer_pool())
    }

    pub fn open_heap_file(&self, first_page: PageId) -> HeapResult<HeapFile<D>> {
        HeapFile::open(self.buffer_pool(), first_page)
    }

    /// Opens the heap file called `name`, creating it on first use
    pub fn open_or_create_heap_file(&self, name: &str) -> HeapResult<HeapFile<D>> {
        HeapFile::open_or_create(self.buffer_pool(), self.catalog, name)
    }

    /// Names of the cataloged heap files with their first page
    pub fn heap_files(&self) -> HeapResult<Vec<(String, PageId)>> {
        self.catalog.entries(&self.buffer_pool)
    }

    /// Writes every dirty page back and syncs the disk store
    pub fn close(mut self) -> Result<(), BufferPoolError> {
        self.closed = true;
        self.flush()
    }

    fn flush(&self) -> Result<(), BufferPoolError> {
        let mut pool = self.buffer_pool.borrow_mut();
        pool.flush_all()?;
        pool.disk_mut().sync()?;
        log::debug!("Flushed database {:?}", self.filename);
        Ok(())
    }
}

impl<D: DiskStore> Drop for Database<D> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.flush() {
            log::error!("Failed to flush database on drop: {err}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::config::{BUFFER_POOL_N_FRAMES, PAGE_SIZE};
    use crate::storage::heap::CATALOG_PAGE_ID;

    #[test]
    fn test_database_from_reader() {
        // A blank page is formatted as the catalog
        let database = vec![0u8; PAGE_SIZE];
        let reader = Cursor::new(database);

        let db = Database::from_reader(reader).unwrap();
        assert!(db.filename().is_none());
        assert!(db.heap_files().unwrap().is_empty());
        let pool = db.buffer_pool();
        assert!(pool.borrow().is_resident(CATALOG_PAGE_ID));
        assert_eq!(pool.borrow().disk().allocated_page_count(), 1);
        assert!(pool.borrow().total_frames() > 0);
    }

    #[test]
    fn test_in_memory_heap_file() {
        let db = Database::with_config(&BufferPoolConfig::new(4), MemoryDisk::new()).unwrap();
        let mut file = db.create_heap_file().unwrap();
        assert_ne!(file.first_page_id(), CATALOG_PAGE_ID);
        let rid = file.insert_record(b"hello").unwrap();

        let reopened = db.open_heap_file(file.first_page_id()).unwrap();
        assert_eq!(reopened.record_count(), 1);
        assert_eq!(reopened.get_record(rid).unwrap().as_bytes(), b"hello");
        assert_eq!(BufferPoolConfig::default().n_frames, BUFFER_POOL_N_FRAMES);

        db.close().unwrap();
    }

    #[test]
    fn test_named_heap_files() {
        let db = Database::with_config(&BufferPoolConfig::new(4), MemoryDisk::new()).unwrap();
        let mut users = db.open_or_create_heap_file("users").unwrap();
        assert_eq!(users.name(), Some("users"));
        let rid = users.insert_record(b"alice").unwrap();

        let again = db.open_or_create_heap_file("users").unwrap();
        assert_eq!(again.first_page_id(), users.first_page_id());
        assert_eq!(again.get_record(rid).unwrap().as_bytes(), b"alice");
        assert_eq!(
            db.heap_files().unwrap(),
            vec![("users".to_string(), users.first_page_id())]
        );

        users.delete_file().unwrap();
        assert!(db.heap_files().unwrap().is_empty());
        assert!(matches!(
            db.open_or_create_heap_file(""),
            Err(crate::errors::HeapError::InvalidFileName(_))
        ));
    }
}
