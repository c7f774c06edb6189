mod config;
mod errors;
mod macros;

pub use config::{BufferPoolConfig, BUFFER_POOL_N_FRAMES, DEFAULT_REPLACEMENT_POLICY, PAGE_SIZE};
pub use errors::{BufferPoolError, HeapError, StorageError};

pub mod shared {
    pub mod logger;
}

// For submodules I only expose the public API to the parent module

pub mod storage {
    mod page;
    mod tuple;

    pub mod disk {
        mod disk_manager;
        mod disk_store;
        mod memory_disk;

        pub use disk_manager::DiskManager;
        pub use disk_store::DiskStore;
        pub use memory_disk::MemoryDisk;
    }

    pub mod buffer {
        mod buffer_pool;
        mod eviction;
        mod fifo_eviction;
        mod frame;
        mod guard;
        mod page_directory;

        pub use buffer_pool::{BufferPool, BufferPoolResult, SharedBufferPool};
        pub use eviction::EvictionPolicy;
        pub use fifo_eviction::FifoEvictionPolicy;
        pub use frame::{FrameDescriptor, FrameId};
        pub use guard::PageGuard;
        pub use page_directory::PageDirectory;
    }

    pub mod heap {
        mod file_catalog;
        mod heap_file;
        mod heap_scan;

        pub use file_catalog::{FileCatalog, CATALOG_PAGE_ID};
        pub use heap_file::{HeapFile, HeapResult};
        pub use heap_scan::HeapScan;
    }

    pub use page::{PageId, SlotError, SlottedPage, MAX_RECORD_SIZE};
    pub use tuple::{RecordId, Tuple};
}

pub mod dbms {
    mod database;
    pub use database::Database;
}
