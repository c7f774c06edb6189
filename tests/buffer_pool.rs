use std::collections::HashMap;

use framedb::shared::logger::setup_logger;
use framedb::storage::buffer::{BufferPool, PageGuard};
use framedb::storage::disk::{DiskStore, MemoryDisk};
use framedb::storage::PageId;
use framedb::BufferPoolError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const N_PAGES: u32 = 16;

fn disk_with_pages(count: u32) -> MemoryDisk {
    let mut disk = MemoryDisk::new();
    disk.allocate_page(count).unwrap();
    disk
}

#[test]
fn test_pool_of_three_frames() {
    setup_logger();
    let mut pool = BufferPool::new(3, "FIFO", disk_with_pages(32));
    let page = PageId::new;

    for id in [10, 11, 12] {
        pool.pin(page(id), false).unwrap();
    }
    assert_eq!(pool.unpinned_frame_count(), 0);
    assert!(matches!(pool.pin(page(13), false), Err(BufferPoolError::PoolExhausted)));
    assert!(matches!(pool.allocate(1), Err(BufferPoolError::PoolExhausted)));
    assert_eq!(pool.disk().allocated_page_count(), 32);

    pool.unpin(page(10), false).unwrap();
    pool.pin(page(13), false).unwrap();
    assert!(!pool.is_resident(page(10)));
    pool.validate().unwrap();

    pool.free(page(20)).unwrap();
    assert!(!pool.disk().is_allocated(page(20)));
    pool.validate().unwrap();

    for id in [11, 12, 13] {
        pool.unpin(page(id), false).unwrap();
    }
    assert_eq!(pool.unpinned_frame_count(), pool.total_frames());
    pool.validate().unwrap();
}

#[test]
fn test_guards_share_one_pool() {
    setup_logger();
    let pool = BufferPool::new(2, "FIFO", MemoryDisk::new()).into_shared();

    let mut first = PageGuard::allocate(&pool, 1).unwrap();
    first.write(|data| data[0] = 1).unwrap();
    let mut second = PageGuard::allocate(&pool, 1).unwrap();
    second.write(|data| data[0] = 2).unwrap();
    assert_eq!(pool.borrow().unpinned_frame_count(), 0);

    assert!(matches!(
        PageGuard::allocate(&pool, 1),
        Err(BufferPoolError::PoolExhausted)
    ));

    let first_id = first.page_id();
    drop(first);
    drop(second);

    let third = PageGuard::allocate(&pool, 1).unwrap();
    // The oldest unpinned frame held the first page
    assert!(!pool.borrow().is_resident(first_id));
    drop(third);

    let first = PageGuard::pin(&pool, first_id).unwrap();
    assert_eq!(first.read(|data| data[0]).unwrap(), 1);
    first.release().unwrap();
    pool.borrow().validate().unwrap();
}

/// Drives the pool with random pins, writes, unpins, flushes and frees, checking
/// the pool invariants and the page contents against a model after every step.
#[test]
fn test_random_operations_keep_invariants() {
    setup_logger();
    let mut rng = StdRng::seed_from_u64(0xF1F0);
    let mut pool = BufferPool::new(4, "FIFO", disk_with_pages(N_PAGES));

    // Last value written to the first four bytes of each page
    let mut contents: HashMap<PageId, u32> = HashMap::new();
    // Pins currently held, with whether the holder modified the page
    let mut pins: Vec<(PageId, bool)> = Vec::new();
    let mut freed: Vec<PageId> = Vec::new();

    for step in 0..5_000u32 {
        match rng.random_range(0..10) {
            0..=4 => {
                let page_id = PageId::new(rng.random_range(0..N_PAGES));
                if freed.contains(&page_id) {
                    continue;
                }
                let was_resident = pool.is_resident(page_id);
                match pool.pin(page_id, false) {
                    Ok(data) => {
                        let stored = u32::from_le_bytes(data[..4].try_into().unwrap());
                        assert_eq!(stored, contents.get(&page_id).copied().unwrap_or(0));

                        let modify = rng.random_bool(0.5);
                        if modify {
                            data[..4].copy_from_slice(&step.to_le_bytes());
                            contents.insert(page_id, step);
                        }
                        pins.push((page_id, modify));
                    }
                    Err(BufferPoolError::PoolExhausted) => {
                        assert!(!was_resident);
                        assert_eq!(pool.unpinned_frame_count(), 0);
                    }
                    Err(err) => panic!("unexpected pin error: {err}"),
                }
            }
            5..=7 => {
                if pins.is_empty() {
                    continue;
                }
                let (page_id, is_dirty) = pins.swap_remove(rng.random_range(0..pins.len()));
                pool.unpin(page_id, is_dirty).unwrap();
            }
            8 => {
                let page_id = PageId::new(rng.random_range(0..N_PAGES));
                pool.flush(page_id).unwrap();
                if let Some(descriptor) = pool.descriptor(page_id) {
                    assert!(!descriptor.is_dirty);
                }
            }
            _ => {
                let page_id = PageId::new(rng.random_range(0..N_PAGES));
                let pin_count = pins.iter().filter(|(id, _)| *id == page_id).count();
                if freed.contains(&page_id) || pin_count > 0 {
                    continue;
                }
                pool.free(page_id).unwrap();
                assert!(!pool.is_resident(page_id));
                freed.push(page_id);
                contents.remove(&page_id);
            }
        }

        if let Err(violation) = pool.validate() {
            panic!("step {step}: {violation}");
        }
        let pinned_frames = pool.total_frames() - pool.unpinned_frame_count();
        let mut distinct: Vec<PageId> = pins.iter().map(|(id, _)| *id).collect();
        distinct.sort_by_key(|id| id.get());
        distinct.dedup();
        assert_eq!(pinned_frames, distinct.len());
    }

    for (page_id, is_dirty) in pins.drain(..) {
        pool.unpin(page_id, is_dirty).unwrap();
    }
    pool.flush_all().unwrap();

    let mut buf = vec![0u8; framedb::PAGE_SIZE];
    for (page_id, value) in contents {
        pool.disk_mut().read_page(page_id, &mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf[..4].try_into().unwrap()), value);
    }
}
