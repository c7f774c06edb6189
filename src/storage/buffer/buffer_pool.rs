use super::eviction::EvictionPolicy;
use super::fifo_eviction::FifoEvictionPolicy;
use super::frame::{Frame, FrameDescriptor, FrameId};
use super::page_directory::PageDirectory;
use crate::config::{BufferPoolConfig, DEFAULT_REPLACEMENT_POLICY, PAGE_SIZE};
use crate::errors::BufferPoolError;
use crate::storage::disk::DiskStore;
use crate::storage::PageId;

use std::cell::RefCell;
use std::rc::Rc;

pub type BufferPoolResult<T> = Result<T, BufferPoolError>;

/// One buffer pool shared by the access methods built on top of it.
///
/// The pool is single threaded: every caller borrows it for the duration of one
/// operation. Callers that need it across threads must provide their own mutual
/// exclusion around whole pin/unpin sequences.
pub type SharedBufferPool<D> = Rc<RefCell<BufferPool<D>>>;

/// # Design principles
///
/// - Fixed size: the frames are allocated once and never resized.
/// - A frame is an eviction candidate if and only if its pin count is 0, and each
///   candidate is tracked once by the eviction policy.
/// - Every operation either completes its whole state transition or leaves the
///   page table, the frame descriptors and the eviction policy untouched.
pub struct BufferPool<D: DiskStore> {
    /// The size of the buffer pool in number of frames
    pool_size: usize,
    /// The frames and their descriptors, indexed by frame id
    frames: Vec<Frame>,
    /// Maps page id to buffer pool frame id. Returns None if the page is not in the buffer pool.
    page_table: PageDirectory,
    /// The eviction policy to use when a page has to be loaded into a full pool.
    /// It also plays the role of the free list: empty frames are unpinned frames.
    eviction_policy: Box<dyn EvictionPolicy>,
    /// Pages are read here first and swapped into the victim frame once the read
    /// succeeded, so a failed read never clobbers the victim's contents.
    scratch: Box<[u8]>,
    /// The disk store that will handle the underlying IO operations. The buffer pool
    /// has no details over how the data is read and written to disk.
    disk: D,
}

impl<D: DiskStore> BufferPool<D> {
    /// Creates a new buffer pool manager with the given size.
    ///
    /// Only FIFO replacement is implemented; any other policy name is accepted and
    /// falls back to it.
    pub fn new(pool_size: usize, replacement_policy: &str, disk: D) -> Self {
        assert!(
            pool_size > 0 && pool_size <= FrameId::MAX as usize,
            "Buffer pool size must be in 1..={}",
            FrameId::MAX
        );

        if !replacement_policy.eq_ignore_ascii_case(DEFAULT_REPLACEMENT_POLICY) {
            log::warn!(
                "Replacement policy {replacement_policy:?} is not supported, using {DEFAULT_REPLACEMENT_POLICY}"
            );
        }

        log::info!(
            "Allocating buffer pool with {pool_size} frames ({} KiB)",
            pool_size * PAGE_SIZE / 1024
        );

        let frames = (0..pool_size).map(|_| Frame::new()).collect();

        // Every frame starts empty, hence evictable
        let mut eviction_policy = FifoEvictionPolicy::new(pool_size);
        for frame_id in 0..pool_size as FrameId {
            eviction_policy.set_evictable(frame_id, true);
        }

        BufferPool {
            pool_size,
            frames,
            page_table: PageDirectory::with_capacity(pool_size),
            eviction_policy: Box::new(eviction_policy),
            scratch: vec![0u8; PAGE_SIZE].into_boxed_slice(),
            disk,
        }
    }

    pub fn with_config(config: &BufferPoolConfig, disk: D) -> Self {
        BufferPool::new(config.n_frames, &config.replacement_policy, disk)
    }

    pub fn into_shared(self) -> SharedBufferPool<D> {
        Rc::new(RefCell::new(self))
    }

    /// Pins a page and returns its frame contents.
    ///
    /// If the page is resident its pin count is incremented. Otherwise the oldest
    /// unpinned frame is reused: its page is written back if dirty and the requested
    /// page is read into it, unless `empty_page` is set, in which case the frame is
    /// handed out as is and the caller is responsible for formatting it.
    ///
    /// Fails with `PoolExhausted` if the page is not resident and every frame is pinned.
    pub fn pin(&mut self, page_id: PageId, empty_page: bool) -> BufferPoolResult<&mut [u8]> {
        if !page_id.is_valid() {
            return Err(BufferPoolError::PageNotFound(page_id));
        }

        let frame_id = match self.page_table.get(page_id) {
            Some(frame_id) => {
                let descriptor = &mut self.frames[frame_id as usize].descriptor;
                descriptor.pin_count += 1;
                if descriptor.pin_count == 1 {
                    self.eviction_policy.set_evictable(frame_id, false);
                }
                log::trace!(
                    "Found page_id={page_id} in frame_id={frame_id}, pin_count={}",
                    descriptor.pin_count
                );
                frame_id
            }
            None => self.load_page(page_id, empty_page)?,
        };

        Ok(&mut self.frames[frame_id as usize].data[..])
    }

    /// Releases one pin of the page. `is_dirty` marks the page as modified; the flag
    /// is only cleared when the page is written to disk.
    pub fn unpin(&mut self, page_id: PageId, is_dirty: bool) -> BufferPoolResult<()> {
        let frame_id = self
            .page_table
            .get(page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        let descriptor = &mut self.frames[frame_id as usize].descriptor;
        if descriptor.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned(page_id));
        }

        descriptor.pin_count -= 1;
        descriptor.is_dirty |= is_dirty;
        log::trace!(
            "Unpinned page_id={page_id} in frame_id={frame_id}, pin_count={} dirty={}",
            descriptor.pin_count,
            descriptor.is_dirty
        );

        if descriptor.pin_count == 0 {
            self.eviction_policy.set_evictable(frame_id, true);
        }
        Ok(())
    }

    /// Allocates `how_many` contiguous pages on disk and pins the first one as an
    /// empty page.
    ///
    /// The request is rejected before touching the disk if every frame is pinned. If
    /// the first page cannot be pinned, the whole run is given back to the disk.
    pub fn allocate(&mut self, how_many: u32) -> BufferPoolResult<PageId> {
        if self.unpinned_frame_count() == 0 {
            return Err(BufferPoolError::PoolExhausted);
        }

        let page_id = self.disk.allocate_page(how_many)?;
        log::debug!("Allocated {how_many} page(s) on disk starting at page_id={page_id}");

        if let Err(err) = self.pin(page_id, true) {
            if let Err(dealloc_err) = self.disk.deallocate_page(page_id, how_many) {
                log::warn!("Could not give back page_id={page_id} after a failed pin: {dealloc_err}");
            }
            return Err(err);
        }

        Ok(page_id)
    }

    /// Frees a page on disk, dropping it from the pool if it is resident.
    ///
    /// A resident page may be held by at most the one pin being released here; more
    /// pins fail with `PagePinned`. Dirty contents are written back first.
    pub fn free(&mut self, page_id: PageId) -> BufferPoolResult<()> {
        let Some(frame_id) = self.page_table.get(page_id) else {
            log::debug!("Freeing non resident page_id={page_id}");
            self.disk.deallocate_page(page_id, 1)?;
            return Ok(());
        };

        if self.frames[frame_id as usize].descriptor.pin_count > 1 {
            return Err(BufferPoolError::PagePinned(page_id));
        }

        self.flush_frame(frame_id)?;
        self.disk.deallocate_page(page_id, 1)?;

        self.page_table.remove(page_id);
        self.frames[frame_id as usize].reset();
        self.eviction_policy.set_evictable(frame_id, true);
        log::debug!("Freed page_id={page_id} from frame_id={frame_id}");
        Ok(())
    }

    /// Writes the page to disk if it is resident and dirty.
    pub fn flush(&mut self, page_id: PageId) -> BufferPoolResult<()> {
        match self.page_table.get(page_id) {
            Some(frame_id) => self.flush_frame(frame_id),
            None => Ok(()),
        }
    }

    /// Writes every resident dirty page to disk.
    pub fn flush_all(&mut self) -> BufferPoolResult<()> {
        for frame_id in 0..self.pool_size as FrameId {
            self.flush_frame(frame_id)?;
        }
        Ok(())
    }

    /// Read access to a pinned page
    pub fn page(&self, page_id: PageId) -> BufferPoolResult<&[u8]> {
        let frame_id = self.pinned_frame(page_id)?;
        Ok(&self.frames[frame_id as usize].data[..])
    }

    /// Write access to a pinned page. Remember to unpin it as dirty.
    pub fn page_mut(&mut self, page_id: PageId) -> BufferPoolResult<&mut [u8]> {
        let frame_id = self.pinned_frame(page_id)?;
        Ok(&mut self.frames[frame_id as usize].data[..])
    }

    /// Returns the number of frames in the buffer pool
    pub fn total_frames(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of frames with a pin count of 0 in O(n)
    pub fn unpinned_frame_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.descriptor.pin_count == 0)
            .count()
    }

    /// Returns the number of pages held in the buffer pool
    pub fn resident_page_count(&self) -> usize {
        self.page_table.len()
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.page_table.contains(page_id)
    }

    /// Descriptor of the frame holding the page, if it is resident
    pub fn descriptor(&self, page_id: PageId) -> Option<FrameDescriptor> {
        let frame_id = self.page_table.get(page_id)?;
        Some(self.frames[frame_id as usize].descriptor)
    }

    pub fn disk(&self) -> &D {
        &self.disk
    }

    pub fn disk_mut(&mut self) -> &mut D {
        &mut self.disk
    }

    /// Checks the invariants tying the page table, the frame descriptors and the
    /// eviction policy together. Returns a description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        for (frame_id, frame) in self.frames.iter().enumerate() {
            let frame_id = frame_id as FrameId;
            let descriptor = frame.descriptor;

            if descriptor.is_empty() && (descriptor.pin_count != 0 || descriptor.is_dirty) {
                return Err(format!("empty frame_id={frame_id} is pinned or dirty"));
            }
            if (descriptor.pin_count == 0) != self.eviction_policy.contains(frame_id) {
                return Err(format!(
                    "frame_id={frame_id} with pin_count={} disagrees with the eviction policy",
                    descriptor.pin_count
                ));
            }
            if !descriptor.is_empty() && self.page_table.get(descriptor.page_id) != Some(frame_id) {
                return Err(format!(
                    "frame_id={frame_id} holds page_id={} which the page table does not map to it",
                    descriptor.page_id
                ));
            }
        }

        for (page_id, frame_id) in self.page_table.iter() {
            match self.frames.get(frame_id as usize) {
                Some(frame) if frame.descriptor.page_id == page_id => {}
                _ => return Err(format!("page table maps page_id={page_id} to frame_id={frame_id} which does not hold it")),
            }
        }

        if self.eviction_policy.size() != self.unpinned_frame_count() {
            return Err(format!(
                "eviction policy tracks {} frames but {} are unpinned",
                self.eviction_policy.size(),
                self.unpinned_frame_count()
            ));
        }

        Ok(())
    }

    /// Brings a non resident page into a victim frame and pins it
    fn load_page(&mut self, page_id: PageId, empty_page: bool) -> BufferPoolResult<FrameId> {
        let frame_id = self
            .eviction_policy
            .evict()
            .ok_or(BufferPoolError::PoolExhausted)?;

        if let Err(err) = self.replace_page(frame_id, page_id, empty_page) {
            log::debug!("Could not load page_id={page_id} into frame_id={frame_id}: {err}");
            self.eviction_policy.restore(frame_id);
            return Err(err);
        }

        Ok(frame_id)
    }

    fn replace_page(
        &mut self,
        frame_id: FrameId,
        page_id: PageId,
        empty_page: bool,
    ) -> BufferPoolResult<()> {
        let victim = self.frames[frame_id as usize].descriptor;
        assert_eq!(victim.pin_count, 0, "Evicted a pinned frame");

        self.flush_frame(frame_id)?;

        let frame = &mut self.frames[frame_id as usize];
        if !empty_page {
            self.disk.read_page(page_id, &mut self.scratch)?;
            std::mem::swap(&mut frame.data, &mut self.scratch);
        }

        if !victim.is_empty() {
            log::trace!("Evicted page_id={} from frame_id={frame_id}", victim.page_id);
            self.page_table.remove(victim.page_id);
        }

        frame.load(page_id);
        self.page_table.insert(page_id, frame_id);
        log::trace!("Loaded page_id={page_id} into frame_id={frame_id} (empty={empty_page})");

        Ok(())
    }

    fn flush_frame(&mut self, frame_id: FrameId) -> BufferPoolResult<()> {
        let frame = &mut self.frames[frame_id as usize];
        if frame.descriptor.is_empty() || !frame.descriptor.is_dirty {
            return Ok(());
        }

        self.disk.write_page(frame.descriptor.page_id, &frame.data)?;
        frame.descriptor.is_dirty = false;
        log::debug!("Flushed page_id={} from frame_id={frame_id}", frame.descriptor.page_id);
        Ok(())
    }

    fn pinned_frame(&self, page_id: PageId) -> BufferPoolResult<FrameId> {
        let frame_id = self
            .page_table
            .get(page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        if self.frames[frame_id as usize].descriptor.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned(page_id));
        }
        Ok(frame_id)
    }
}
