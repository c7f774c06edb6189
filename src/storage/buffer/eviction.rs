use super::frame::FrameId;

/// Tracks which frames may be reused when a page has to be brought into a full pool.
///
/// The buffer pool calls `set_evictable(frame, true)` when a frame's pin count drops
/// to 0 and `set_evictable(frame, false)` when it is pinned again.
pub trait EvictionPolicy {
    /// Picks a victim and stops tracking it. None if every frame is pinned.
    fn evict(&mut self) -> Option<FrameId>;

    fn set_evictable(&mut self, frame_id: FrameId, is_evictable: bool);

    /// Gives back a victim returned by `evict` whose reuse failed. It becomes the
    /// next victim again.
    fn restore(&mut self, frame_id: FrameId);

    fn contains(&self, frame_id: FrameId) -> bool;

    /// The number of frames that can be evicted
    fn size(&self) -> usize;
}
