use std::collections::VecDeque;

use crate::storage::buffer::eviction::EvictionPolicy;
use crate::storage::buffer::frame::FrameId;

/// Evicts the frame that became unpinned longest ago.
///
/// This is FIFO over the moment of becoming evictable, not LRU: accesses to a pinned
/// frame do not count, and a frame that is pinned and unpinned again goes to the back
/// of the queue.
pub struct FifoEvictionPolicy {
    /// Evictable frames, oldest first
    queue: VecDeque<FrameId>,
    /// Membership of each frame in `queue`, indexed by frame id
    queued: Vec<bool>,
}

impl FifoEvictionPolicy {
    /// Creates an empty policy able to track `n_frames` frames
    pub fn new(n_frames: usize) -> Self {
        FifoEvictionPolicy {
            queue: VecDeque::with_capacity(n_frames),
            queued: vec![false; n_frames],
        }
    }

    /// Evictable frames in eviction order
    pub fn iter(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.queue.iter().copied()
    }

    fn slot(&mut self, frame_id: FrameId) -> &mut bool {
        let index = frame_id as usize;
        assert!(index < self.queued.len(), "Frame id={frame_id} out of bounds");
        &mut self.queued[index]
    }
}

impl EvictionPolicy for FifoEvictionPolicy {
    fn evict(&mut self) -> Option<FrameId> {
        let frame_id = self.queue.pop_front()?;
        *self.slot(frame_id) = false;
        Some(frame_id)
    }

    /// Appending a frame that is already queued keeps its current position.
    fn set_evictable(&mut self, frame_id: FrameId, is_evictable: bool) {
        let queued = self.slot(frame_id);
        match (*queued, is_evictable) {
            (false, true) => {
                *queued = true;
                self.queue.push_back(frame_id);
            }
            (true, false) => {
                *queued = false;
                self.queue.retain(|queued_id| *queued_id != frame_id);
            }
            _ => {}
        }
    }

    fn restore(&mut self, frame_id: FrameId) {
        let queued = self.slot(frame_id);
        if !*queued {
            *queued = true;
            self.queue.push_front(frame_id);
        }
    }

    fn contains(&self, frame_id: FrameId) -> bool {
        self.queued.get(frame_id as usize).copied().unwrap_or(false)
    }

    fn size(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_evict_empty() {
        let mut policy = FifoEvictionPolicy::new(3);
        assert_eq!(policy.size(), 0);
        assert_eq!(policy.evict(), None);
    }

    #[test]
    fn test_evict_in_unpin_order() {
        let mut policy = FifoEvictionPolicy::new(4);
        policy.set_evictable(2, true);
        policy.set_evictable(0, true);
        policy.set_evictable(3, true);

        assert_eq!(policy.size(), 3);
        assert_eq!(policy.evict(), Some(2));
        assert_eq!(policy.evict(), Some(0));
        assert_eq!(policy.evict(), Some(3));
        assert_eq!(policy.evict(), None);
        assert_eq!(policy.size(), 0);
    }

    #[test]
    fn test_repinned_frame_moves_to_the_back() {
        let mut policy = FifoEvictionPolicy::new(3);
        policy.set_evictable(0, true);
        policy.set_evictable(1, true);
        policy.set_evictable(2, true);

        // Pinned again, then unpinned: it lost its old position
        policy.set_evictable(0, false);
        assert!(!policy.contains(0));
        policy.set_evictable(0, true);

        assert_eq!(policy.iter().collect::<Vec<_>>(), vec![1, 2, 0]);
    }

    #[test]
    fn test_each_frame_is_queued_once() {
        let mut policy = FifoEvictionPolicy::new(2);
        policy.set_evictable(1, true);
        policy.set_evictable(0, true);
        policy.set_evictable(1, true);

        assert_eq!(policy.size(), 2);
        assert_eq!(policy.evict(), Some(1));
        assert_eq!(policy.evict(), Some(0));
    }

    #[test]
    fn test_restore_puts_victim_first() {
        let mut policy = FifoEvictionPolicy::new(3);
        policy.set_evictable(0, true);
        policy.set_evictable(1, true);

        let victim = policy.evict().unwrap();
        assert_eq!(victim, 0);
        policy.restore(victim);

        assert_eq!(policy.size(), 2);
        assert_eq!(policy.evict(), Some(0));
    }

    #[test]
    fn test_unknown_frame_panics() {
        let result = std::panic::catch_unwind(|| {
            let mut policy = FifoEvictionPolicy::new(2);
            policy.set_evictable(5, true);
        });
        assert!(result.is_err());
    }
}
