use crate::macros::static_assert;

/// The size (in bytes) of a page on disk and of a frame in the buffer pool
pub const PAGE_SIZE: usize = 4096;

/// The number of frames in the buffer pool.
/// The more frames, the more pages we can cache in memory. Increasing this value
/// will generally improve performance, but will also increase memory usage.
pub const BUFFER_POOL_N_FRAMES: usize = 69;

/// The only replacement policy the buffer pool implements: evict the frame that
/// became unpinned longest ago.
pub const DEFAULT_REPLACEMENT_POLICY: &str = "FIFO";

pub const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Environment variable overriding the number of frames
pub const ENV_N_FRAMES: &str = "FRAMEDB_FRAMES";
/// Environment variable overriding the replacement policy name
pub const ENV_REPLACEMENT_POLICY: &str = "FRAMEDB_REPLACER";

static_assert!(PAGE_SIZE % 8 == 0);
// Slot offsets inside a page are stored as u16
static_assert!(PAGE_SIZE <= u16::MAX as usize);
static_assert!(BUFFER_POOL_N_FRAMES > 0 && BUFFER_POOL_N_FRAMES <= u16::MAX as usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames allocated up front. Never resized.
    pub n_frames: usize,
    /// Name of the requested replacement policy. Anything other than FIFO is
    /// accepted and ignored.
    pub replacement_policy: String,
}

impl BufferPoolConfig {
    pub fn new(n_frames: usize) -> Self {
        BufferPoolConfig {
            n_frames,
            replacement_policy: DEFAULT_REPLACEMENT_POLICY.to_string(),
        }
    }

    /// Builds a config from the defaults, overridden by `FRAMEDB_FRAMES` and
    /// `FRAMEDB_REPLACER` when they are set. Unparsable frame counts are ignored.
    pub fn from_env() -> Self {
        let mut config = BufferPoolConfig::default();

        if let Ok(value) = std::env::var(ENV_N_FRAMES) {
            match value.trim().parse::<usize>() {
                Ok(n) if n > 0 && n <= u16::MAX as usize => config.n_frames = n,
                _ => log::warn!("Ignoring invalid {ENV_N_FRAMES}={value:?}"),
            }
        }
        if let Ok(value) = std::env::var(ENV_REPLACEMENT_POLICY) {
            config.replacement_policy = value;
        }

        config
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig::new(BUFFER_POOL_N_FRAMES)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BufferPoolConfig::default();
        assert_eq!(config.n_frames, BUFFER_POOL_N_FRAMES);
        assert_eq!(config.replacement_policy, "FIFO");
    }
}
