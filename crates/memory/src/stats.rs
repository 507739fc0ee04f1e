//! Pool statistics snapshots

use core::fmt;

/// Point-in-time counters of a [`Pool`](crate::Pool)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// Chunks currently owned by the pool
    pub chunk_count: usize,
    /// Bytes held in chunks
    pub chunk_bytes: usize,
    /// Chunk bytes handed out as blocks so far (headers included)
    pub carved_bytes: usize,
    /// Small blocks currently on free lists
    pub free_blocks: usize,
    /// Small allocations not yet freed
    pub live_small: usize,
    /// Large allocations not yet freed
    pub live_large: usize,
    /// Payload bytes of live large allocations
    pub large_bytes: usize,
    /// Small allocations performed
    pub small_allocs: u64,
    /// Large allocations performed
    pub large_allocs: u64,
    /// Small allocations served from a free list
    pub free_list_hits: u64,
    /// Chunks requested from the system over the pool's life
    pub chunk_growths: u64,
}

impl PoolStats {
    /// Bytes the pool currently holds from the system
    ///
    /// Chunk bytes plus large payload bytes; large registry nodes are not
    /// counted.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.chunk_bytes + self.large_bytes
    }

    /// Share of small allocations served by reuse, in `0.0..=1.0`
    #[must_use]
    pub fn reuse_ratio(&self) -> f64 {
        if self.small_allocs == 0 {
            0.0
        } else {
            self.free_list_hits as f64 / self.small_allocs as f64
        }
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunks={} ({} bytes, {} carved), small live={} free={}, large live={} ({} bytes), reuse={:.1}%",
            self.chunk_count,
            self.chunk_bytes,
            self.carved_bytes,
            self.live_small,
            self.free_blocks,
            self.live_large,
            self.large_bytes,
            self.reuse_ratio() * 100.0
        )
    }
}

/// What [`Pool::destroy`](crate::Pool::destroy) gave back to the system
#[must_use]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Chunks released
    pub chunks: usize,
    /// Bytes of those chunks
    pub chunk_bytes: usize,
    /// Large allocations that were still live
    pub large_allocations: usize,
    /// Payload bytes of those large allocations
    pub large_bytes: usize,
}

impl ReleaseReport {
    /// Chunk bytes plus large payload bytes
    pub fn total_bytes(&self) -> usize {
        self.chunk_bytes + self.large_bytes
    }

    /// True if nothing was held at destruction
    pub fn is_empty(&self) -> bool {
        self.chunks == 0 && self.large_allocations == 0
    }
}
