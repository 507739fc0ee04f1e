//! Error types for tidepool-memory
//!
//! Uses thiserror for clean, idiomatic Rust error definitions. Only
//! recoverable conditions live here: contract violations (double free,
//! foreign pointers) are documented safety preconditions, not errors.

use core::alloc::Layout;
use thiserror::Error;

/// Memory pool errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Pool construction parameters were rejected
    #[error("Invalid pool configuration: {reason}")]
    InvalidConfig {
        /// Which parameter was rejected and why
        reason: String,
    },

    /// The system allocator could not supply a chunk or a large block
    #[error("Out of memory: {size} bytes with {align} byte alignment")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
        /// Requested alignment in bytes
        align: usize,
    },

    /// A typed allocation needs more alignment than the pool guarantees
    #[error("Unsupported alignment: {align} (pool guarantees {max})")]
    UnsupportedAlignment {
        /// Alignment required by the type
        align: usize,
        /// Alignment the pool guarantees for every payload
        max: usize,
    },
}

impl MemoryError {
    /// Check if error is retryable
    ///
    /// Out-of-memory leaves the pool usable, so the caller may retry after
    /// releasing memory or fall back to another allocator.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "POOL:CONFIG:INVALID",
            Self::OutOfMemory { .. } => "POOL:ALLOC:OOM",
            Self::UnsupportedAlignment { .. } => "POOL:ALLOC:ALIGN",
        }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// Create out-of-memory error
    pub fn out_of_memory(size: usize, align: usize) -> Self {
        tracing::warn!(size, align, "system allocator refused pool memory");

        Self::OutOfMemory { size, align }
    }

    /// Create out-of-memory error from layout
    pub fn out_of_memory_with_layout(layout: Layout) -> Self {
        Self::out_of_memory(layout.size(), layout.align())
    }

    /// Create unsupported alignment error
    pub fn unsupported_alignment(align: usize, max: usize) -> Self {
        Self::UnsupportedAlignment { align, max }
    }
}

/// Result type for pool operations
pub type MemoryResult<T> = Result<T, MemoryError>;
