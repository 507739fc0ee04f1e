//! Pool configuration

use crate::error::{MemoryError, MemoryResult};

/// Largest accepted small threshold
///
/// Keeps the per-pool class table bounded (one list head per 8-byte step).
pub const MAX_SMALL_THRESHOLD: usize = 1024 * 1024;

/// Configuration for a [`Pool`](crate::Pool)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Bytes requested from the system for each new chunk
    ///
    /// A block whose stride exceeds this still gets a chunk of its own.
    pub chunk_size: usize,

    /// Largest request served from chunks; anything above goes to the
    /// large-allocation registry
    pub small_threshold: usize,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for deallocated memory (for debugging)
    ///
    /// The first word of a freed small block holds the free-list link and is
    /// not overwritten.
    pub dealloc_pattern: Option<u8>,

    /// Check the block header on every free and panic on a bad tag
    pub validate_headers: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            small_threshold: 256,
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
            validate_headers: cfg!(debug_assertions),
        }
    }
}

impl PoolConfig {
    /// Configuration with explicit geometry and default debug settings
    #[must_use]
    pub fn new(chunk_size: usize, small_threshold: usize) -> Self {
        Self {
            chunk_size,
            small_threshold,
            ..Self::default()
        }
    }

    /// Production configuration - no fills, no checks
    #[must_use]
    pub fn production() -> Self {
        Self {
            alloc_pattern: None,
            dealloc_pattern: None,
            validate_headers: false,
            ..Self::default()
        }
    }

    /// Debug configuration - fill patterns and header validation
    #[must_use]
    pub fn debug() -> Self {
        Self {
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
            validate_headers: true,
            ..Self::default()
        }
    }

    /// Performance configuration - production settings with larger chunks
    #[must_use]
    pub fn performance() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            ..Self::production()
        }
    }

    /// Set chunk size
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set small threshold
    #[must_use]
    pub fn with_small_threshold(mut self, small_threshold: usize) -> Self {
        self.small_threshold = small_threshold;
        self
    }

    /// Set fill patterns for allocation and deallocation
    #[must_use]
    pub fn with_patterns(mut self, alloc: Option<u8>, dealloc: Option<u8>) -> Self {
        self.alloc_pattern = alloc;
        self.dealloc_pattern = dealloc;
        self
    }

    /// Enable or disable header validation on free
    #[must_use]
    pub fn with_header_validation(mut self, enabled: bool) -> Self {
        self.validate_headers = enabled;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> MemoryResult<()> {
        if self.chunk_size == 0 {
            return Err(MemoryError::invalid_config(
                "chunk_size must be greater than zero",
            ));
        }

        if self.small_threshold == 0 {
            return Err(MemoryError::invalid_config(
                "small_threshold must be greater than zero",
            ));
        }

        if self.small_threshold > MAX_SMALL_THRESHOLD {
            return Err(MemoryError::invalid_config(&format!(
                "small_threshold {} exceeds maximum {MAX_SMALL_THRESHOLD}",
                self.small_threshold
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn presets_are_valid() {
        for config in [
            PoolConfig::default(),
            PoolConfig::production(),
            PoolConfig::debug(),
            PoolConfig::performance(),
        ] {
            assert!(config.validate().is_ok(), "{config:?}");
        }
    }

    #[test]
    fn debug_preset_enables_checks() {
        let config = PoolConfig::debug();
        assert_eq!(config.alloc_pattern, Some(0xBB));
        assert_eq!(config.dealloc_pattern, Some(0xDD));
        assert!(config.validate_headers);

        let config = PoolConfig::production();
        assert_eq!(config.alloc_pattern, None);
        assert!(!config.validate_headers);
    }

    #[test]
    fn builder_methods() {
        let config = PoolConfig::production()
            .with_chunk_size(4096)
            .with_small_threshold(512)
            .with_patterns(Some(1), None)
            .with_header_validation(true);

        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.small_threshold, 512);
        assert_eq!(config.alloc_pattern, Some(1));
        assert_eq!(config.dealloc_pattern, None);
        assert!(config.validate_headers);
    }

    #[rstest]
    #[case(0, 128, "chunk_size")]
    #[case(1024, 0, "small_threshold")]
    #[case(1024, MAX_SMALL_THRESHOLD + 1, "exceeds maximum")]
    fn rejects_invalid(#[case] chunk_size: usize, #[case] threshold: usize, #[case] needle: &str) {
        let error = PoolConfig::new(chunk_size, threshold).validate().unwrap_err();
        assert_eq!(error.code(), "POOL:CONFIG:INVALID");
        assert!(error.to_string().contains(needle), "{error}");
    }

    #[test]
    fn accepts_maximum_threshold() {
        assert!(PoolConfig::new(1, MAX_SMALL_THRESHOLD).validate().is_ok());
    }
}
