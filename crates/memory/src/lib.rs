//! # tidepool-memory
//!
//! Chunked memory pool for short-lived, bursty allocations: per-request or
//! per-connection scratch memory where the general-purpose heap is too slow
//! or fragments too much.
//!
//! ## Quick Start
//!
//! ```rust
//! use tidepool_memory::{Pool, PoolBox};
//!
//! let pool = Pool::create(64 * 1024, 256)?;
//!
//! // Raw blocks: small ones come from chunks, large ones from the system
//! let small = pool.allocate(48)?;
//! let large = pool.allocate(4096)?;
//! unsafe {
//!     pool.free(small.as_ptr());
//!     pool.free(large.as_ptr());
//! }
//!
//! // Typed values, returned to the pool on drop
//! let name = PoolBox::new_in(String::from("request-42"), &pool)?;
//! assert_eq!(name.as_str(), "request-42");
//! drop(name);
//!
//! // Everything the pool still holds goes back in one call
//! let report = pool.destroy();
//! assert_eq!(report.large_allocations, 0);
//! # Ok::<(), tidepool_memory::MemoryError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`Pool`] classifies each request against its small threshold
//! - small requests are rounded up to a [`SizeClass`] (8-byte steps from 16)
//!   and served LIFO from the class free list, or carved from the current
//!   chunk with a bump cursor
//! - large requests are single system allocations kept on an intrusive list
//! - an 8-byte tag before every payload tells `free` which path owns it
//!
//! A pool has no internal locking. Use one pool per thread, connection or
//! request.
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` for [`PoolConfig`] and [`PoolStats`]

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Pointer alignment casts on chunk and node memory are checked per-site
#![allow(clippy::cast_ptr_alignment)]
// #[must_use] on fns returning Result documents intent even if type is already must_use
#![allow(clippy::double_must_use)]

mod arena;
mod header;
mod large;

pub mod config;
pub mod error;
pub mod pool;
pub mod pool_box;
pub mod size_class;
pub mod stats;
pub mod utils;

pub use crate::config::{MAX_SMALL_THRESHOLD, PoolConfig};
pub use crate::error::{MemoryError, MemoryResult};
pub use crate::pool::{ALIGNMENT, Pool};
pub use crate::pool_box::PoolBox;
pub use crate::size_class::{CLASS_GRANULARITY, MIN_CLASS_SIZE, SizeClass};
pub use crate::stats::{PoolStats, ReleaseReport};

/// Convenient re-exports of commonly used types.
pub mod prelude {
    pub use crate::{MemoryError, MemoryResult, Pool, PoolBox, PoolConfig, PoolStats};
}
