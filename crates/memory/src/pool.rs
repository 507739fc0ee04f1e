//! Chunked memory pool
//!
//! [`Pool`] routes every request by size. Requests up to the small threshold
//! are rounded to a size class and served from the class free list or carved
//! from the current chunk; larger requests get a dedicated system allocation
//! tracked by the large registry. An 8-byte tag before each payload lets
//! [`Pool::free`] route the pointer back without being told the size.
//!
//! # Safety
//!
//! A pool is single-threaded: it uses `RefCell` internally and is `!Sync`.
//! It can be moved to another thread as a whole. Everything it handed out
//! becomes invalid when it is destroyed or dropped.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::ptr::NonNull;

use crate::arena::PoolArena;
use crate::config::PoolConfig;
use crate::error::MemoryResult;
use crate::header::{self, BlockTag};
use crate::large::LargeAllocationRegistry;
use crate::size_class::SizeClass;
use crate::stats::{PoolStats, ReleaseReport};
use crate::utils::is_aligned_ptr;

/// Alignment guaranteed for every payload returned by a pool
pub const ALIGNMENT: usize = 8;

/// Leading bytes of a freed small payload that hold the free-list link
const LINK_SIZE: usize = size_of::<*mut u8>();

/// Memory pool for short-lived allocations
///
/// # Examples
/// ```
/// use tidepool_memory::Pool;
///
/// let pool = Pool::create(4096, 128)?;
/// let ptr = pool.allocate(24)?;
/// unsafe {
///     ptr.as_ptr().write_bytes(7, 24);
///     pool.free(ptr.as_ptr());
/// }
/// let report = pool.destroy();
/// assert_eq!(report.chunks, 1);
/// # Ok::<(), tidepool_memory::MemoryError>(())
/// ```
pub struct Pool {
    config: PoolConfig,
    arena: RefCell<PoolArena>,
    large: RefCell<LargeAllocationRegistry>,

    live_small: Cell<usize>,
    small_allocs: Cell<u64>,
    large_allocs: Cell<u64>,
}

impl Pool {
    /// Creates a pool with the given chunk size and small threshold
    ///
    /// Both must be greater than zero. No memory is reserved until the first
    /// allocation. Debug fills and header checks follow
    /// [`PoolConfig::default`].
    pub fn create(chunk_size: usize, small_threshold: usize) -> MemoryResult<Self> {
        Self::with_config(PoolConfig::new(chunk_size, small_threshold))
    }

    /// Creates a pool from a full configuration
    pub fn with_config(config: PoolConfig) -> MemoryResult<Self> {
        config.validate()?;

        tracing::debug!(
            chunk_size = config.chunk_size,
            small_threshold = config.small_threshold,
            "pool created"
        );

        Ok(Self {
            arena: RefCell::new(PoolArena::new(config.chunk_size, config.small_threshold)),
            large: RefCell::new(LargeAllocationRegistry::new()),
            config,
            live_small: Cell::new(0),
            small_allocs: Cell::new(0),
            large_allocs: Cell::new(0),
        })
    }

    /// Returns the pool configuration
    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Size class that would serve a request of `size` bytes, `None` if the
    /// request takes the large path
    #[inline]
    pub fn class_of(&self, size: usize) -> Option<SizeClass> {
        self.arena.borrow().classes().class_of(size)
    }

    /// Allocates at least `size` bytes
    ///
    /// The returned pointer is [`ALIGNMENT`]-aligned and stays valid until it
    /// is passed to [`free`](Self::free) or the pool is destroyed. A zero
    /// size is served from the smallest class.
    ///
    /// # Errors
    ///
    /// [`MemoryError::OutOfMemory`](crate::MemoryError::OutOfMemory) if the
    /// system allocator refuses a chunk or a large block, or if the request
    /// size overflows. The pool stays usable.
    pub fn allocate(&self, size: usize) -> MemoryResult<NonNull<u8>> {
        let mut arena = self.arena.borrow_mut();

        if let Some(class) = arena.classes().class_of(size) {
            let payload = arena.allocate(class)?;
            drop(arena);

            self.live_small.set(self.live_small.get() + 1);
            self.small_allocs.set(self.small_allocs.get() + 1);

            if let Some(pattern) = self.config.alloc_pattern {
                // SAFETY: payload owns class.size() bytes
                unsafe { payload.as_ptr().write_bytes(pattern, class.size()) };
            }

            return Ok(payload);
        }
        drop(arena);

        let payload = self.large.borrow_mut().allocate(size)?;
        self.large_allocs.set(self.large_allocs.get() + 1);

        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: payload owns `size` bytes
            unsafe { payload.as_ptr().write_bytes(pattern, size) };
        }

        Ok(payload)
    }

    /// Returns a block to the pool
    ///
    /// Small blocks go back on their class free list and stay in the pool's
    /// chunks; large blocks are released to the system immediately. A null
    /// pointer is ignored.
    ///
    /// # Safety
    ///
    /// - `ptr` must be null or a pointer returned by [`allocate`](Self::allocate)
    ///   on this pool that has not been freed yet
    /// - The block must not be accessed after this call
    ///
    /// With [`PoolConfig::validate_headers`] some violations panic instead of
    /// corrupting the pool; without it they are undefined behavior.
    pub unsafe fn free(&self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };

        let tag = if self.config.validate_headers {
            self.checked_tag(payload)
        } else {
            // SAFETY: caller guarantees payload came from this pool
            BlockTag::decode(unsafe { header::read(payload) })
        };

        match tag {
            BlockTag::Small(class) => {
                if let Some(pattern) = self.config.dealloc_pattern {
                    // SAFETY: poison everything past the free-list link word
                    unsafe {
                        payload
                            .as_ptr()
                            .add(LINK_SIZE)
                            .write_bytes(pattern, class.size() - LINK_SIZE);
                    }
                }
                // SAFETY: header says the block was carved for `class`
                unsafe { self.arena.borrow_mut().release(payload, class) };
                self.live_small.set(self.live_small.get() - 1);
            }
            BlockTag::Large => {
                if let Some(pattern) = self.config.dealloc_pattern {
                    // SAFETY: payload owns its requested size until freed
                    unsafe {
                        let size = LargeAllocationRegistry::payload_size(payload);
                        payload.as_ptr().write_bytes(pattern, size);
                    }
                }
                // SAFETY: header says the block belongs to the registry
                unsafe { self.large.borrow_mut().free(payload) };
            }
        }
    }

    /// Decodes the header of `payload`, panicking if it is not a live block
    /// of this pool
    fn checked_tag(&self, payload: NonNull<u8>) -> BlockTag {
        assert!(
            is_aligned_ptr(payload.as_ptr(), ALIGNMENT),
            "free of misaligned pointer {payload:p}"
        );
        let small_owner = self.arena.borrow().contains(payload.as_ptr());
        let large_owner = !small_owner && self.large.borrow().contains(payload.as_ptr());
        assert!(
            small_owner || large_owner,
            "free of pointer {payload:p} not owned by this pool"
        );

        // SAFETY: payload lies in one of this pool's blocks, so the word
        // before it is pool memory
        let word = unsafe { header::read(payload) };
        let class_count = self.arena.borrow().classes().class_count();
        let tag = BlockTag::decode_checked(word, class_count);

        match tag {
            Some(tag @ BlockTag::Small(_)) if small_owner => tag,
            Some(BlockTag::Large) if large_owner => BlockTag::Large,
            _ => panic!("corrupt block header {word:#018x} at {payload:p}"),
        }
    }

    /// Usable bytes behind a live pointer
    ///
    /// The class size for small blocks, the requested size for large ones.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live pointer returned by [`allocate`](Self::allocate)
    /// on this pool.
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        // SAFETY: forwarded from caller
        match BlockTag::decode(unsafe { header::read(ptr) }) {
            BlockTag::Small(class) => class.size(),
            BlockTag::Large => unsafe { LargeAllocationRegistry::payload_size(ptr) },
        }
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        let arena = self.arena.borrow();
        let large = self.large.borrow();

        PoolStats {
            chunk_count: arena.chunk_count(),
            chunk_bytes: arena.chunk_bytes(),
            carved_bytes: arena.carved_bytes(),
            free_blocks: arena.classes().free_blocks(),
            live_small: self.live_small.get(),
            live_large: large.live(),
            large_bytes: large.live_bytes(),
            small_allocs: self.small_allocs.get(),
            large_allocs: self.large_allocs.get(),
            free_list_hits: arena.reuse_hits(),
            chunk_growths: arena.chunk_growths(),
        }
    }

    /// Releases every chunk and every live large allocation
    ///
    /// All pointers handed out by this pool become invalid. Consuming the
    /// pool makes further use a compile error.
    pub fn destroy(self) -> ReleaseReport {
        let report = self.release();

        tracing::debug!(
            chunks = report.chunks,
            chunk_bytes = report.chunk_bytes,
            large_allocations = report.large_allocations,
            large_bytes = report.large_bytes,
            "pool destroyed"
        );

        report
    }

    fn release(&self) -> ReleaseReport {
        let chunks = self.arena.borrow_mut().release_all();
        let large = self.large.borrow_mut().release_all();
        self.live_small.set(0);

        ReleaseReport {
            chunks: chunks.chunks,
            chunk_bytes: chunks.bytes,
            large_allocations: large.count,
            large_bytes: large.bytes,
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        let report = self.release();
        if !report.is_empty() {
            tracing::debug!(
                chunks = report.chunks,
                large_allocations = report.large_allocations,
                bytes = report.total_bytes(),
                "pool dropped"
            );
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
