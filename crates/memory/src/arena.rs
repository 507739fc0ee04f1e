//! Chunk arena backing the small-allocation path
//!
//! # Safety
//!
//! The arena owns a newest-first linked list of chunks obtained from the
//! global allocator and carves fixed-stride blocks from the head chunk with a
//! bump cursor. Freed blocks go back to the size-class free list of their
//! class and are handed out again before any new carving happens.
//!
//! ## Invariants
//!
//! - `cursor` and `end` both lie in the head chunk, or are both null
//! - Carved blocks never overlap (the cursor only moves forward)
//! - Every carved block starts 8-byte aligned and is `HEADER_SIZE + class`
//!   bytes long, so its payload is 8-byte aligned too
//! - Chunks are released only by [`PoolArena::release_all`] or `Drop`

use std::alloc::{Layout, alloc, dealloc};
use std::ptr::{self, NonNull};

use crate::error::{MemoryError, MemoryResult};
use crate::header::{self, BlockTag, HEADER_SIZE};
use crate::size_class::{SizeClass, SizeClassTable};

/// Alignment of every chunk buffer
pub(crate) const CHUNK_ALIGN: usize = 16;

/// Memory chunk owned by the arena
struct Chunk {
    ptr: NonNull<u8>,
    capacity: usize,
    next: Option<Box<Chunk>>,
}

impl Chunk {
    /// Allocates a chunk of exactly `size` bytes
    fn new(size: usize) -> MemoryResult<Self> {
        let layout = Layout::from_size_align(size, CHUNK_ALIGN)
            .map_err(|_| MemoryError::out_of_memory(size, CHUNK_ALIGN))?;

        // SAFETY: Allocating chunk memory via the global allocator.
        // - layout has non-zero size (size >= HEADER_SIZE + MIN_CLASS_SIZE)
        // - CHUNK_ALIGN is a power of two
        // - alloc returns null on failure (handled below)
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| MemoryError::out_of_memory_with_layout(layout))?;

        Ok(Self {
            ptr,
            capacity: size,
            next: None,
        })
    }

    #[inline]
    fn start(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    fn end(&self) -> *mut u8 {
        // SAFETY: One-past-end pointer of the chunk allocation.
        unsafe { self.ptr.as_ptr().add(self.capacity) }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: Deallocating chunk memory.
        // - ptr was allocated in new() with this size and CHUNK_ALIGN
        // - Drop runs exactly once per chunk
        unsafe {
            dealloc(
                self.ptr.as_ptr(),
                Layout::from_size_align_unchecked(self.capacity, CHUNK_ALIGN),
            );
        }
    }
}

/// Totals returned by [`PoolArena::release_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ChunkRelease {
    pub(crate) chunks: usize,
    pub(crate) bytes: usize,
}

/// Bump-carving arena with per-class reuse
pub(crate) struct PoolArena {
    chunks: Option<Box<Chunk>>,
    cursor: *mut u8,
    end: *mut u8,
    chunk_size: usize,
    classes: SizeClassTable,

    chunk_count: usize,
    chunk_bytes: usize,
    carved_bytes: usize,
    chunk_growths: u64,
    reuse_hits: u64,
}

// SAFETY: PoolArena exclusively owns its chunks.
// - Raw pointers only point into chunks owned by this arena
// - No thread-local state, moving the whole arena moves every chunk with it
// - Not Sync: all mutation goes through &mut self
unsafe impl Send for PoolArena {}

impl PoolArena {
    /// Creates an empty arena, no memory is reserved until the first carve
    pub(crate) fn new(chunk_size: usize, small_threshold: usize) -> Self {
        Self {
            chunks: None,
            cursor: ptr::null_mut(),
            end: ptr::null_mut(),
            chunk_size,
            classes: SizeClassTable::new(small_threshold),
            chunk_count: 0,
            chunk_bytes: 0,
            carved_bytes: 0,
            chunk_growths: 0,
            reuse_hits: 0,
        }
    }

    #[inline]
    pub(crate) fn classes(&self) -> &SizeClassTable {
        &self.classes
    }

    /// Returns a tagged payload for `class`
    ///
    /// Reuses the most recently freed block of the class if there is one,
    /// otherwise carves a new block. Reused blocks are not cleared.
    pub(crate) fn allocate(&mut self, class: SizeClass) -> MemoryResult<NonNull<u8>> {
        if let Some(payload) = self.classes.pop(class) {
            self.reuse_hits += 1;
            // The free-list link overwrote only payload bytes, the header
            // still holds this class
            return Ok(payload);
        }

        let stride = HEADER_SIZE + class.size();
        let block = self.carve(stride)?;

        // SAFETY: block is the start of `stride` fresh bytes in a chunk.
        // - payload = block + HEADER_SIZE stays inside the block
        // - block is 8-byte aligned, so payload is too
        unsafe {
            let payload = NonNull::new_unchecked(block.as_ptr().add(HEADER_SIZE));
            header::write(payload, BlockTag::Small(class));
            Ok(payload)
        }
    }

    /// Puts a small payload back on its class free list
    ///
    /// # Safety
    ///
    /// `payload` must have been returned by [`allocate`](Self::allocate) for
    /// `class` on this arena and must not be freed twice.
    #[inline]
    pub(crate) unsafe fn release(&mut self, payload: NonNull<u8>, class: SizeClass) {
        // SAFETY: forwarded from caller
        unsafe { self.classes.push(class, payload) };
    }

    /// Bumps the cursor by `stride` bytes, growing the chunk list if the
    /// head chunk cannot fit it
    fn carve(&mut self, stride: usize) -> MemoryResult<NonNull<u8>> {
        if self.remaining() < stride {
            self.grow(stride)?;
        }

        let block = self.cursor;
        // SAFETY: At least `stride` bytes remain between cursor and end.
        self.cursor = unsafe { self.cursor.add(stride) };
        self.carved_bytes += stride;

        // SAFETY: cursor is inside a live chunk and therefore non-null
        Ok(unsafe { NonNull::new_unchecked(block) })
    }

    /// Links a new chunk at the head of the list
    ///
    /// The unused tail of the previous head chunk is abandoned.
    fn grow(&mut self, min_size: usize) -> MemoryResult<()> {
        let size = self.chunk_size.max(min_size);
        let mut chunk = Chunk::new(size)?;

        self.cursor = chunk.start();
        self.end = chunk.end();

        chunk.next = self.chunks.take();
        self.chunks = Some(Box::new(chunk));

        self.chunk_count += 1;
        self.chunk_bytes += size;
        self.chunk_growths += 1;

        tracing::trace!(
            chunk_size = size,
            chunk_count = self.chunk_count,
            "pool chunk allocated"
        );

        Ok(())
    }

    /// Returns true if `ptr` could be a payload in one of the arena's chunks,
    /// meaning a full header word lies before it inside the same chunk
    pub(crate) fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        let mut node = self.chunks.as_deref();
        while let Some(chunk) = node {
            if (chunk.start() as usize + HEADER_SIZE..chunk.end() as usize).contains(&addr) {
                return true;
            }
            node = chunk.next.as_deref();
        }
        false
    }

    /// Frees every chunk and forgets every free block
    ///
    /// The list is unlinked one node at a time so long chunk lists do not
    /// recurse through `Box` drops.
    pub(crate) fn release_all(&mut self) -> ChunkRelease {
        let mut released = ChunkRelease::default();
        let mut node = self.chunks.take();
        while let Some(mut chunk) = node {
            node = chunk.next.take();
            released.chunks += 1;
            released.bytes += chunk.capacity;
        }

        self.cursor = ptr::null_mut();
        self.end = ptr::null_mut();
        self.classes.clear();
        self.chunk_count = 0;
        self.chunk_bytes = 0;
        self.carved_bytes = 0;

        released
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub(crate) fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    pub(crate) fn carved_bytes(&self) -> usize {
        self.carved_bytes
    }

    pub(crate) fn chunk_growths(&self) -> u64 {
        self.chunk_growths
    }

    pub(crate) fn reuse_hits(&self) -> u64 {
        self.reuse_hits
    }

    /// Bytes left in the head chunk
    pub(crate) fn remaining(&self) -> usize {
        (self.end as usize) - (self.cursor as usize)
    }
}

impl Drop for PoolArena {
    fn drop(&mut self) {
        self.release_all();
    }
}
