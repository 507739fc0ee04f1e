//! Registry for allocations above the small threshold
//!
//! Large requests skip the chunk arena. Each one is a single global
//! allocation holding a registry node followed by the payload; the nodes form
//! an intrusive doubly linked list so a block can be unlinked in O(1) from
//! its payload pointer, and the whole list can be released on teardown.
//!
//! ```text
//! [ prev | next | size | tag ][ payload ... ]
//!   ^ node start               ^ node start + NODE_SIZE
//! ```

use std::alloc::{Layout, alloc, dealloc};
use std::mem::{offset_of, size_of};
use std::ptr::{self, NonNull};

use crate::error::{MemoryError, MemoryResult};
use crate::header::{BlockTag, HEADER_SIZE};

/// Alignment of every large allocation, and therefore of its payload
pub(crate) const LARGE_ALIGN: usize = 16;

#[repr(C)]
struct LargeNode {
    prev: *mut LargeNode,
    next: *mut LargeNode,
    size: usize,
    /// Shared header slot, must stay the last field
    tag: u64,
}

const NODE_SIZE: usize = size_of::<LargeNode>();

// The tag must sit directly before the payload so `header::read` finds it.
const _: () = assert!(NODE_SIZE == offset_of!(LargeNode, tag) + HEADER_SIZE);
const _: () = assert!(NODE_SIZE % LARGE_ALIGN == 0);

/// Totals returned by [`LargeAllocationRegistry::release_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LargeRelease {
    pub(crate) count: usize,
    pub(crate) bytes: usize,
}

/// Intrusive list of live large allocations
pub(crate) struct LargeAllocationRegistry {
    head: *mut LargeNode,
    live: usize,
    live_bytes: usize,
}

// SAFETY: The registry exclusively owns every node on its list.
// - Nodes are only reachable through this registry
// - Moving the registry moves ownership of all nodes
unsafe impl Send for LargeAllocationRegistry {}

impl LargeAllocationRegistry {
    pub(crate) const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            live: 0,
            live_bytes: 0,
        }
    }

    fn layout_for(size: usize) -> MemoryResult<Layout> {
        NODE_SIZE
            .checked_add(size)
            .and_then(|total| Layout::from_size_align(total, LARGE_ALIGN).ok())
            .ok_or_else(|| MemoryError::out_of_memory(size, LARGE_ALIGN))
    }

    /// Allocates a tagged payload of `size` bytes and links its node at the
    /// head of the list
    pub(crate) fn allocate(&mut self, size: usize) -> MemoryResult<NonNull<u8>> {
        let layout = Self::layout_for(size)?;

        // SAFETY: Allocating node + payload via the global allocator.
        // - layout size >= NODE_SIZE > 0
        // - alloc returns null on failure (handled below)
        let raw = unsafe { alloc(layout) };
        let node = NonNull::new(raw.cast::<LargeNode>())
            .ok_or_else(|| MemoryError::out_of_memory_with_layout(layout))?;

        // SAFETY: node points to a fresh allocation of at least NODE_SIZE
        // bytes, aligned to LARGE_ALIGN >= align_of::<LargeNode>().
        unsafe {
            node.as_ptr().write(LargeNode {
                prev: ptr::null_mut(),
                next: self.head,
                size,
                tag: BlockTag::LARGE,
            });
            if let Some(mut old_head) = NonNull::new(self.head) {
                old_head.as_mut().prev = node.as_ptr();
            }
        }
        self.head = node.as_ptr();
        self.live += 1;
        self.live_bytes += size;

        tracing::trace!(size, live = self.live, "large allocation");

        // SAFETY: payload starts right after the node, inside the allocation
        Ok(unsafe { NonNull::new_unchecked(raw.add(NODE_SIZE)) })
    }

    /// Recovers the node that precedes `payload`
    ///
    /// # Safety
    ///
    /// `payload` must be a live pointer returned by [`allocate`](Self::allocate).
    #[inline]
    unsafe fn node_of(payload: NonNull<u8>) -> NonNull<LargeNode> {
        // SAFETY: forwarded from caller, the node sits NODE_SIZE bytes before
        unsafe { NonNull::new_unchecked(payload.as_ptr().sub(NODE_SIZE).cast()) }
    }

    /// Requested size of a live large payload
    ///
    /// # Safety
    ///
    /// `payload` must be a live pointer returned by [`allocate`](Self::allocate).
    pub(crate) unsafe fn payload_size(payload: NonNull<u8>) -> usize {
        // SAFETY: forwarded from caller
        unsafe { Self::node_of(payload).as_ref().size }
    }

    /// Unlinks and releases a large payload, returning its requested size
    ///
    /// # Safety
    ///
    /// `payload` must be a live pointer returned by [`allocate`](Self::allocate)
    /// on this registry, and must not be used afterwards.
    pub(crate) unsafe fn free(&mut self, payload: NonNull<u8>) -> usize {
        // SAFETY: forwarded from caller
        let node = unsafe { Self::node_of(payload) };

        // SAFETY: Unlinking a live node.
        // - node and its neighbours are live nodes owned by this registry
        // - head is updated when node has no predecessor
        let size = unsafe {
            let LargeNode {
                prev, next, size, ..
            } = node.as_ptr().read();
            match NonNull::new(prev) {
                Some(mut prev) => prev.as_mut().next = next,
                None => self.head = next,
            }
            if let Some(mut next) = NonNull::new(next) {
                next.as_mut().prev = prev;
            }
            size
        };

        self.live -= 1;
        self.live_bytes -= size;

        // SAFETY: Same layout as in allocate, which succeeded for this size
        unsafe {
            dealloc(
                node.as_ptr().cast(),
                Layout::from_size_align_unchecked(NODE_SIZE + size, LARGE_ALIGN),
            );
        }

        tracing::trace!(size, live = self.live, "large allocation freed");

        size
    }

    /// Releases every live large allocation
    pub(crate) fn release_all(&mut self) -> LargeRelease {
        let mut released = LargeRelease::default();
        let mut node = self.head;

        while let Some(current) = NonNull::new(node) {
            // SAFETY: Walking and freeing nodes owned by this registry.
            // - next is read before the node is released
            // - each node was allocated with NODE_SIZE + size at LARGE_ALIGN
            unsafe {
                let LargeNode { next, size, .. } = current.as_ptr().read();
                dealloc(
                    current.as_ptr().cast(),
                    Layout::from_size_align_unchecked(NODE_SIZE + size, LARGE_ALIGN),
                );
                released.count += 1;
                released.bytes += size;
                node = next;
            }
        }

        self.head = ptr::null_mut();
        self.live = 0;
        self.live_bytes = 0;

        released
    }

    pub(crate) fn live(&self) -> usize {
        self.live
    }

    pub(crate) fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// Returns true if `payload` is the payload of a node on this list
    ///
    /// O(n) walk, only used for debug validation.
    pub(crate) fn contains(&self, payload: *const u8) -> bool {
        let mut node = self.head;
        while let Some(current) = NonNull::new(node) {
            // SAFETY: every node on the list is live
            unsafe {
                if current.as_ptr().cast::<u8>().add(NODE_SIZE).cast_const() == payload {
                    return true;
                }
                node = current.as_ref().next;
            }
        }
        false
    }
}

impl Drop for LargeAllocationRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}
