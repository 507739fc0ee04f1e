//! Size classes and per-class free lists
//!
//! Small requests are rounded up to a class in 8-byte steps starting at
//! 16 bytes. Each class keeps an intrusive LIFO free list: a freed payload
//! stores the link to the next free block of the same class in its first
//! word, so the table itself is one pointer per class.
//!
//! ## Invariants
//!
//! - A class list only ever holds blocks carved for that class
//! - Every block in a list is at least `MIN_CLASS_SIZE` bytes and 8-byte aligned
//! - Pushing and popping are O(1)

use core::ptr::{self, NonNull};

/// Smallest class size in bytes
pub const MIN_CLASS_SIZE: usize = 16;

/// Step between consecutive classes in bytes
pub const CLASS_GRANULARITY: usize = 8;

/// A canonical small-allocation size
///
/// Classes are identified by their index: class `i` holds blocks of
/// `16 + 8 * i` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SizeClass(usize);

impl SizeClass {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Smallest class whose size is at least `size`
    ///
    /// This ignores any threshold; use [`Pool::class_of`](crate::Pool::class_of)
    /// to classify a request against a concrete pool.
    ///
    /// # Examples
    /// ```
    /// use tidepool_memory::SizeClass;
    ///
    /// assert_eq!(SizeClass::for_size(1).size(), 16);
    /// assert_eq!(SizeClass::for_size(17).size(), 24);
    /// assert_eq!(SizeClass::for_size(128).size(), 128);
    /// ```
    #[inline]
    pub const fn for_size(size: usize) -> Self {
        Self(size.saturating_sub(MIN_CLASS_SIZE).div_ceil(CLASS_GRANULARITY))
    }

    /// Position of this class in the table
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Usable bytes of every block in this class
    #[inline]
    pub const fn size(self) -> usize {
        MIN_CLASS_SIZE + self.0 * CLASS_GRANULARITY
    }
}

/// Node in a free list
///
/// Lives in the first bytes of a freed payload.
#[repr(C)]
struct FreeBlock {
    next: *mut FreeBlock,
}

/// Classification and free-list bookkeeping for one pool
pub(crate) struct SizeClassTable {
    /// One LIFO list head per class, null when empty
    heads: Box<[*mut FreeBlock]>,
    /// Largest request routed through this table
    threshold: usize,
}

impl SizeClassTable {
    /// Creates an empty table covering every request up to `threshold`
    pub(crate) fn new(threshold: usize) -> Self {
        let count = SizeClass::for_size(threshold).index() + 1;
        Self {
            heads: vec![ptr::null_mut(); count].into_boxed_slice(),
            threshold,
        }
    }

    /// Smallest class that fits `size`, or `None` if the request is large
    #[inline]
    pub(crate) fn class_of(&self, size: usize) -> Option<SizeClass> {
        if size <= self.threshold {
            Some(SizeClass::for_size(size))
        } else {
            None
        }
    }

    /// Number of classes
    #[inline]
    pub(crate) fn class_count(&self) -> usize {
        self.heads.len()
    }

    /// Prepends `block` to the free list of `class`
    ///
    /// # Safety
    ///
    /// - `block` must have been carved for exactly `class`
    /// - `block` must not already be on any free list
    /// - No live reference into `block` may be used afterwards
    #[inline]
    pub(crate) unsafe fn push(&mut self, class: SizeClass, block: NonNull<u8>) {
        let head = &mut self.heads[class.index()];
        let node = block.as_ptr().cast::<FreeBlock>();

        // SAFETY: Storing the link in the freed payload.
        // - block is at least MIN_CLASS_SIZE bytes (every class is)
        // - block is 8-byte aligned, enough for a pointer
        // - caller hands the block over, nothing else reads it now
        unsafe {
            node.write(FreeBlock { next: *head });
        }

        *head = node;
    }

    /// Removes and returns the most recently pushed block of `class`
    #[inline]
    pub(crate) fn pop(&mut self, class: SizeClass) -> Option<NonNull<u8>> {
        let head = &mut self.heads[class.index()];
        let node = NonNull::new(*head)?;

        // SAFETY: Reading the link of the list head.
        // - node is non-null and was written by push
        // - blocks on a free list are owned by the table until popped
        *head = unsafe { node.as_ref().next };

        Some(node.cast())
    }

    /// Walks the free list of `class` and counts its blocks
    pub(crate) fn free_len(&self, class: SizeClass) -> usize {
        let mut count = 0;
        let mut node = self.heads[class.index()];
        while !node.is_null() {
            count += 1;
            // SAFETY: node is a block pushed onto this list, see pop
            node = unsafe { (*node).next };
        }
        count
    }

    /// Total number of blocks waiting for reuse across every class
    pub(crate) fn free_blocks(&self) -> usize {
        (0..self.class_count())
            .map(|index| self.free_len(SizeClass::from_index(index)))
            .sum()
    }

    /// Forgets every free block
    ///
    /// Used when the chunks backing the blocks are released.
    pub(crate) fn clear(&mut self) {
        self.heads.fill(ptr::null_mut());
    }
}
