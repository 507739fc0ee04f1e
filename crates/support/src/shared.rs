//! Intrusive atomically reference-counted pointer
//!
//! # Safety
//!
//! The count lives inside the pointee ([`RefCount`] embedded in `T`), so a
//! raw pointer obtained with [`SharedPtr::into_raw`] can be turned back into
//! an owning pointer without a side allocation.
//!
//! ## Invariants
//!
//! - The count equals the number of live `SharedPtr`s (plus raw pointers
//!   not yet passed back to `from_raw`)
//! - The value is dropped exactly once, when the count reaches zero
//! - Increments are `Relaxed`; the final decrement is `Release` followed by
//!   an `Acquire` fence before the value is dropped

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering, fence};

/// Reference count embedded in a [`RefCounted`] value
#[derive(Default)]
pub struct RefCount(AtomicUsize);

impl RefCount {
    /// A count for a value that has no owners yet
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCount").field(&self.get()).finish()
    }
}

/// Types that carry their own reference count
///
/// # Safety
///
/// `ref_count` must return the same `RefCount` for the lifetime of the value,
/// and nothing other than [`SharedPtr`] may modify it.
pub unsafe trait RefCounted {
    /// The embedded count
    fn ref_count(&self) -> &RefCount;
}

/// Owning pointer to an intrusively counted `T`
///
/// # Examples
/// ```
/// use tidepool_support::{RefCount, RefCounted, SharedPtr};
///
/// #[derive(Default)]
/// struct Session { refs: RefCount, id: u32 }
///
/// unsafe impl RefCounted for Session {
///     fn ref_count(&self) -> &RefCount { &self.refs }
/// }
///
/// let a = SharedPtr::new(Session { id: 9, ..Default::default() });
/// let b = a.clone();
/// assert_eq!(a.use_count(), 2);
/// assert!(SharedPtr::ptr_eq(&a, &b));
/// assert_eq!(b.id, 9);
/// ```
pub struct SharedPtr<T: RefCounted> {
    ptr: NonNull<T>,
}

// SAFETY: Same rules as Arc.
// - The count is atomic, so clones may be dropped on any thread
// - The value is shared, so T must be Sync; it may be dropped on any
//   thread, so T must be Send
unsafe impl<T: RefCounted + Send + Sync> Send for SharedPtr<T> {}
unsafe impl<T: RefCounted + Send + Sync> Sync for SharedPtr<T> {}

impl<T: RefCounted> SharedPtr<T> {
    /// Moves `value` to the heap with a count of one
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        // SAFETY: ptr was just created from a live Box
        unsafe { ptr.as_ref() }
            .ref_count()
            .0
            .store(1, Ordering::Relaxed);
        Self { ptr }
    }

    fn count(&self) -> &AtomicUsize {
        &self.get().ref_count().0
    }

    /// Borrows the value
    pub fn get(&self) -> &T {
        // SAFETY: the value lives while any SharedPtr to it exists
        unsafe { self.ptr.as_ref() }
    }

    /// Number of owners of the value
    pub fn use_count(&self) -> usize {
        self.get().ref_count().get()
    }

    /// True if both pointers own the same value
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }

    /// Drops this owner and takes ownership of `value` instead
    pub fn reset(&mut self, value: T) {
        *self = Self::new(value);
    }

    /// Leaks this owner as a raw pointer, keeping its count
    pub fn into_raw(this: Self) -> *const T {
        let this = ManuallyDrop::new(this);
        this.ptr.as_ptr()
    }

    /// Rebuilds an owner from [`into_raw`](Self::into_raw)
    ///
    /// # Safety
    ///
    /// `ptr` must come from `into_raw` on a `SharedPtr<T>` and be passed here
    /// exactly once.
    pub unsafe fn from_raw(ptr: *const T) -> Self {
        Self {
            // SAFETY: into_raw never returns null
            ptr: unsafe { NonNull::new_unchecked(ptr.cast_mut()) },
        }
    }
}

impl<T: RefCounted> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        let previous = self.count().fetch_add(1, Ordering::Relaxed);
        assert!(previous < isize::MAX as usize, "SharedPtr count overflow");
        Self { ptr: self.ptr }
    }
}

impl<T: RefCounted> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        if self.count().fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);

        // SAFETY: Last owner releases the value.
        // - count reached zero, no other SharedPtr exists
        // - ptr came from Box::leak in new()
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

impl<T: RefCounted> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: RefCounted + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.get(), f)
    }
}
