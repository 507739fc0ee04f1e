//! Smart pointer for pool-allocated values

use core::fmt;
use core::marker::PhantomData;
use core::mem::{ManuallyDrop, align_of, size_of};
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use crate::error::{MemoryError, MemoryResult};
use crate::pool::{ALIGNMENT, Pool};

/// RAII smart pointer for a value stored in a [`Pool`]
///
/// Returns its block to the pool when dropped. Similar to `Box` but backed
/// by a pool; the borrow of the pool keeps it alive (and undestroyed) for as
/// long as the box exists.
///
/// # Examples
/// ```
/// use tidepool_memory::{Pool, PoolBox};
///
/// let pool = Pool::create(4096, 128)?;
/// let mut point = PoolBox::new_in((1u32, 2u32), &pool)?;
/// point.0 += 10;
/// assert_eq!(*point, (11, 2));
/// # Ok::<(), tidepool_memory::MemoryError>(())
/// ```
pub struct PoolBox<'pool, T> {
    ptr: NonNull<T>,
    pool: &'pool Pool,
    _owns: PhantomData<T>,
}

impl<'pool, T> PoolBox<'pool, T> {
    /// Moves `value` into a block allocated from `pool`
    ///
    /// # Errors
    ///
    /// - [`MemoryError::UnsupportedAlignment`] if `T` needs more than
    ///   [`ALIGNMENT`]
    /// - [`MemoryError::OutOfMemory`] if the pool cannot get memory
    #[must_use = "allocated value must be used"]
    pub fn new_in(value: T, pool: &'pool Pool) -> MemoryResult<Self> {
        if align_of::<T>() > ALIGNMENT {
            return Err(MemoryError::unsupported_alignment(
                align_of::<T>(),
                ALIGNMENT,
            ));
        }

        let ptr = pool.allocate(size_of::<T>())?.cast::<T>();

        // SAFETY: Initializing the fresh block.
        // - block holds at least size_of::<T>() bytes
        // - block is ALIGNMENT-aligned, which is >= align_of::<T>()
        // - nothing else references the block yet
        unsafe { ptr.as_ptr().write(value) };

        Ok(Self {
            ptr,
            pool,
            _owns: PhantomData,
        })
    }

    /// Pool this value lives in
    pub fn pool(this: &Self) -> &'pool Pool {
        this.pool
    }

    /// Consumes the box and returns the contained value
    #[must_use]
    pub fn into_inner(this: Self) -> T {
        let this = ManuallyDrop::new(this);

        // SAFETY: Moving the value out, then returning the block.
        // - ptr points to an initialized T owned by this box
        // - ManuallyDrop keeps Drop from running a second drop or free
        // - the block came from this pool and is freed exactly once
        unsafe {
            let value = ptr::read(this.ptr.as_ptr());
            this.pool.free(this.ptr.as_ptr().cast());
            value
        }
    }
}

impl<T> Deref for PoolBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: ptr points to an initialized T owned by this box
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PoolBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: &mut self gives exclusive access to the owned T
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Drop for PoolBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: Dropping the value and returning its block.
        // - ptr points to an initialized T, dropped exactly once here
        // - the block came from self.pool and has not been freed
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            self.pool.free(self.ptr.as_ptr().cast());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use std::cell::Cell;
    use std::rc::Rc;

    fn pool() -> Pool {
        let config = PoolConfig::debug()
            .with_chunk_size(1024)
            .with_small_threshold(128);
        Pool::with_config(config).unwrap()
    }

    #[test]
    fn deref_and_mutate() {
        let pool = pool();
        let mut value = PoolBox::new_in(vec![1, 2, 3], &pool).unwrap();
        value.push(4);
        assert_eq!(value.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(pool.stats().live_small, 1);
    }

    #[test]
    fn drop_runs_destructor_and_frees() {
        struct Flag(Rc<Cell<bool>>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let pool = pool();
        let dropped = Rc::new(Cell::new(false));
        {
            let _boxed = PoolBox::new_in(Flag(Rc::clone(&dropped)), &pool).unwrap();
        }

        assert!(dropped.get());
        let stats = pool.stats();
        assert_eq!(stats.live_small, 0);
        assert_eq!(stats.free_blocks, 1);
    }

    #[test]
    fn into_inner_moves_value_out() {
        let pool = pool();
        let boxed = PoolBox::new_in(String::from("scratch"), &pool).unwrap();
        let value = PoolBox::into_inner(boxed);

        assert_eq!(value, "scratch");
        assert_eq!(pool.stats().live_small, 0);
    }

    #[test]
    fn large_values_use_registry() {
        let pool = pool();
        let boxed = PoolBox::new_in([7u8; 512], &pool).unwrap();

        assert_eq!(pool.stats().live_large, 1);
        assert!(boxed.iter().all(|&b| b == 7));
        drop(boxed);
        assert_eq!(pool.stats().live_large, 0);
    }

    #[test]
    fn zero_sized_values() {
        let pool = pool();
        let unit = PoolBox::new_in((), &pool).unwrap();
        assert_eq!(*unit, ());
        assert!(core::ptr::eq(PoolBox::pool(&unit), &pool));
    }

    #[test]
    fn over_aligned_type_is_rejected() {
        #[derive(Debug)]
        #[repr(align(32))]
        struct Wide([u8; 32]);

        let pool = pool();
        let error = PoolBox::new_in(Wide([0; 32]), &pool).unwrap_err();
        assert_eq!(
            error,
            MemoryError::UnsupportedAlignment {
                align: 32,
                max: ALIGNMENT
            }
        );
    }
}
