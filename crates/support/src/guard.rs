//! Scope-exit guards
//!
//! Thin wrapper over [`scopeguard`] for the common case of "run this closure
//! when the scope ends, unless told otherwise".

use std::fmt;

use scopeguard::ScopeGuard;

fn run<F: FnOnce()>(f: F) {
    f();
}

/// Runs a closure when dropped, unless dismissed
///
/// The closure also runs during unwinding.
///
/// # Examples
/// ```
/// use std::cell::Cell;
/// use tidepool_support::on_scope_exit;
///
/// let closed = Cell::new(false);
/// {
///     let _close = on_scope_exit(|| closed.set(true));
///     assert!(!closed.get());
/// }
/// assert!(closed.get());
/// ```
#[must_use = "binding the guard to `_` runs the closure immediately"]
pub struct ScopeExit<F: FnOnce()> {
    guard: ScopeGuard<F, fn(F)>,
}

impl<F: FnOnce()> ScopeExit<F> {
    /// Arms a guard that calls `f` at end of scope
    pub fn new(f: F) -> Self {
        Self {
            guard: scopeguard::guard(f, run::<F> as fn(F)),
        }
    }

    /// Disarms the guard; the closure is dropped without being called
    pub fn dismiss(self) {
        drop(ScopeGuard::into_inner(self.guard));
    }
}

impl<F: FnOnce()> fmt::Debug for ScopeExit<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeExit").finish_non_exhaustive()
    }
}

/// Shorthand for [`ScopeExit::new`]
pub fn on_scope_exit<F: FnOnce()>(f: F) -> ScopeExit<F> {
    ScopeExit::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn runs_once_at_scope_end() {
        let count = Cell::new(0);
        {
            let _guard = on_scope_exit(|| count.set(count.get() + 1));
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dismissed_guard_does_not_run() {
        let ran = Cell::new(false);
        let guard = on_scope_exit(|| ran.set(true));
        guard.dismiss();
        assert!(!ran.get());
    }

    #[test]
    fn guards_run_in_reverse_order() {
        let order = RefCell::new(Vec::new());
        {
            let _first = on_scope_exit(|| order.borrow_mut().push(1));
            let _second = on_scope_exit(|| order.borrow_mut().push(2));
        }
        assert_eq!(*order.borrow(), [2, 1]);
    }

    #[test]
    fn runs_during_unwind() {
        let ran = Cell::new(false);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = on_scope_exit(|| ran.set(true));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(ran.get());
    }
}
