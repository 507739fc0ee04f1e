//! Dynamically typed value slot
//!
//! [`DynValue`] holds at most one value of any `'static + Send` type and
//! remembers its type name for diagnostics. Access is by checked downcast.

use std::any::{Any, type_name};
use std::fmt;

/// A single value of runtime-chosen type
///
/// # Examples
/// ```
/// use tidepool_support::DynValue;
///
/// let mut slot = DynValue::new(String::from("ready"));
/// assert!(slot.is::<String>());
/// assert_eq!(slot.downcast_ref::<String>().map(String::as_str), Some("ready"));
/// assert_eq!(slot.take::<u32>(), None);
/// assert_eq!(slot.take::<String>().as_deref(), Some("ready"));
/// assert!(slot.is_empty());
/// ```
#[derive(Default)]
pub struct DynValue {
    inner: Option<Slot>,
}

struct Slot {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl DynValue {
    /// Stores `value`
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            inner: Some(Slot {
                value: Box::new(value),
                type_name: type_name::<T>(),
            }),
        }
    }

    /// An empty slot
    pub const fn empty() -> Self {
        Self { inner: None }
    }

    /// Replaces the contents, returning whether something was stored before
    pub fn set<T: Any + Send>(&mut self, value: T) -> bool {
        let had_value = self.inner.is_some();
        *self = Self::new(value);
        had_value
    }

    /// True if the slot holds a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.inner.as_ref().is_some_and(|slot| slot.value.is::<T>())
    }

    /// Borrows the value if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.as_ref()?.value.downcast_ref()
    }

    /// Mutably borrows the value if it is a `T`
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.as_mut()?.value.downcast_mut()
    }

    /// Moves the value out if it is a `T`, leaving the slot empty
    ///
    /// A value of another type stays in place.
    pub fn take<T: Any>(&mut self) -> Option<T> {
        if !self.is::<T>() {
            return None;
        }
        let slot = self.inner.take()?;
        slot.value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    /// Type name of the stored value, `None` when empty
    pub fn type_name(&self) -> Option<&'static str> {
        self.inner.as_ref().map(|slot| slot.type_name)
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Drops the stored value
    pub fn reset(&mut self) {
        self.inner = None;
    }
}

impl fmt::Debug for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => write!(f, "DynValue<{name}>"),
            None => f.write_str("DynValue(empty)"),
        }
    }
}
