//! Process-wide single-instance holder
//!
//! At most one value per type can be installed at a time. Installing returns
//! a [`SingletonOwner`]; while it lives, [`Singleton::get`] hands out shared
//! handles to the value, and dropping it uninstalls the type again.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

type Registry = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

static REGISTRY: LazyLock<Mutex<Registry>> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// Access point for the installed instance of `T`
///
/// # Examples
/// ```
/// use tidepool_support::Singleton;
///
/// struct Settings { workers: usize }
///
/// let owner = Singleton::install(Settings { workers: 4 });
/// assert_eq!(Singleton::<Settings>::get().workers, 4);
///
/// drop(owner);
/// assert!(!Singleton::<Settings>::is_installed());
/// ```
pub struct Singleton<T>(PhantomData<fn() -> T>);

impl<T: Any + Send + Sync> Singleton<T> {
    /// Installs `value` as the instance of `T`
    ///
    /// # Panics
    ///
    /// If an instance of `T` is already installed.
    pub fn install(value: T) -> SingletonOwner<T> {
        match Self::try_install(value) {
            Ok(owner) => owner,
            Err(_) => panic!("singleton {} is already installed", type_name::<T>()),
        }
    }

    /// Installs `value`, handing it back if `T` is already installed
    pub fn try_install(value: T) -> Result<SingletonOwner<T>, T> {
        let mut registry = REGISTRY.lock();
        if registry.contains_key(&TypeId::of::<T>()) {
            return Err(value);
        }

        let value = Arc::new(value);
        registry.insert(TypeId::of::<T>(), Arc::clone(&value) as Arc<dyn Any + Send + Sync>);
        drop(registry);

        tracing::debug!(singleton = type_name::<T>(), "singleton installed");
        Ok(SingletonOwner { value })
    }

    /// Shared handle to the installed instance
    ///
    /// # Panics
    ///
    /// If no instance of `T` is installed.
    pub fn get() -> Arc<T> {
        match Self::try_get() {
            Some(value) => value,
            None => panic!("singleton {} is not installed", type_name::<T>()),
        }
    }

    /// Shared handle to the installed instance, if any
    pub fn try_get() -> Option<Arc<T>> {
        let entry = REGISTRY.lock().get(&TypeId::of::<T>()).cloned()?;
        entry.downcast::<T>().ok()
    }

    /// True while an owner for `T` is alive
    pub fn is_installed() -> bool {
        REGISTRY.lock().contains_key(&TypeId::of::<T>())
    }
}

/// Keeps an installed instance registered; uninstalls it on drop
///
/// Handles obtained from [`Singleton::get`] stay valid after the owner is
/// dropped, but no new ones can be obtained.
pub struct SingletonOwner<T: Any + Send + Sync> {
    value: Arc<T>,
}

impl<T: Any + Send + Sync> Deref for SingletonOwner<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Any + Send + Sync> fmt::Debug for SingletonOwner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonOwner")
            .field("type", &type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T: Any + Send + Sync> Drop for SingletonOwner<T> {
    fn drop(&mut self) {
        REGISTRY.lock().remove(&TypeId::of::<T>());
        tracing::debug!(singleton = type_name::<T>(), "singleton uninstalled");
    }
}
