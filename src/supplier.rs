//! Lazily-initialised, thread-safe singleton supplier.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::{RegistryError, RegistryResult};

type Supplier<T> = Box<dyn Fn() -> Option<Arc<T>> + Send + Sync>;

/// Supplies a single shared instance, computed on first access.
///
/// The instance comes from the instance supplier, or from the default
/// supplier if the former yields nothing. A `None` result is not cached, so
/// a later call tries again. Concurrent first calls compute the instance at
/// most once.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::SingletonSupplier;
/// use std::sync::Arc;
///
/// let supplier = SingletonSupplier::with_default(|| None, || Some(Arc::new("fallback")));
/// assert_eq!(*supplier.obtain().unwrap(), "fallback");
///
/// let fixed = SingletonSupplier::of(Arc::new(5u32));
/// assert!(Arc::ptr_eq(&fixed.get().unwrap(), &fixed.get().unwrap()));
/// ```
pub struct SingletonSupplier<T: Send + Sync + 'static> {
    instance_supplier: Option<Supplier<T>>,
    default_supplier: Option<Supplier<T>>,
    instance: OnceCell<Arc<T>>,
}

impl<T: Send + Sync + 'static> SingletonSupplier<T> {
    /// Supplier for an already existing instance.
    pub fn of(instance: Arc<T>) -> Self {
        Self {
            instance_supplier: None,
            default_supplier: None,
            instance: OnceCell::with_value(instance),
        }
    }

    /// Supplier backed by `supplier`.
    pub fn of_supplier<F>(supplier: F) -> Self
    where
        F: Fn() -> Option<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            instance_supplier: Some(Box::new(supplier)),
            default_supplier: None,
            instance: OnceCell::new(),
        }
    }

    /// Supplier backed by `supplier`, falling back to `default`.
    pub fn with_default<F, D>(supplier: F, default: D) -> Self
    where
        F: Fn() -> Option<Arc<T>> + Send + Sync + 'static,
        D: Fn() -> Option<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            instance_supplier: Some(Box::new(supplier)),
            default_supplier: Some(Box::new(default)),
            instance: OnceCell::new(),
        }
    }

    /// The shared instance, if one can be supplied.
    pub fn get(&self) -> Option<Arc<T>> {
        self.instance
            .get_or_try_init(|| {
                self.instance_supplier
                    .as_ref()
                    .and_then(|supplier| supplier())
                    .or_else(|| self.default_supplier.as_ref().and_then(|supplier| supplier()))
                    .ok_or(())
            })
            .ok()
            .cloned()
    }

    /// The shared instance; fails if none can be supplied.
    pub fn obtain(&self) -> RegistryResult<Arc<T>> {
        self.get().ok_or_else(|| RegistryError::NotFound(type_name::<T>().to_string()))
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for SingletonSupplier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonSupplier")
            .field("type", &type_name::<T>())
            .field("initialized", &self.instance.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn computes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let supplier = SingletonSupplier::of_supplier(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(String::from("value")))
        });
        let a = supplier.get().unwrap();
        let b = supplier.get().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_result_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let supplier = SingletonSupplier::of_supplier(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            (n > 0).then(|| Arc::new(n))
        });
        assert!(supplier.get().is_none());
        assert_eq!(*supplier.get().unwrap(), 1);
    }

    #[test]
    fn obtain_fails_without_instance() {
        let supplier: SingletonSupplier<u8> = SingletonSupplier::of_supplier(|| None);
        assert!(matches!(supplier.obtain(), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn concurrent_first_access_initialises_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let supplier = SingletonSupplier::of_supplier(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            Some(Arc::new(0u64))
        });
        crossbeam_utils::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|_| supplier.get().unwrap());
            }
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
