//! Type-erased bean handles and object factories.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::{RegistryError, RegistryResult};

/// A shared, type-erased bean instance.
///
/// Every cache in the registry stores beans as `Arc<dyn Any + Send + Sync>`,
/// so the same instance can be handed out to any number of threads and
/// compared by pointer identity.
pub type Bean = Arc<dyn Any + Send + Sync>;

/// Lazily produces an early reference to a bean that is still being created.
///
/// Registered through [`SingletonRegistry::add_singleton_factory`] and
/// consumed at most once.
///
/// [`SingletonRegistry::add_singleton_factory`]: crate::SingletonRegistry::add_singleton_factory
pub type ObjectFactory = Box<dyn FnOnce() -> Bean + Send>;

/// Wraps a value into a [`Bean`].
///
/// # Examples
///
/// ```
/// use ferrous_ioc::bean;
///
/// let b = bean(String::from("hello"));
/// assert!(b.downcast_ref::<String>().is_some());
/// ```
pub fn bean<T: Any + Send + Sync>(value: T) -> Bean {
    Arc::new(value)
}

/// Downcasts a bean to its concrete type, reporting `name` on mismatch.
pub fn downcast_bean<T: Any + Send + Sync>(name: &str, bean: Bean) -> RegistryResult<Arc<T>> {
    bean.downcast::<T>().map_err(|_| RegistryError::TypeMismatch {
        name: name.to_string(),
        expected: type_name::<T>(),
    })
}

/// Returns true when both handles point at the same instance.
#[inline]
pub fn same_bean(a: &Bean, b: &Bean) -> bool {
    Arc::ptr_eq(a, b)
}

/// Placeholder stored for a factory bean that produced no object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullBean;

impl NullBean {
    /// Returns true when `bean` is the null placeholder.
    pub fn is_null(bean: &Bean) -> bool {
        bean.is::<NullBean>()
    }
}

impl fmt::Display for NullBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_reports_type_on_mismatch() {
        let b = bean(5u32);
        match downcast_bean::<String>("count", b) {
            Err(RegistryError::TypeMismatch { name, expected }) => {
                assert_eq!(name, "count");
                assert!(expected.contains("String"));
            }
            _ => panic!("expected a type mismatch"),
        }
    }

    #[test]
    fn null_bean_is_detected() {
        assert!(NullBean::is_null(&bean(NullBean)));
        assert!(!NullBean::is_null(&bean(1u8)));
    }

    #[test]
    fn same_bean_compares_identity() {
        let a = bean(1u8);
        let b = a.clone();
        assert!(same_bean(&a, &b));
        assert!(!same_bean(&a, &bean(1u8)));
    }
}
