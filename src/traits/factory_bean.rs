//! Beans that are themselves factories for other objects.

use crate::{Bean, RegistryResult};

/// A bean that produces the object exposed under its name.
///
/// The registry caches the produced object separately from the factory
/// itself when [`is_singleton`](FactoryBean::is_singleton) returns true; see
/// [`FactoryBeanObjects`](crate::FactoryBeanObjects).
///
/// Returning `Ok(None)` means the object is not available yet. That is an
/// error while the factory bean is still in creation and is otherwise
/// exposed as a [`NullBean`](crate::NullBean).
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{bean, Bean, FactoryBean, RegistryResult};
///
/// struct ConnectionFactory {
///     url: String,
/// }
///
/// impl FactoryBean for ConnectionFactory {
///     fn get_object(&self) -> RegistryResult<Option<Bean>> {
///         Ok(Some(bean(format!("connection to {}", self.url))))
///     }
/// }
///
/// let factory = ConnectionFactory { url: "postgres://localhost".to_string() };
/// assert!(factory.is_singleton());
/// assert!(factory.get_object().unwrap().is_some());
/// ```
pub trait FactoryBean: Send + Sync + 'static {
    /// Produce the exposed object.
    fn get_object(&self) -> RegistryResult<Option<Bean>>;

    /// Whether the produced object is shared.
    fn is_singleton(&self) -> bool {
        true
    }
}
