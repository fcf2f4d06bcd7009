//! Destruction callbacks for singleton teardown.

use crate::error::BoxError;

/// Trait for beans that release resources when the registry shuts down.
///
/// Implement this for anything registered through
/// [`register_disposable_bean`](crate::SingletonRegistry::register_disposable_bean).
/// Callbacks run during [`destroy_singletons`](crate::SingletonRegistry::destroy_singletons)
/// in reverse registration order, with every dependent bean destroyed
/// before the bean it depends on. Errors are logged and never propagated.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{DisposableBean, SingletonRegistry, BoxError};
/// use std::sync::Arc;
///
/// struct Pool {
///     name: String,
/// }
///
/// impl DisposableBean for Pool {
///     fn destroy(&self) -> Result<(), BoxError> {
///         println!("Closing pool: {}", self.name);
///         Ok(())
///     }
/// }
///
/// let registry = SingletonRegistry::new();
/// registry.register_disposable_bean("pool", Arc::new(Pool { name: "main".to_string() }));
/// registry.destroy_singletons();
/// ```
pub trait DisposableBean: Send + Sync + 'static {
    /// Perform cleanup of resources.
    fn destroy(&self) -> Result<(), BoxError>;
}

/// Adapts a closure into a [`DisposableBean`].
///
/// The disposable registered for a bean does not have to be the bean
/// itself; a callback capturing whatever needs closing is often simpler.
///
/// ```
/// use ferrous_ioc::{DestroyCallback, SingletonRegistry};
/// use std::sync::Arc;
///
/// let registry = SingletonRegistry::new();
/// registry.register_disposable_bean(
///     "cache",
///     Arc::new(DestroyCallback::new(|| {
///         println!("cache flushed");
///         Ok(())
///     })),
/// );
/// registry.destroy_singletons();
/// ```
pub struct DestroyCallback<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
{
    callback: F,
}

impl<F> DestroyCallback<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
{
    /// Wraps `callback`.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> DisposableBean for DestroyCallback<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn destroy(&self) -> Result<(), BoxError> {
        (self.callback)()
    }
}
