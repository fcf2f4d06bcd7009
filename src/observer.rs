//! Diagnostic observers for singleton lifecycle events.
//!
//! Observers are notified synchronously from inside the registry, some of
//! them while the singleton lock is held. Keep implementations cheap and
//! never call back into the registry from an observer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::RegistryError;

/// Observer trait for singleton registry events.
///
/// Every method has an empty default so implementations only override the
/// events they care about.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{RegistryObserver, SingletonRegistry};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct PrintObserver;
///
/// impl RegistryObserver for PrintObserver {
///     fn created(&self, name: &str, duration: Duration) {
///         println!("created {} in {:?}", name, duration);
///     }
/// }
///
/// let registry = SingletonRegistry::new();
/// registry.add_observer(Arc::new(PrintObserver));
/// registry.get_or_create_singleton("answer", || Ok(Arc::new(42u32))).unwrap();
/// ```
pub trait RegistryObserver: Send + Sync {
    /// A singleton factory is about to be invoked.
    fn creating(&self, _name: &str) {}

    /// A singleton was created and stored as fully-created.
    fn created(&self, _name: &str, _duration: Duration) {}

    /// A singleton factory failed; the error is about to be returned.
    fn creation_failed(&self, _name: &str, _error: &RegistryError) {}

    /// An early reference was materialized for a bean still in creation.
    fn early_reference(&self, _name: &str) {}

    /// A bean's destruction callback completed.
    fn destroyed(&self, _name: &str) {}

    /// A bean's destruction callback failed or panicked.
    fn destroy_failed(&self, _name: &str, _message: &str) {}
}

/// Observer that forwards every event to `tracing`.
///
/// ```
/// use ferrous_ioc::{LoggingObserver, SingletonRegistry};
/// use std::sync::Arc;
///
/// let registry = SingletonRegistry::new();
/// registry.add_observer(Arc::new(LoggingObserver::new()));
/// ```
#[derive(Debug, Default, Clone)]
pub struct LoggingObserver {
    prefix: Option<String>,
}

impl LoggingObserver {
    /// Creates a logging observer without a prefix.
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Creates a logging observer that tags every event with `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }

    fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("registry")
    }
}

impl RegistryObserver for LoggingObserver {
    fn creating(&self, name: &str) {
        tracing::debug!(target: "ferrous_ioc::observer", registry = self.prefix(), bean = name, "creating singleton");
    }

    fn created(&self, name: &str, duration: Duration) {
        tracing::debug!(
            target: "ferrous_ioc::observer",
            registry = self.prefix(),
            bean = name,
            elapsed_us = duration.as_micros() as u64,
            "created singleton"
        );
    }

    fn creation_failed(&self, name: &str, error: &RegistryError) {
        tracing::warn!(target: "ferrous_ioc::observer", registry = self.prefix(), bean = name, %error, "singleton creation failed");
    }

    fn early_reference(&self, name: &str) {
        tracing::trace!(target: "ferrous_ioc::observer", registry = self.prefix(), bean = name, "exposed early reference");
    }

    fn destroyed(&self, name: &str) {
        tracing::trace!(target: "ferrous_ioc::observer", registry = self.prefix(), bean = name, "destroyed bean");
    }

    fn destroy_failed(&self, name: &str, message: &str) {
        tracing::warn!(target: "ferrous_ioc::observer", registry = self.prefix(), bean = name, reason = message, "destroy callback failed");
    }
}

/// Counters collected by [`MetricsObserver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryMetrics {
    /// Successful singleton creations
    pub created: u64,
    /// Failed singleton creations
    pub failed: u64,
    /// Early references materialized
    pub early_references: u64,
    /// Destruction callbacks that completed
    pub destroyed: u64,
    /// Destruction callbacks that failed
    pub destroy_failures: u64,
    /// Total time spent inside successful factories
    pub creation_time: Duration,
}

/// Observer that counts lifecycle events.
///
/// ```
/// use ferrous_ioc::{MetricsObserver, SingletonRegistry};
/// use std::sync::Arc;
///
/// let metrics = Arc::new(MetricsObserver::new());
/// let registry = SingletonRegistry::new();
/// registry.add_observer(metrics.clone());
///
/// registry.get_or_create_singleton("a", || Ok(Arc::new(1u8))).unwrap();
/// registry.get_or_create_singleton("a", || Ok(Arc::new(2u8))).unwrap();
///
/// assert_eq!(metrics.snapshot().created, 1);
/// ```
#[derive(Debug, Default)]
pub struct MetricsObserver {
    created: AtomicU64,
    failed: AtomicU64,
    early_references: AtomicU64,
    destroyed: AtomicU64,
    destroy_failures: AtomicU64,
    creation_nanos: AtomicU64,
}

impl MetricsObserver {
    /// Creates an observer with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values.
    pub fn snapshot(&self) -> RegistryMetrics {
        RegistryMetrics {
            created: self.created.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            early_references: self.early_references.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            destroy_failures: self.destroy_failures.load(Ordering::Relaxed),
            creation_time: Duration::from_nanos(self.creation_nanos.load(Ordering::Relaxed)),
        }
    }
}

impl RegistryObserver for MetricsObserver {
    fn created(&self, _name: &str, duration: Duration) {
        self.created.fetch_add(1, Ordering::Relaxed);
        self.creation_nanos.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn creation_failed(&self, _name: &str, _error: &RegistryError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn early_reference(&self, _name: &str) {
        self.early_references.fetch_add(1, Ordering::Relaxed);
    }

    fn destroyed(&self, _name: &str) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    fn destroy_failed(&self, _name: &str, _message: &str) {
        self.destroy_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Container for registered observers.
///
/// Designed to have minimal overhead when no observers are registered.
#[derive(Default)]
pub(crate) struct Observers {
    observers: RwLock<Vec<Arc<dyn RegistryObserver>>>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Arc<dyn RegistryObserver>) {
        self.observers.write().push(observer);
    }

    #[cfg(test)]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.read().is_empty()
    }

    #[inline]
    fn each(&self, f: impl Fn(&dyn RegistryObserver)) {
        // Snapshot so observers never run under the list lock.
        let observers = self.observers.read().clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    pub(crate) fn creating(&self, name: &str) {
        self.each(|o| o.creating(name));
    }

    pub(crate) fn created(&self, name: &str, duration: Duration) {
        self.each(|o| o.created(name, duration));
    }

    pub(crate) fn creation_failed(&self, name: &str, error: &RegistryError) {
        self.each(|o| o.creation_failed(name, error));
    }

    pub(crate) fn early_reference(&self, name: &str) {
        self.each(|o| o.early_reference(name));
    }

    pub(crate) fn destroyed(&self, name: &str) {
        self.each(|o| o.destroyed(name));
    }

    pub(crate) fn destroy_failed(&self, name: &str, message: &str) {
        self.each(|o| o.destroy_failed(name, message));
    }
}
