//! Ordered teardown of registered singletons.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::SingletonRegistry;
use crate::DisposableBean;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl SingletonRegistry {
    /// Destroys every singleton that registered a destruction callback, in
    /// reverse registration order, then clears all caches.
    ///
    /// Dependents of a bean are destroyed before the bean itself. Failures
    /// and panics in callbacks are logged and never abort the teardown.
    /// While this runs, [`get_or_create_singleton`](Self::get_or_create_singleton)
    /// fails with [`RegistryError::DestructionInProgress`](crate::RegistryError::DestructionInProgress).
    /// The registry is usable again afterwards.
    pub fn destroy_singletons(&self) {
        tracing::debug!("Destroying singletons in {:?}", self);
        {
            let _guard = self.singleton_lock.lock();
            self.in_destruction.store(true, Ordering::SeqCst);
        }

        let names = self.disposable_beans.lock().names();
        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        self.graph.clear();
        self.clear_singleton_cache();
    }

    /// Removes `name` from the caches and runs its destruction callback,
    /// destroying its dependents first and its inner beans after.
    ///
    /// Each callback runs at most once; destroying an already destroyed or
    /// unknown bean only drops it from the caches.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn destroy_singleton(&self, name: &str) {
        self.remove_singleton(name);
        let disposable = self.disposable_beans.lock().remove(name);
        self.destroy_bean_with(name, disposable);
    }

    fn destroy_bean_with(&self, name: &str, disposable: Option<Arc<dyn DisposableBean>>) {
        let dependents = self.graph.take_dependents(name);
        if !dependents.is_empty() {
            tracing::debug!(bean = name, ?dependents, "Retrieved dependent beans for bean '{}'", name);
        }
        for dependent in &dependents {
            self.destroy_singleton(dependent);
        }

        if let Some(bean) = disposable {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match bean.destroy() {
                Ok(()) => {
                    tracing::trace!(bean = name, "invoked destroy callback");
                    self.observers.destroyed(name);
                }
                Err(err) => {
                    let message = err.to_string();
                    tracing::warn!(bean = name, error = %message, "Destruction of bean with name '{}' threw an exception", name);
                    self.observers.destroy_failed(name, &message);
                }
            }));
            if let Err(payload) = outcome {
                let message = panic_message(payload.as_ref());
                tracing::warn!(bean = name, error = %message, "Destruction of bean with name '{}' panicked", name);
                if panic::catch_unwind(AssertUnwindSafe(|| self.observers.destroy_failed(name, &message))).is_err() {
                    tracing::warn!(bean = name, "observer panicked while reporting a failed destruction");
                }
            }
        }

        for contained in self.graph.take_contained(name) {
            self.destroy_singleton(&contained);
        }

        self.graph.purge(name);
    }

    /// Empties every cache tier and leaves destruction mode.
    ///
    /// Relationship and disposable registrations are left alone; use
    /// [`destroy_singletons`](Self::destroy_singletons) for a full teardown.
    pub fn clear_singleton_cache(&self) {
        let guard = self.singleton_lock.lock();
        self.singleton_objects.write().clear();
        self.early_singleton_objects.write().clear();
        self.factory_bean_objects.clear();
        {
            let mut state = guard.borrow_mut();
            state.singleton_factories.clear();
            state.registered_singletons.clear();
        }
        self.in_destruction.store(false, Ordering::SeqCst);
    }
}
