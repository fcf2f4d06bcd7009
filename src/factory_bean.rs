//! Objects produced by [`FactoryBean`]s.
//!
//! A factory bean is registered as a singleton like any other bean, but what
//! callers usually want is the object it produces. For singleton factory
//! beans that object is cached here, next to the registry's own caches, and
//! dropped together with the factory bean.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::RwLock;

use crate::bean::{bean, Bean, NullBean};
use crate::{FactoryBean, RegistryError, RegistryResult, SingletonRegistry};

/// Post-processing hook applied to objects obtained from a factory bean.
pub type ObjectPostProcessor = dyn Fn(&str, Bean) -> RegistryResult<Bean> + Send + Sync;

/// Cache of objects created by singleton factory beans, keyed by the
/// factory bean's name.
#[derive(Default)]
pub struct FactoryBeanObjects {
    objects: RwLock<HashMap<String, Bean>>,
}

impl std::fmt::Debug for FactoryBeanObjects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.objects.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("FactoryBeanObjects").field("cached", &names).finish()
    }
}

impl FactoryBeanObjects {
    /// Cached object for the factory bean `name`, if any.
    pub fn get_cached_object(&self, name: &str) -> Option<Bean> {
        self.objects.read().get(name).cloned()
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    pub(crate) fn insert(&self, name: &str, object: Bean) {
        self.objects.write().insert(name.to_string(), object);
    }

    pub(crate) fn remove(&self, name: &str) {
        self.objects.write().remove(name);
    }

    pub(crate) fn clear(&self) {
        self.objects.write().clear();
    }
}

impl SingletonRegistry {
    /// Cached object produced by the singleton factory bean `name`.
    pub fn get_cached_object_for_factory_bean(&self, name: &str) -> Option<Bean> {
        self.factory_bean_objects().get_cached_object(name)
    }

    /// Obtains the object exposed by `factory`, registered under `name`.
    ///
    /// For a singleton factory bean that is itself a registered singleton,
    /// the object is produced once under the singleton lock and cached.
    /// If the cache gained an entry while `get_object` ran (a circular
    /// lookup through the factory bean), that entry wins. `post_process`
    /// is skipped, and nothing is cached, while `name` is still in
    /// creation; otherwise it runs bracketed by the in-creation checks.
    ///
    /// Any other factory bean produces a fresh object on every call.
    ///
    /// A factory bean returning no object yields a [`NullBean`], unless the
    /// factory bean is in creation, which fails with
    /// [`RegistryError::CircularCreation`].
    pub fn get_object_from_factory_bean(
        &self,
        factory: &dyn FactoryBean,
        name: &str,
        post_process: Option<&ObjectPostProcessor>,
    ) -> RegistryResult<Bean> {
        if factory.is_singleton() && self.contains_singleton(name) {
            return self.with_singleton_lock(|| {
                if let Some(cached) = self.factory_bean_objects().get_cached_object(name) {
                    return Ok(cached);
                }
                let mut object = self.object_from(factory, name)?;
                if let Some(already_there) = self.factory_bean_objects().get_cached_object(name) {
                    return Ok(already_there);
                }
                if let Some(post_process) = post_process {
                    if self.is_singleton_currently_in_creation(name) {
                        return Ok(object);
                    }
                    self.before_singleton_creation(name)?;
                    let processed = panic::catch_unwind(AssertUnwindSafe(|| post_process(name, object)));
                    let after = self.after_singleton_creation(name);
                    let processed = processed.unwrap_or_else(|payload| panic::resume_unwind(payload));
                    after?;
                    object = processed.map_err(|err| post_processing_failed(name, err))?;
                }
                if self.contains_singleton(name) {
                    self.factory_bean_objects().insert(name, object.clone());
                }
                Ok(object)
            });
        }

        let object = self.object_from(factory, name)?;
        match post_process {
            Some(post_process) => post_process(name, object).map_err(|err| post_processing_failed(name, err)),
            None => Ok(object),
        }
    }

    fn object_from(&self, factory: &dyn FactoryBean, name: &str) -> RegistryResult<Bean> {
        match factory.get_object() {
            Ok(Some(object)) => Ok(object),
            Ok(None) if self.is_singleton_currently_in_creation(name) => {
                tracing::debug!(bean = name, "factory bean in creation returned no object");
                Err(RegistryError::CircularCreation(name.to_string()))
            }
            Ok(None) => Ok(bean(NullBean)),
            Err(err @ RegistryError::CircularCreation(_)) => Err(err),
            Err(err) => Err(RegistryError::construction(name, FactoryBeanFailure(err))),
        }
    }
}

fn post_processing_failed(name: &str, err: RegistryError) -> RegistryError {
    match err {
        err @ RegistryError::CircularCreation(_) => err,
        other => RegistryError::construction(name, PostProcessingFailure(other)),
    }
}

#[derive(Debug)]
struct FactoryBeanFailure(RegistryError);

impl std::fmt::Display for FactoryBeanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FactoryBean threw exception on object creation: {}", self.0)
    }
}

impl std::error::Error for FactoryBeanFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[derive(Debug)]
struct PostProcessingFailure(RegistryError);

impl std::fmt::Display for PostProcessingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Post-processing of FactoryBean's object failed: {}", self.0)
    }
}

impl std::error::Error for PostProcessingFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}
