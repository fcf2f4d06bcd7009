//! Bean definitions: how a bean is built, wired, initialised and destroyed.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::bean::{downcast_bean, Bean};
use crate::{BoxError, DisposableBean, FactoryBean, RegistryError, RegistryResult};

/// Bean scopes controlling instance sharing.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{bean, BeanDefinition, BeanFactory, BeanScope};
/// use std::sync::Arc;
///
/// let factory = BeanFactory::new();
/// factory.register_definition("shared", BeanDefinition::new(|_| Ok(bean(1u32)))).unwrap();
/// factory
///     .register_definition("fresh", BeanDefinition::new(|_| Ok(bean(2u32))).scope(BeanScope::Prototype))
///     .unwrap();
///
/// assert!(Arc::ptr_eq(&factory.get_bean("shared").unwrap(), &factory.get_bean("shared").unwrap()));
/// assert!(!Arc::ptr_eq(&factory.get_bean("fresh").unwrap(), &factory.get_bean("fresh").unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeanScope {
    /// One instance per registry, cached until destruction
    ///
    /// Singletons take part in circular reference resolution and receive
    /// their destroy callback on teardown.
    #[default]
    Singleton,
    /// New instance per lookup, never cached
    ///
    /// Prototype beans cannot be part of a circular reference.
    Prototype,
}

impl BeanScope {
    pub fn is_singleton(self) -> bool {
        self == BeanScope::Singleton
    }
}

/// Collaborators resolved for a bean, in declaration order.
#[derive(Default, Clone)]
pub struct ResolvedRefs {
    beans: Vec<(String, Bean)>,
}

impl ResolvedRefs {
    pub(crate) fn push(&mut self, name: &str, bean: Bean) {
        self.beans.push((name.to_string(), bean));
    }

    /// Resolved collaborator `name`.
    pub fn get(&self, name: &str) -> Option<&Bean> {
        self.beans.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    /// Resolved collaborator `name` downcast to `T`.
    ///
    /// Fails with [`RegistryError::NotFound`] if `name` was not declared or
    /// was optional and could not be resolved.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> RegistryResult<Arc<T>> {
        let bean = self.get(name).cloned().ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        downcast_bean(name, bean)
    }

    /// True if `name` was resolved.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names of the resolved collaborators.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.beans.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }
}

impl fmt::Debug for ResolvedRefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// A reference from one bean definition to another bean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BeanRef {
    pub(crate) name: String,
    pub(crate) optional: bool,
}

pub(crate) type InstantiateFn = dyn Fn(&ResolvedRefs) -> RegistryResult<Bean> + Send + Sync;
pub(crate) type PopulateFn = dyn Fn(&str, &Bean, &ResolvedRefs) -> RegistryResult<()> + Send + Sync;
pub(crate) type InitFn = dyn Fn(&str, &Bean) -> RegistryResult<()> + Send + Sync;
pub(crate) type DestroyFn = dyn Fn(&Bean) -> Result<(), BoxError> + Send + Sync;
pub(crate) type FactoryBeanFn = dyn Fn(&Bean) -> Option<Arc<dyn FactoryBean>> + Send + Sync;

fn typed<'a, T: Any + Send + Sync>(name: &str, bean: &'a Bean) -> RegistryResult<&'a T> {
    bean.downcast_ref::<T>().ok_or_else(|| RegistryError::TypeMismatch {
        name: name.to_string(),
        expected: type_name::<T>(),
    })
}

/// Describes how to create and wire one bean.
///
/// Construction happens in phases, mirroring how a container resolves
/// circular references:
///
/// 1. constructor references are resolved and the instance is created;
/// 2. a singleton is exposed early so collaborators can refer to it;
/// 3. property references are resolved and handed to `populate`;
/// 4. `init` runs;
/// 5. `destroy` is registered for teardown.
///
/// Only references resolved in phase 3 can form a cycle. A cycle through
/// constructor references fails with
/// [`RegistryError::CircularCreation`].
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{BeanDefinition, BeanFactory};
/// use once_cell::sync::OnceCell;
/// use std::sync::{Arc, Weak};
///
/// #[derive(Default)]
/// struct Parent { child: OnceCell<Arc<Child>> }
/// #[derive(Default)]
/// struct Child { parent: OnceCell<Weak<Parent>> }
///
/// let factory = BeanFactory::new();
/// factory.register_definition("parent", BeanDefinition::of(|_| Ok(Parent::default()))
///     .property_ref("child")
///     .populate(|parent: &Parent, refs| {
///         let _ = parent.child.set(refs.get_as::<Child>("child")?);
///         Ok(())
///     })).unwrap();
/// factory.register_definition("child", BeanDefinition::of(|_| Ok(Child::default()))
///     .property_ref("parent")
///     .populate(|child: &Child, refs| {
///         let _ = child.parent.set(Arc::downgrade(&refs.get_as::<Parent>("parent")?));
///         Ok(())
///     })).unwrap();
///
/// let parent = factory.get_bean_as::<Parent>("parent").unwrap();
/// let child = parent.child.get().unwrap();
/// assert!(Arc::ptr_eq(&child.parent.get().unwrap().upgrade().unwrap(), &parent));
/// ```
#[derive(Clone)]
pub struct BeanDefinition {
    pub(crate) scope: BeanScope,
    pub(crate) lazy_init: bool,
    pub(crate) depends_on: Vec<String>,
    pub(crate) constructor_refs: Vec<BeanRef>,
    pub(crate) property_refs: Vec<BeanRef>,
    pub(crate) instantiate: Arc<InstantiateFn>,
    pub(crate) populate: Option<Arc<PopulateFn>>,
    pub(crate) init: Option<Arc<InitFn>>,
    pub(crate) destroy: Option<Arc<DestroyFn>>,
    pub(crate) factory_bean: Option<Arc<FactoryBeanFn>>,
    pub(crate) bean_type: Option<&'static str>,
}

impl BeanDefinition {
    /// Definition whose instance is produced by `instantiate`.
    pub fn new<F>(instantiate: F) -> Self
    where
        F: Fn(&ResolvedRefs) -> RegistryResult<Bean> + Send + Sync + 'static,
    {
        Self {
            scope: BeanScope::Singleton,
            lazy_init: false,
            depends_on: Vec::new(),
            constructor_refs: Vec::new(),
            property_refs: Vec::new(),
            instantiate: Arc::new(instantiate),
            populate: None,
            init: None,
            destroy: None,
            factory_bean: None,
            bean_type: None,
        }
    }

    /// Typed variant of [`new`](Self::new).
    pub fn of<T, F>(instantiate: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ResolvedRefs) -> RegistryResult<T> + Send + Sync + 'static,
    {
        let mut definition = Self::new(move |refs| instantiate(refs).map(|value| Arc::new(value) as Bean));
        definition.bean_type = Some(type_name::<T>());
        definition
    }

    /// Definition for a bean implementing [`FactoryBean`]. Lookups by name
    /// return the produced object; prefix the name with `&` to get the
    /// factory itself.
    pub fn factory_bean<T, F>(instantiate: F) -> Self
    where
        T: FactoryBean,
        F: Fn(&ResolvedRefs) -> RegistryResult<T> + Send + Sync + 'static,
    {
        let mut definition = Self::of(instantiate);
        definition.factory_bean = Some(Arc::new(|bean: &Bean| {
            bean.clone().downcast::<T>().ok().map(|factory| factory as Arc<dyn FactoryBean>)
        }));
        definition
    }

    pub fn scope(mut self, scope: BeanScope) -> Self {
        self.scope = scope;
        self
    }

    /// Shorthand for `scope(BeanScope::Prototype)`.
    pub fn prototype(self) -> Self {
        self.scope(BeanScope::Prototype)
    }

    /// Skip this bean in [`pre_instantiate_singletons`](crate::BeanFactory::pre_instantiate_singletons).
    pub fn lazy(mut self) -> Self {
        self.lazy_init = true;
        self
    }

    /// Bean that must be created before this one and destroyed after it.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    /// Collaborator required to instantiate the bean.
    pub fn constructor_ref(mut self, name: impl Into<String>) -> Self {
        self.constructor_refs.push(BeanRef { name: name.into(), optional: false });
        self
    }

    /// Collaborator injected after instantiation.
    pub fn property_ref(mut self, name: impl Into<String>) -> Self {
        self.property_refs.push(BeanRef { name: name.into(), optional: false });
        self
    }

    /// Collaborator injected after instantiation if it can be resolved.
    ///
    /// A resolution failure is recorded as a suppressed error of the
    /// current creation and the collaborator is left out of the
    /// [`ResolvedRefs`].
    pub fn optional_property_ref(mut self, name: impl Into<String>) -> Self {
        self.property_refs.push(BeanRef { name: name.into(), optional: true });
        self
    }

    /// Wires property references into the instance.
    pub fn populate<T, F>(mut self, populate: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &ResolvedRefs) -> RegistryResult<()> + Send + Sync + 'static,
    {
        self.populate = Some(Arc::new(move |name: &str, bean: &Bean, refs: &ResolvedRefs| {
            populate(typed::<T>(name, bean)?, refs)
        }));
        self
    }

    /// Runs once the bean is fully wired.
    pub fn init<T, F>(mut self, init: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> RegistryResult<()> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(move |name: &str, bean: &Bean| init(typed::<T>(name, bean)?)));
        self
    }

    /// Runs when a singleton is destroyed.
    pub fn destroy<T, F>(mut self, destroy: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.destroy = Some(Arc::new(move |bean: &Bean| match bean.downcast_ref::<T>() {
            Some(value) => destroy(value),
            None => Err(format!("bean is not a {}", type_name::<T>()).into()),
        }));
        self
    }

    /// Uses the bean's own [`DisposableBean`] implementation on teardown.
    pub fn disposable<T: DisposableBean>(self) -> Self {
        self.destroy(|bean: &T| bean.destroy())
    }

    pub fn scope_kind(&self) -> BeanScope {
        self.scope
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy_init
    }

    pub fn is_factory_bean(&self) -> bool {
        self.factory_bean.is_some()
    }

    /// Names from [`depends_on`](Self::depends_on).
    pub fn depends_on_names(&self) -> &[String] {
        &self.depends_on
    }

    pub(crate) fn as_factory_bean(&self, bean: &Bean) -> Option<Arc<dyn FactoryBean>> {
        self.factory_bean.as_ref().and_then(|accessor| accessor(bean))
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("type", &self.bean_type.unwrap_or("?"))
            .field("scope", &self.scope)
            .field("lazy_init", &self.lazy_init)
            .field("depends_on", &self.depends_on)
            .field("constructor_refs", &self.constructor_refs)
            .field("property_refs", &self.property_refs)
            .field("factory_bean", &self.factory_bean.is_some())
            .finish()
    }
}

/// Destroy callback bound to the instance it was registered for.
pub(crate) struct DefinitionDisposable {
    pub(crate) bean: Bean,
    pub(crate) destroy: Arc<DestroyFn>,
}

impl DisposableBean for DefinitionDisposable {
    fn destroy(&self) -> Result<(), BoxError> {
        (self.destroy)(&self.bean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean;

    #[test]
    fn builder_records_references() {
        let definition = BeanDefinition::new(|_| Ok(bean(1u8)))
            .depends_on("db")
            .constructor_ref("config")
            .property_ref("repo")
            .optional_property_ref("metrics")
            .lazy();
        assert!(definition.is_lazy());
        assert_eq!(definition.depends_on_names(), ["db".to_string()]);
        assert_eq!(definition.constructor_refs.len(), 1);
        assert!(definition.property_refs[1].optional);
        assert_eq!(definition.scope_kind(), BeanScope::Singleton);
    }

    #[test]
    fn typed_callbacks_reject_wrong_types() {
        let definition = BeanDefinition::new(|_| Ok(bean(1u8))).init(|_: &String| Ok(()));
        let init = definition.init.unwrap();
        let err = init("x", &bean(1u8)).unwrap_err();
        assert!(matches!(err, RegistryError::TypeMismatch { .. }));
    }

    #[test]
    fn resolved_refs_lookup() {
        let mut refs = ResolvedRefs::default();
        refs.push("a", bean(3u16));
        assert_eq!(*refs.get_as::<u16>("a").unwrap(), 3);
        assert!(matches!(refs.get_as::<u16>("b"), Err(RegistryError::NotFound(_))));
        assert!(matches!(refs.get_as::<u8>("a"), Err(RegistryError::TypeMismatch { .. })));
        assert_eq!(refs.names().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn definition_disposable_runs_callback() {
        let definition = BeanDefinition::new(|_| Ok(bean(1u8))).destroy(|value: &u8| {
            if *value == 1 {
                Ok(())
            } else {
                Err("unexpected".into())
            }
        });
        let disposable = DefinitionDisposable {
            bean: bean(1u8),
            destroy: definition.destroy.unwrap(),
        };
        assert!(disposable.destroy().is_ok());
    }
}
