//! Bean factory driving the singleton registry from bean definitions.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bean::{downcast_bean, Bean};
use crate::definition::{BeanRef, DefinitionDisposable};
use crate::internal::PrototypeGuard;
use crate::{BeanDefinition, RegistryError, RegistryResult, RegistrySettings, ResolvedRefs, SingletonRegistry};

/// Prefix that asks for a factory bean itself instead of its product.
pub const FACTORY_BEAN_PREFIX: &str = "&";

/// Container that creates beans from [`BeanDefinition`]s.
///
/// Singletons are created through the embedded [`SingletonRegistry`], so
/// collaborators injected through property references may form cycles.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{BeanDefinition, BeanFactory};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db: Arc<Database> }
///
/// let factory = BeanFactory::new();
/// factory
///     .register_definition("db", BeanDefinition::of(|_| Ok(Database { url: "postgres://localhost".into() })))
///     .unwrap();
/// factory
///     .register_definition(
///         "repo",
///         BeanDefinition::of(|refs| Ok(Repository { db: refs.get_as::<Database>("db")? })).constructor_ref("db"),
///     )
///     .unwrap();
///
/// let repo = factory.get_bean_as::<Repository>("repo").unwrap();
/// assert_eq!(repo.db.url, "postgres://localhost");
/// assert_eq!(factory.registry().get_dependent_beans("db"), vec!["repo".to_string()]);
/// ```
pub struct BeanFactory {
    registry: SingletonRegistry,
    definitions: RwLock<HashMap<String, Arc<BeanDefinition>>>,
    definition_names: RwLock<Vec<String>>,
}

impl Default for BeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BeanFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanFactory")
            .field("definitions", &*self.definition_names.read())
            .field("registry", &self.registry)
            .finish()
    }
}

fn strip_factory_prefix(name: &str) -> (&str, bool) {
    let mut stripped = name;
    let mut dereference = false;
    while let Some(rest) = stripped.strip_prefix(FACTORY_BEAN_PREFIX) {
        stripped = rest;
        dereference = true;
    }
    (stripped, dereference)
}

impl BeanFactory {
    pub fn new() -> Self {
        Self::with_settings(RegistrySettings::default())
    }

    pub fn with_settings(settings: RegistrySettings) -> Self {
        Self {
            registry: SingletonRegistry::with_settings(settings),
            definitions: RwLock::new(HashMap::new()),
            definition_names: RwLock::new(Vec::new()),
        }
    }

    /// The registry holding this factory's singletons.
    pub fn registry(&self) -> &SingletonRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &RegistrySettings {
        self.registry.settings()
    }

    // ----- definitions --------------------------------------------------

    /// Registers `definition` under `name`.
    ///
    /// Replacing an existing definition requires `allow_definition_overriding`
    /// and destroys any singleton already created from the old one.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn register_definition(&self, name: &str, definition: BeanDefinition) -> RegistryResult<()> {
        assert!(!name.is_empty(), "Bean name must not be empty");
        let mut definitions = self.definitions.write();
        let replaced = definitions.contains_key(name);
        if replaced {
            if !self.settings().allow_definition_overriding {
                return Err(RegistryError::DefinitionOverride(format!(
                    "bean definition '{}' is already registered",
                    name
                )));
            }
            tracing::debug!("Overriding bean definition for bean '{}'", name);
        }
        if self.registry.aliases().is_alias(name) {
            if !self.settings().allow_definition_overriding {
                return Err(RegistryError::DefinitionOverride(format!("'{}' is already in use as an alias", name)));
            }
            self.registry.aliases().remove_alias(name);
        }
        definitions.insert(name.to_string(), Arc::new(definition));
        drop(definitions);

        if replaced {
            self.registry.destroy_singleton(name);
        } else {
            self.definition_names.write().push(name.to_string());
        }
        Ok(())
    }

    /// Removes the definition and any singleton created from it.
    pub fn remove_definition(&self, name: &str) -> RegistryResult<()> {
        if self.definitions.write().remove(name).is_none() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        self.definition_names.write().retain(|n| n != name);
        self.registry.destroy_singleton(name);
        Ok(())
    }

    /// Registers `alias` for the bean `name`.
    pub fn register_alias(&self, name: &str, alias: &str) -> RegistryResult<()> {
        self.registry.register_alias(name, alias)
    }

    pub fn get_definition(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        let name = self.registry.canonical_name(strip_factory_prefix(name).0);
        self.definitions.read().get(&name).cloned()
    }

    pub fn contains_definition(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    /// Names of registered definitions, in registration order.
    pub fn definition_names(&self) -> Vec<String> {
        self.definition_names.read().clone()
    }

    /// True if a singleton or a definition exists for `name` or its alias.
    pub fn contains_bean(&self, name: &str) -> bool {
        let canonical = self.registry.canonical_name(strip_factory_prefix(name).0);
        self.registry.contains_singleton(&canonical) || self.contains_definition(&canonical)
    }

    // ----- lookup -------------------------------------------------------

    /// Returns the bean `name`, creating it if needed.
    ///
    /// Aliases are resolved. For a factory bean the produced object is
    /// returned; `&name` returns the factory bean itself.
    pub fn get_bean(&self, name: &str) -> RegistryResult<Bean> {
        let (stripped, dereference) = strip_factory_prefix(name);
        let bean_name = self.registry.canonical_name(stripped);

        // Early references are only handed to the thread that is creating
        // the bean; any other thread waits for the finished instance.
        let shared = if self.registry.is_singleton_in_creation_on_current_thread(&bean_name) {
            self.registry.get_singleton(&bean_name)
        } else {
            self.registry.get_completed_singleton(&bean_name)
        };
        if let Some(instance) = shared {
            tracing::trace!(bean = %bean_name, "Returning cached instance of singleton bean '{}'", bean_name);
            let definition = self.definitions.read().get(&bean_name).cloned();
            return self.object_for_instance(instance, name, &bean_name, dereference, definition.as_deref());
        }

        if PrototypeGuard::is_in_creation(&bean_name) {
            return Err(RegistryError::CircularCreation(bean_name));
        }

        let definition = self
            .definitions
            .read()
            .get(&bean_name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        for dependency in &definition.depends_on {
            if self.registry.is_dependent(&bean_name, dependency) {
                return Err(RegistryError::IllegalDependsOn {
                    name: bean_name,
                    depends_on: dependency.clone(),
                });
            }
            self.registry.register_dependent_bean(dependency, &bean_name);
            self.get_bean(dependency).map_err(|err| err.for_bean(&bean_name, Vec::new()))?;
        }

        let instance = if definition.scope.is_singleton() {
            self.registry.get_or_create_singleton(&bean_name, || {
                self.create_bean(&bean_name, &definition).map_err(|err| {
                    // Drop the partially created bean and anything that
                    // eagerly took a reference to it.
                    self.registry.destroy_singleton(&bean_name);
                    err
                })
            })?
        } else {
            let _guard = PrototypeGuard::enter(&bean_name)?;
            self.create_bean(&bean_name, &definition)?
        };

        self.object_for_instance(instance, name, &bean_name, dereference, Some(&definition))
    }

    /// Returns the bean `name` downcast to `T`.
    pub fn get_bean_as<T: Any + Send + Sync>(&self, name: &str) -> RegistryResult<Arc<T>> {
        downcast_bean(name, self.get_bean(name)?)
    }

    fn object_for_instance(
        &self,
        instance: Bean,
        requested: &str,
        bean_name: &str,
        dereference: bool,
        definition: Option<&BeanDefinition>,
    ) -> RegistryResult<Bean> {
        let factory = definition.and_then(|d| d.as_factory_bean(&instance));
        if dereference {
            return match factory {
                Some(_) => Ok(instance),
                None => Err(RegistryError::TypeMismatch {
                    name: requested.to_string(),
                    expected: "FactoryBean",
                }),
            };
        }
        match factory {
            Some(factory) => match self.registry.get_cached_object_for_factory_bean(bean_name) {
                Some(cached) => Ok(cached),
                None => self.registry.get_object_from_factory_bean(factory.as_ref(), bean_name, None),
            },
            None => Ok(instance),
        }
    }

    // ----- creation -----------------------------------------------------

    fn create_bean(&self, name: &str, definition: &BeanDefinition) -> RegistryResult<Bean> {
        tracing::trace!("Creating instance of bean '{}'", name);

        let constructor_args = self.resolve_refs(name, &definition.constructor_refs)?;
        let instance = (definition.instantiate)(&constructor_args)?;

        let early_exposure = definition.scope.is_singleton()
            && self.settings().allow_circular_references
            && self.registry.is_singleton_currently_in_creation(name);
        if early_exposure {
            tracing::trace!("Eagerly caching bean '{}' to allow for resolving potential circular references", name);
            let early = instance.clone();
            self.registry.add_singleton_factory(name, move || early);
        }

        let properties = self.resolve_refs(name, &definition.property_refs)?;
        if let Some(populate) = &definition.populate {
            populate(name, &instance, &properties)?;
        }
        if let Some(init) = &definition.init {
            init(name, &instance)?;
        }

        if definition.scope.is_singleton() {
            if let Some(destroy) = &definition.destroy {
                self.registry.register_disposable_bean(
                    name,
                    Arc::new(DefinitionDisposable {
                        bean: instance.clone(),
                        destroy: destroy.clone(),
                    }),
                );
            }
        }
        Ok(instance)
    }

    fn resolve_refs(&self, name: &str, refs: &[BeanRef]) -> RegistryResult<ResolvedRefs> {
        let mut resolved = ResolvedRefs::default();
        for reference in refs {
            match self.get_bean(&reference.name) {
                Ok(bean) => {
                    let target = self.registry.canonical_name(strip_factory_prefix(&reference.name).0);
                    self.registry.register_dependent_bean(&target, name);
                    resolved.push(&reference.name, bean);
                }
                Err(err) if reference.optional => {
                    tracing::debug!(bean = name, reference = %reference.name, error = %err, "skipping optional reference");
                    self.registry.on_suppressed_exception(err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(resolved)
    }

    // ----- lifecycle ----------------------------------------------------

    /// Creates every non-lazy singleton, in registration order.
    pub fn pre_instantiate_singletons(&self) -> RegistryResult<()> {
        tracing::debug!("Pre-instantiating singletons in {:?}", self);
        for name in self.definition_names() {
            let eager = self
                .definitions
                .read()
                .get(&name)
                .map(|d| d.scope.is_singleton() && !d.lazy_init)
                .unwrap_or(false);
            if eager {
                self.get_bean(&name)?;
            }
        }
        Ok(())
    }

    /// Destroys all singletons; see [`SingletonRegistry::destroy_singletons`].
    pub fn destroy_singletons(&self) {
        self.registry.destroy_singletons();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean;

    #[test]
    fn strips_factory_prefix() {
        assert_eq!(strip_factory_prefix("&&conn"), ("conn", true));
        assert_eq!(strip_factory_prefix("conn"), ("conn", false));
    }

    #[test]
    fn unknown_bean_is_not_found() {
        let factory = BeanFactory::new();
        assert!(matches!(factory.get_bean("nope"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn overriding_can_be_disabled() {
        let settings = RegistrySettings {
            allow_definition_overriding: false,
            ..RegistrySettings::default()
        };
        let factory = BeanFactory::with_settings(settings);
        factory.register_definition("a", BeanDefinition::new(|_| Ok(bean(1u8)))).unwrap();
        let err = factory.register_definition("a", BeanDefinition::new(|_| Ok(bean(2u8)))).unwrap_err();
        assert!(matches!(err, RegistryError::DefinitionOverride(_)));
    }

    #[test]
    fn overriding_replaces_existing_singleton() {
        let factory = BeanFactory::new();
        factory.register_definition("a", BeanDefinition::new(|_| Ok(bean(1u8)))).unwrap();
        assert_eq!(*factory.get_bean_as::<u8>("a").unwrap(), 1);
        factory.register_definition("a", BeanDefinition::new(|_| Ok(bean(2u8)))).unwrap();
        assert_eq!(*factory.get_bean_as::<u8>("a").unwrap(), 2);
        assert_eq!(factory.definition_names(), vec!["a".to_string()]);
    }

    #[test]
    fn aliases_resolve_to_the_same_bean() {
        let factory = BeanFactory::new();
        factory.register_definition("dataSource", BeanDefinition::new(|_| Ok(bean(1u8)))).unwrap();
        factory.register_alias("dataSource", "db").unwrap();
        assert!(factory.contains_bean("db"));
        assert!(Arc::ptr_eq(&factory.get_bean("db").unwrap(), &factory.get_bean("dataSource").unwrap()));
    }
}
