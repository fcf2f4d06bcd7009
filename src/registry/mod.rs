//! The singleton registry.
//!
//! Holds at most one instance per bean name and resolves circular references
//! through three caches:
//!
//! 1. fully-created singletons,
//! 2. early references to beans still in creation,
//! 3. object factories that can produce such an early reference on demand.
//!
//! All three caches are mutated only while holding the registry's reentrant
//! singleton lock. The whole creation of a singleton, nested creations of
//! its collaborators included, runs under that lock, so construction is
//! totally ordered within one registry. Any code path that manufactures a
//! singleton for the first time must go through
//! [`SingletonRegistry::get_or_create_singleton`] or
//! [`SingletonRegistry::with_singleton_lock`] instead of a private lock.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::bean::{downcast_bean, Bean, ObjectFactory};
use crate::factory_bean::FactoryBeanObjects;
use crate::internal::{DisposableBeans, SuppressedErrors};
use crate::observer::{Observers, RegistryObserver};
use crate::{AliasRegistry, DisposableBean, RegistryError, RegistryResult, RegistrySettings};

mod destruction;
mod graph;

pub(crate) use graph::BeanGraph;

/// State that is only touched while the singleton lock is held.
#[derive(Default)]
struct LockedState {
    /// Third tier: factories producing early references
    singleton_factories: HashMap<String, ObjectFactory>,
    /// Names of registered singletons, in registration order
    registered_singletons: Vec<String>,
    /// Collector for the outermost creation currently running
    suppressed: Option<SuppressedErrors>,
}

/// Result of invoking a singleton factory.
enum CreationOutcome {
    /// The factory produced a new instance
    Created(Bean),
    /// The factory registered the singleton itself as a side effect
    RegisteredElsewhere(Bean),
    /// The factory failed
    Failed(RegistryError),
}

/// Registry of shared bean instances for one container.
///
/// # Thread Safety
///
/// Fully-created instances are readable from any thread without taking the
/// singleton lock. Creating a singleton takes the lock for the whole
/// duration of the factory call, so a second thread asking for a bean that
/// is not cached yet waits until the in-flight creation completes and then
/// sees the finished instance.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::SingletonRegistry;
/// use std::sync::Arc;
///
/// struct Database { url: String }
///
/// let registry = SingletonRegistry::new();
/// let db = registry
///     .get_or_create_singleton("db", || Ok(Arc::new(Database { url: "postgres://localhost".into() })))
///     .unwrap();
///
/// let again = registry.get_singleton("db").unwrap();
/// assert!(Arc::ptr_eq(&db, &again));
/// assert_eq!(registry.get_singleton_as::<Database>("db").unwrap().url, "postgres://localhost");
/// ```
pub struct SingletonRegistry {
    singleton_lock: ReentrantMutex<RefCell<LockedState>>,
    /// First tier: fully-created singletons
    singleton_objects: RwLock<HashMap<String, Bean>>,
    /// Second tier: early references
    early_singleton_objects: RwLock<HashMap<String, Bean>>,
    /// Names inside a factory call, with the creating thread
    currently_in_creation: Mutex<HashMap<String, ThreadId>>,
    in_creation_check_exclusions: Mutex<std::collections::HashSet<String>>,
    in_destruction: AtomicBool,
    disposable_beans: Mutex<DisposableBeans>,
    graph: BeanGraph,
    aliases: AliasRegistry,
    factory_bean_objects: FactoryBeanObjects,
    observers: Observers,
    settings: RegistrySettings,
}

impl Default for SingletonRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("singletons", &self.singleton_objects.read().len())
            .field("early_references", &self.early_singleton_objects.read().len())
            .field("in_creation", &self.currently_in_creation.lock().len())
            .field("disposables", &self.disposable_beans.lock().len())
            .field("in_destruction", &self.in_destruction.load(Ordering::SeqCst))
            .field("settings", &self.settings)
            .finish()
    }
}

#[inline]
fn assert_name(name: &str) {
    assert!(!name.is_empty(), "Bean name must not be empty");
}

impl SingletonRegistry {
    /// Creates a registry with default settings.
    pub fn new() -> Self {
        Self::with_settings(RegistrySettings::default())
    }

    /// Creates a registry with the given settings.
    pub fn with_settings(settings: RegistrySettings) -> Self {
        Self {
            singleton_lock: ReentrantMutex::new(RefCell::new(LockedState::default())),
            singleton_objects: RwLock::new(HashMap::with_capacity(256)),
            early_singleton_objects: RwLock::new(HashMap::with_capacity(16)),
            currently_in_creation: Mutex::new(HashMap::with_capacity(16)),
            in_creation_check_exclusions: Mutex::new(Default::default()),
            in_destruction: AtomicBool::new(false),
            disposable_beans: Mutex::new(DisposableBeans::default()),
            graph: BeanGraph::default(),
            aliases: AliasRegistry::with_overriding(settings.allow_definition_overriding),
            factory_bean_objects: FactoryBeanObjects::default(),
            observers: Observers::default(),
            settings,
        }
    }

    /// Settings this registry was built with.
    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Registers an observer for lifecycle events.
    pub fn add_observer(&self, observer: Arc<dyn RegistryObserver>) {
        self.observers.add(observer);
    }

    /// Aliases known to this registry.
    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    /// Registers `alias` for `name`.
    pub fn register_alias(&self, name: &str, alias: &str) -> RegistryResult<()> {
        self.aliases.register_alias(name, alias)
    }

    /// Resolves aliases to the canonical bean name.
    pub fn canonical_name(&self, name: &str) -> String {
        self.aliases.canonical_name(name)
    }

    // ----- registration -------------------------------------------------

    /// Registers an already-built instance as a fully-created singleton.
    ///
    /// Fails with [`RegistryError::DuplicateRegistration`] if the name is
    /// already bound, even to the same instance; the existing binding is
    /// left untouched.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn register_singleton(&self, name: &str, instance: Bean) -> RegistryResult<()> {
        assert_name(name);
        let guard = self.singleton_lock.lock();
        if self.singleton_objects.read().contains_key(name) {
            return Err(RegistryError::DuplicateRegistration(name.to_string()));
        }
        self.add_singleton(&guard, name, instance);
        Ok(())
    }

    /// Stores a fully-created instance and evicts the lower tiers.
    fn add_singleton(&self, state: &RefCell<LockedState>, name: &str, instance: Bean) {
        self.singleton_objects.write().insert(name.to_string(), instance);
        self.early_singleton_objects.write().remove(name);
        let mut state = state.borrow_mut();
        state.singleton_factories.remove(name);
        if !state.registered_singletons.iter().any(|n| n == name) {
            state.registered_singletons.push(name.to_string());
        }
    }

    /// Registers a factory that can produce an early reference to `name`
    /// while it is being created.
    ///
    /// Does nothing if `name` is already fully created. Replaces any earlier
    /// factory for the name and drops a stale early reference.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn add_singleton_factory<F>(&self, name: &str, factory: F)
    where
        F: FnOnce() -> Bean + Send + 'static,
    {
        assert_name(name);
        let guard = self.singleton_lock.lock();
        if self.singleton_objects.read().contains_key(name) {
            return;
        }
        self.early_singleton_objects.write().remove(name);
        let mut state = guard.borrow_mut();
        state.singleton_factories.insert(name.to_string(), Box::new(factory));
        if !state.registered_singletons.iter().any(|n| n == name) {
            state.registered_singletons.push(name.to_string());
        }
    }

    /// Removes `name` from every cache tier.
    ///
    /// Used to roll back a failed creation and during destruction.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn remove_singleton(&self, name: &str) {
        assert_name(name);
        let guard = self.singleton_lock.lock();
        self.singleton_objects.write().remove(name);
        self.early_singleton_objects.write().remove(name);
        self.factory_bean_objects.remove(name);
        let mut state = guard.borrow_mut();
        state.singleton_factories.remove(name);
        state.registered_singletons.retain(|n| n != name);
    }

    // ----- lookup -------------------------------------------------------

    fn completed(&self, name: &str) -> Option<Bean> {
        self.singleton_objects.read().get(name).cloned()
    }

    fn early(&self, name: &str) -> Option<Bean> {
        self.early_singleton_objects.read().get(name).cloned()
    }

    /// Returns the singleton registered under `name`, allowing an early
    /// reference if the bean is currently in creation.
    pub fn get_singleton(&self, name: &str) -> Option<Bean> {
        self.get_singleton_with(name, true)
    }

    /// Returns the singleton registered under `name`.
    ///
    /// If the bean is not fully created but currently in creation, an
    /// already cached early reference is returned. When
    /// `allow_early_reference` is true a pending object factory is invoked
    /// (once, under the singleton lock) to produce that early reference.
    pub fn get_singleton_with(&self, name: &str, allow_early_reference: bool) -> Option<Bean> {
        if let Some(instance) = self.completed(name) {
            return Some(instance);
        }
        if !self.is_singleton_currently_in_creation(name) {
            return None;
        }
        if let Some(early) = self.early(name) {
            return Some(early);
        }
        if !allow_early_reference {
            return None;
        }

        let guard = self.singleton_lock.lock();
        if let Some(instance) = self.completed(name) {
            return Some(instance);
        }
        if let Some(early) = self.early(name) {
            return Some(early);
        }
        let factory = guard.borrow_mut().singleton_factories.remove(name)?;
        let early = factory();
        self.early_singleton_objects.write().insert(name.to_string(), early.clone());
        tracing::trace!(bean = name, "exposed early singleton reference");
        self.observers.early_reference(name);
        Some(early)
    }

    /// Returns the singleton only if it is fully created.
    pub fn get_completed_singleton(&self, name: &str) -> Option<Bean> {
        self.completed(name)
    }

    /// Like [`get_singleton`](Self::get_singleton) but reports a missing
    /// bean as [`RegistryError::NotFound`].
    pub fn get_required_singleton(&self, name: &str) -> RegistryResult<Bean> {
        self.get_singleton(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Returns the singleton downcast to `T`.
    pub fn get_singleton_as<T: Any + Send + Sync>(&self, name: &str) -> RegistryResult<Arc<T>> {
        downcast_bean(name, self.get_required_singleton(name)?)
    }

    /// Returns true if a fully-created singleton is bound to `name`.
    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singleton_objects.read().contains_key(name)
    }

    /// Names of registered singletons, in registration order.
    pub fn singleton_names(&self) -> Vec<String> {
        let guard = self.singleton_lock.lock();
        let names = guard.borrow().registered_singletons.clone();
        names
    }

    /// Names of fully-created singletons, read without the singleton lock.
    pub(crate) fn completed_singleton_names(&self) -> Vec<String> {
        self.singleton_objects.read().keys().cloned().collect()
    }

    /// Number of registered singletons.
    pub fn singleton_count(&self) -> usize {
        let guard = self.singleton_lock.lock();
        let count = guard.borrow().registered_singletons.len();
        count
    }

    // ----- creation -----------------------------------------------------

    /// Returns the singleton for `name`, creating it with `factory` if it
    /// does not exist yet.
    ///
    /// `factory` runs while the singleton lock is held. It may create other
    /// singletons (the lock is reentrant) and may ask for an early reference
    /// to `name` through [`get_singleton`](Self::get_singleton), but asking
    /// to *create* `name` again fails with
    /// [`RegistryError::CircularCreation`].
    ///
    /// If `factory` fails by reporting
    /// [`RegistryError::DuplicateRegistration`] for `name` itself and a
    /// singleton has meanwhile been registered under that name, the
    /// registered instance is returned. Any other failure is returned as a
    /// construction error for `name`, with errors recorded through
    /// [`on_suppressed_exception`](Self::on_suppressed_exception) attached
    /// as related causes. Either way the in-creation marker and any early
    /// reference for `name` are cleared.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty. A panic raised by `factory` is propagated
    /// after the in-creation marker has been cleared.
    pub fn get_or_create_singleton<F>(&self, name: &str, factory: F) -> RegistryResult<Bean>
    where
        F: FnOnce() -> RegistryResult<Bean>,
    {
        assert_name(name);
        let guard = self.singleton_lock.lock();
        if let Some(existing) = self.completed(name) {
            return Ok(existing);
        }
        if self.in_destruction.load(Ordering::SeqCst) {
            return Err(RegistryError::DestructionInProgress(name.to_string()));
        }
        tracing::debug!("Creating shared instance of singleton bean '{}'", name);

        self.before_singleton_creation(name)?;

        let record_suppressed = {
            let mut state = guard.borrow_mut();
            if state.suppressed.is_none() {
                state.suppressed = Some(SuppressedErrors::new(self.settings.suppressed_exceptions_limit));
                true
            } else {
                false
            }
        };

        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.observers.creating(name);
            factory()
        }));

        let suppressed = if record_suppressed {
            guard.borrow_mut().suppressed.take()
        } else {
            None
        };
        let after = self.after_singleton_creation(name);

        let result = match result {
            Ok(result) => result,
            Err(payload) => {
                self.discard_early(&guard, name);
                panic::resume_unwind(payload);
            }
        };

        let outcome = match result {
            Ok(instance) => CreationOutcome::Created(instance),
            Err(err) if err.is_duplicate_of(name) => match self.completed(name) {
                Some(existing) => CreationOutcome::RegisteredElsewhere(existing),
                None => CreationOutcome::Failed(err),
            },
            Err(err) => CreationOutcome::Failed(err),
        };

        match outcome {
            CreationOutcome::Created(instance) => {
                after?;
                if let Some(existing) = self.completed(name) {
                    // The factory bound the name itself and still returned a
                    // value; the first binding is final.
                    tracing::warn!(
                        bean = name,
                        "singleton was registered while its factory ran; keeping the registered instance"
                    );
                    self.discard_early(&guard, name);
                    return Ok(existing);
                }
                self.add_singleton(&guard, name, instance.clone());
                self.observers.created(name, started.elapsed());
                Ok(instance)
            }
            CreationOutcome::RegisteredElsewhere(existing) => {
                after?;
                tracing::debug!(bean = name, "singleton appeared during creation; using registered instance");
                Ok(existing)
            }
            CreationOutcome::Failed(err) => {
                self.discard_early(&guard, name);
                let related = suppressed.map(SuppressedErrors::into_errors).unwrap_or_default();
                let err = err.for_bean(name, related);
                self.observers.creation_failed(name, &err);
                Err(err)
            }
        }
    }

    /// Drops the factory and early-reference tiers for `name`.
    fn discard_early(&self, state: &RefCell<LockedState>, name: &str) {
        self.early_singleton_objects.write().remove(name);
        let mut state = state.borrow_mut();
        state.singleton_factories.remove(name);
        if !self.contains_singleton(name) {
            state.registered_singletons.retain(|n| n != name);
        }
    }

    /// Records an error suppressed while creating collaborators of the
    /// outermost singleton currently being created.
    ///
    /// At most `suppressed_exceptions_limit` errors are kept; the rest are
    /// dropped. Outside of a creation this does nothing.
    pub fn on_suppressed_exception(&self, err: RegistryError) {
        let guard = self.singleton_lock.lock();
        let mut state = guard.borrow_mut();
        if let Some(suppressed) = state.suppressed.as_mut() {
            if !suppressed.record(err) {
                tracing::trace!("suppressed exception limit reached; dropping error");
            }
        }
    }

    /// Runs `f` while holding the singleton lock.
    ///
    /// Use this for any first-time construction of a shared object that must
    /// be ordered with singleton creation.
    pub fn with_singleton_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.singleton_lock.lock();
        f()
    }

    // ----- creation state -----------------------------------------------

    /// Marks `name` as in creation; fails if it already is.
    pub fn before_singleton_creation(&self, name: &str) -> RegistryResult<()> {
        if self.in_creation_check_exclusions.lock().contains(name) {
            return Ok(());
        }
        let mut in_creation = self.currently_in_creation.lock();
        if in_creation.contains_key(name) {
            return Err(RegistryError::CircularCreation(name.to_string()));
        }
        in_creation.insert(name.to_string(), thread::current().id());
        Ok(())
    }

    /// Clears the in-creation mark for `name`.
    pub fn after_singleton_creation(&self, name: &str) -> RegistryResult<()> {
        if self.in_creation_check_exclusions.lock().contains(name) {
            return Ok(());
        }
        match self.currently_in_creation.lock().remove(name) {
            Some(_) => Ok(()),
            None => Err(RegistryError::NotInCreation(name.to_string())),
        }
    }

    /// Excludes (`in_creation == false`) or re-includes a name in the
    /// reentrancy check.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        assert_name(name);
        let mut exclusions = self.in_creation_check_exclusions.lock();
        if in_creation {
            exclusions.remove(name);
        } else {
            exclusions.insert(name.to_string());
        }
    }

    /// True if `name` is in creation and not excluded from the check.
    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        !self.in_creation_check_exclusions.lock().contains(name) && self.is_singleton_currently_in_creation(name)
    }

    /// True if a factory call for `name` is currently running.
    pub fn is_singleton_currently_in_creation(&self, name: &str) -> bool {
        self.currently_in_creation.lock().contains_key(name)
    }

    /// True if the current thread is running the factory for `name`.
    pub fn is_singleton_in_creation_on_current_thread(&self, name: &str) -> bool {
        self.currently_in_creation
            .lock()
            .get(name)
            .is_some_and(|id| *id == thread::current().id())
    }

    /// Names currently in creation, sorted.
    pub fn singletons_in_creation(&self) -> Vec<String> {
        let mut names: Vec<String> = self.currently_in_creation.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// True while [`destroy_singletons`](Self::destroy_singletons) runs.
    pub fn is_in_destruction(&self) -> bool {
        self.in_destruction.load(Ordering::SeqCst)
    }

    // ----- relationships ------------------------------------------------

    /// Registers a destruction callback for `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn register_disposable_bean(&self, name: &str, bean: Arc<dyn DisposableBean>) {
        assert_name(name);
        self.disposable_beans.lock().insert(name.to_string(), bean);
    }

    /// True if a destruction callback is registered for `name`.
    pub fn has_disposable_bean(&self, name: &str) -> bool {
        self.disposable_beans.lock().contains(name)
    }

    pub(crate) fn disposable_names(&self) -> Vec<String> {
        self.disposable_beans.lock().names()
    }

    /// Records that `containing` holds `contained` as an inner bean; the
    /// containing bean is also registered as dependent on the contained one.
    ///
    /// # Panics
    ///
    /// Panics if either name is empty.
    pub fn register_contained_bean(&self, contained: &str, containing: &str) {
        assert_name(contained);
        assert_name(containing);
        if self.graph.register_contained(contained, containing) {
            self.register_dependent_bean(contained, containing);
        }
    }

    /// Records that `dependent` depends on `name`, to be destroyed first.
    ///
    /// # Panics
    ///
    /// Panics if either name is empty.
    pub fn register_dependent_bean(&self, name: &str, dependent: &str) {
        assert_name(name);
        assert_name(dependent);
        let canonical = self.canonical_name(name);
        if self.graph.register_dependent(&canonical, dependent) {
            tracing::trace!(bean = %canonical, dependent, "registered dependent bean");
        }
    }

    /// True if `dependent` depends on `name`, directly or transitively.
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        self.graph.is_dependent(name, dependent, &|n| self.aliases.canonical_name(n))
    }

    /// True if any bean is registered as dependent on `name`.
    pub fn has_dependent_bean(&self, name: &str) -> bool {
        self.graph.has_dependents(name)
    }

    /// Beans that depend on `name`.
    pub fn get_dependent_beans(&self, name: &str) -> Vec<String> {
        self.graph.dependents_of(name)
    }

    /// Beans that `name` depends on.
    pub fn get_dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.graph.dependencies_of(name)
    }

    /// Inner beans contained in `name`.
    pub fn get_contained_beans(&self, name: &str) -> Vec<String> {
        self.graph.contained_in(name)
    }

    pub(crate) fn graph(&self) -> &BeanGraph {
        &self.graph
    }

    pub(crate) fn factory_bean_objects(&self) -> &FactoryBeanObjects {
        &self.factory_bean_objects
    }
}
