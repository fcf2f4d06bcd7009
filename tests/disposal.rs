use ferrous_ioc::{bean, BeanDefinition, BeanFactory, BoxError, DestroyCallback, DisposableBean, RegistryError, SingletonRegistry};
use parking_lot::Mutex;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

struct Closeable {
    name: &'static str,
    log: Log,
}

impl DisposableBean for Closeable {
    fn destroy(&self) -> Result<(), BoxError> {
        self.log.lock().push(self.name.to_string());
        Ok(())
    }
}

fn closeable(name: &'static str, log: &Log) -> Arc<Closeable> {
    Arc::new(Closeable { name, log: log.clone() })
}

#[test]
fn test_dependents_destroyed_before_dependencies() {
    let registry = SingletonRegistry::new();
    let log: Log = Arc::default();

    // Registered in an order that differs from the dependency order
    for name in ["db", "service", "repo"] {
        let instance = closeable(name, &log);
        registry.register_singleton(name, instance.clone()).unwrap();
        registry.register_disposable_bean(name, instance);
    }
    registry.register_dependent_bean("db", "repo");
    registry.register_dependent_bean("repo", "service");

    registry.destroy_singletons();

    assert_eq!(*log.lock(), vec!["service", "repo", "db"]);
    assert_eq!(registry.singleton_count(), 0);
    assert!(registry.get_dependent_beans("db").is_empty());
    assert!(registry.get_dependencies_for_bean("service").is_empty());
}

#[test]
fn test_reverse_registration_order_without_dependencies() {
    let registry = SingletonRegistry::new();
    let log: Log = Arc::default();
    for name in ["first", "second", "third"] {
        registry.register_disposable_bean(name, closeable(name, &log));
    }
    registry.destroy_singletons();
    assert_eq!(*log.lock(), vec!["third", "second", "first"]);
}

#[test]
fn test_each_callback_runs_exactly_once() {
    let registry = SingletonRegistry::new();
    let log: Log = Arc::default();
    registry.register_disposable_bean("a", closeable("a", &log));
    registry.register_disposable_bean("b", closeable("b", &log));
    // Mutual dependency
    registry.register_dependent_bean("a", "b");
    registry.register_dependent_bean("b", "a");

    registry.destroy_singletons();
    registry.destroy_singletons();

    let mut destroyed = log.lock().clone();
    destroyed.sort();
    assert_eq!(destroyed, vec!["a", "b"]);
}

#[test]
fn test_destroy_single_bean_takes_dependents_along() {
    let registry = SingletonRegistry::new();
    let log: Log = Arc::default();
    for name in ["db", "repo", "unrelated"] {
        registry.register_singleton(name, bean(name)).unwrap();
        registry.register_disposable_bean(name, closeable(name, &log));
    }
    registry.register_dependent_bean("db", "repo");

    registry.destroy_singleton("db");

    assert_eq!(*log.lock(), vec!["repo", "db"]);
    assert!(!registry.contains_singleton("repo"));
    assert!(registry.contains_singleton("unrelated"));
    assert!(registry.has_disposable_bean("unrelated"));
}

#[test]
fn test_callback_failures_are_swallowed() {
    let registry = SingletonRegistry::new();
    let log: Log = Arc::default();
    registry.register_disposable_bean("ok", closeable("ok", &log));
    registry.register_disposable_bean(
        "failing",
        Arc::new(DestroyCallback::new(|| -> Result<(), BoxError> { Err("connection already closed".into()) })),
    );
    registry.register_disposable_bean(
        "panicking",
        Arc::new(DestroyCallback::new(|| -> Result<(), BoxError> { panic!("destroy exploded") })),
    );

    registry.destroy_singletons();
    assert_eq!(*log.lock(), vec!["ok"]);
    assert!(!registry.is_in_destruction());
}

#[test]
fn test_creation_rejected_during_destruction() {
    let registry = Arc::new(SingletonRegistry::new());
    let outcome: Arc<Mutex<Option<Result<(), RegistryError>>>> = Arc::default();

    let inner = registry.clone();
    let seen = outcome.clone();
    registry.register_disposable_bean(
        "probe",
        Arc::new(DestroyCallback::new(move || {
            let result = inner.get_or_create_singleton("late", || Ok(bean(1u8))).map(|_| ());
            *seen.lock() = Some(result);
            Ok(())
        })),
    );

    registry.destroy_singletons();

    match outcome.lock().take() {
        Some(Err(RegistryError::DestructionInProgress(name))) => assert_eq!(name, "late"),
        other => panic!("expected destruction in progress, got {:?}", other),
    }
    assert!(registry.get_singleton("late").is_none());
}

#[test]
fn test_bean_factory_destroy_callbacks_follow_wiring() {
    let log: Log = Arc::default();
    let factory = BeanFactory::new();

    let db_log = log.clone();
    factory
        .register_definition(
            "db",
            BeanDefinition::of(move |_| Ok(Closeable { name: "db", log: db_log.clone() })).disposable::<Closeable>(),
        )
        .unwrap();
    let repo_log = log.clone();
    factory
        .register_definition(
            "repo",
            BeanDefinition::of(move |_| Ok(Closeable { name: "repo", log: repo_log.clone() }))
                .constructor_ref("db")
                .disposable::<Closeable>(),
        )
        .unwrap();
    let service_log = log.clone();
    factory
        .register_definition(
            "service",
            BeanDefinition::of(move |_| Ok(Closeable { name: "service", log: service_log.clone() }))
                .property_ref("repo")
                .destroy(|service: &Closeable| service.destroy()),
        )
        .unwrap();

    factory.pre_instantiate_singletons().unwrap();
    assert_eq!(factory.registry().get_dependencies_for_bean("service"), vec!["repo".to_string()]);

    factory.destroy_singletons();
    assert_eq!(*log.lock(), vec!["service", "repo", "db"]);
}

/// Panics on every destruction event it sees.
struct PanickingObserver;

impl ferrous_ioc::RegistryObserver for PanickingObserver {
    fn destroyed(&self, _name: &str) {
        panic!("observer exploded");
    }

    fn destroy_failed(&self, _name: &str, _message: &str) {
        panic!("observer exploded again");
    }
}

#[test]
fn test_panicking_observer_does_not_abort_teardown() {
    let registry = SingletonRegistry::new();
    registry.add_observer(Arc::new(PanickingObserver));
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    for name in ["db", "repo"] {
        registry.register_singleton(name, bean(name)).unwrap();
        registry.register_disposable_bean(name, closeable(name, &log));
    }
    registry.register_dependent_bean("db", "repo");

    registry.destroy_singletons();

    assert_eq!(*log.lock(), vec!["repo", "db"]);
    assert!(!registry.is_in_destruction());
    assert_eq!(registry.singleton_count(), 0);
    assert!(registry.get_or_create_singleton("db", || Ok(bean("db"))).is_ok());
}
