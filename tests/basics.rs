use ferrous_ioc::{bean, MetricsObserver, RegistryError, SingletonRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Database {
    url: String,
}

#[test]
fn test_register_and_lookup() {
    let registry = SingletonRegistry::new();
    registry
        .register_singleton("db", bean(Database { url: "postgres://localhost".into() }))
        .unwrap();

    assert!(registry.contains_singleton("db"));
    assert_eq!(registry.singleton_count(), 1);
    let db = registry.get_singleton_as::<Database>("db").unwrap();
    assert_eq!(db.url, "postgres://localhost");
}

#[test]
fn test_duplicate_registration_keeps_original() {
    let registry = SingletonRegistry::new();
    let original = bean(1u32);
    registry.register_singleton("value", original.clone()).unwrap();

    match registry.register_singleton("value", bean(2u32)) {
        Err(RegistryError::DuplicateRegistration(name)) => assert_eq!(name, "value"),
        other => panic!("expected duplicate registration, got {:?}", other),
    }
    // Same instance again is still a duplicate
    assert!(registry.register_singleton("value", original.clone()).is_err());
    assert!(Arc::ptr_eq(&registry.get_singleton("value").unwrap(), &original));
}

#[test]
fn test_factory_runs_at_most_once() {
    let registry = SingletonRegistry::new();
    let calls = AtomicUsize::new(0);

    let first = registry
        .get_or_create_singleton("svc", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(bean(String::from("service")))
        })
        .unwrap();
    let second = registry
        .get_or_create_singleton("svc", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(bean(String::from("other")))
        })
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!registry.is_singleton_currently_in_creation("svc"));
}

#[test]
fn test_registration_order_is_kept() {
    let registry = SingletonRegistry::new();
    for name in ["c", "a", "b"] {
        registry.register_singleton(name, bean(name)).unwrap();
    }
    assert_eq!(registry.singleton_names(), vec!["c", "a", "b"]);

    registry.remove_singleton("a");
    assert_eq!(registry.singleton_names(), vec!["c", "b"]);
    assert!(registry.get_singleton("a").is_none());
    // Removed names can be registered again
    registry.register_singleton("a", bean("again")).unwrap();
}

#[test]
fn test_lookup_errors() {
    let registry = SingletonRegistry::new();
    assert!(matches!(registry.get_required_singleton("missing"), Err(RegistryError::NotFound(_))));

    registry.register_singleton("n", bean(5u8)).unwrap();
    match registry.get_singleton_as::<String>("n") {
        Err(RegistryError::TypeMismatch { name, expected }) => {
            assert_eq!(name, "n");
            assert!(expected.contains("String"));
        }
        other => panic!("expected type mismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_aliases_canonicalise_dependencies() {
    let registry = SingletonRegistry::new();
    registry.register_alias("dataSource", "db").unwrap();
    registry.register_dependent_bean("db", "repo");

    assert_eq!(registry.get_dependent_beans("dataSource"), vec!["repo".to_string()]);
    assert!(registry.is_dependent("db", "repo"));
    assert_eq!(registry.canonical_name("db"), "dataSource");
}

#[test]
fn test_metrics_observer_sees_creations() {
    let registry = SingletonRegistry::new();
    let metrics = Arc::new(MetricsObserver::new());
    registry.add_observer(metrics.clone());

    registry.get_or_create_singleton("ok", || Ok(bean(1u8))).unwrap();
    let _ = registry.get_or_create_singleton("bad", || Err(RegistryError::NotFound("dep".into())));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.created, 1);
    assert_eq!(snapshot.failed, 1);
}

#[test]
#[should_panic(expected = "Bean name must not be empty")]
fn test_empty_name_panics() {
    let registry = SingletonRegistry::new();
    let _ = registry.register_singleton("", bean(()));
}
