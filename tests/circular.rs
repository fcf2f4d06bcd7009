use ferrous_ioc::{bean, Bean, BeanDefinition, BeanFactory, RegistryError, RegistrySettings, SingletonRegistry};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Weak};

#[derive(Default)]
struct ServiceA {
    b: OnceCell<Weak<ServiceB>>,
}

#[derive(Default)]
struct ServiceB {
    a: OnceCell<Weak<ServiceA>>,
}

/// Drives the registry the way a bean creator would for two beans wired
/// to each other after construction.
fn create_a(registry: &SingletonRegistry) -> Result<Bean, RegistryError> {
    registry.get_or_create_singleton("svcA", || {
        let a = Arc::new(ServiceA::default());
        let early: Bean = a.clone();
        registry.add_singleton_factory("svcA", move || early);

        let b = match registry.get_singleton("svcB") {
            Some(b) => b,
            None => create_b(registry)?,
        };
        registry.register_dependent_bean("svcB", "svcA");
        let _ = a.b.set(Arc::downgrade(&b.downcast::<ServiceB>().unwrap()));
        Ok(a as Bean)
    })
}

fn create_b(registry: &SingletonRegistry) -> Result<Bean, RegistryError> {
    registry.get_or_create_singleton("svcB", || {
        let b = Arc::new(ServiceB::default());
        let early: Bean = b.clone();
        registry.add_singleton_factory("svcB", move || early);

        let a = match registry.get_singleton("svcA") {
            Some(a) => a,
            None => create_a(registry)?,
        };
        registry.register_dependent_bean("svcA", "svcB");
        let _ = b.a.set(Arc::downgrade(&a.downcast::<ServiceA>().unwrap()));
        Ok(b as Bean)
    })
}

fn assert_wired(registry: &SingletonRegistry) {
    let a = registry.get_singleton_as::<ServiceA>("svcA").unwrap();
    let b = registry.get_singleton_as::<ServiceB>("svcB").unwrap();
    assert!(Arc::ptr_eq(&a.b.get().unwrap().upgrade().unwrap(), &b));
    assert!(Arc::ptr_eq(&b.a.get().unwrap().upgrade().unwrap(), &a));
    assert!(registry.singletons_in_creation().is_empty());
    assert!(!registry.is_singleton_currently_in_creation("svcA"));
}

#[test]
fn test_field_cycle_resolves_starting_from_a() {
    let registry = SingletonRegistry::new();
    create_a(&registry).unwrap();
    assert_wired(&registry);
}

#[test]
fn test_field_cycle_resolves_starting_from_b() {
    let registry = SingletonRegistry::new();
    create_b(&registry).unwrap();
    assert_wired(&registry);
}

#[test]
fn test_constructor_cycle_fails_fast() {
    let registry = SingletonRegistry::new();

    fn make(registry: &SingletonRegistry, name: &'static str, other: &'static str) -> Result<Bean, RegistryError> {
        registry.get_or_create_singleton(name, || {
            // Needs the other bean before it can exist, so nothing is exposed early
            let dep = match registry.get_singleton(other) {
                Some(dep) => dep,
                None => make(registry, other, name)?,
            };
            Ok(bean(vec![dep]))
        })
    }

    let err = make(&registry, "x", "y").unwrap_err();
    assert!(matches!(err, RegistryError::CircularCreation(ref name) if name == "x"), "got {err}");
    assert!(registry.singletons_in_creation().is_empty());
    assert!(registry.get_singleton("x").is_none());
    assert!(registry.get_singleton("y").is_none());
}

#[test]
fn test_early_reference_is_the_final_instance() {
    let registry = SingletonRegistry::new();
    let seen_early = OnceCell::new();

    let created = registry
        .get_or_create_singleton("a", || {
            let a = bean(7u32);
            let early = a.clone();
            registry.add_singleton_factory("a", move || early);
            let _ = seen_early.set(registry.get_singleton("a").unwrap());
            Ok(a)
        })
        .unwrap();

    assert!(Arc::ptr_eq(seen_early.get().unwrap(), &created));
    // Once complete, early lookups without permission still see the bean
    assert!(registry.get_singleton_with("a", false).is_some());
}

// ----- through the bean factory -----

#[derive(Default)]
struct OrderService {
    payments: OnceCell<Arc<PaymentService>>,
}

#[derive(Default)]
struct PaymentService {
    orders: OnceCell<Weak<OrderService>>,
}

fn order_payment_factory(settings: RegistrySettings) -> BeanFactory {
    let factory = BeanFactory::with_settings(settings);
    factory
        .register_definition(
            "orders",
            BeanDefinition::of(|_| Ok(OrderService::default()))
                .property_ref("payments")
                .populate(|orders: &OrderService, refs| {
                    let _ = orders.payments.set(refs.get_as::<PaymentService>("payments")?);
                    Ok(())
                }),
        )
        .unwrap();
    factory
        .register_definition(
            "payments",
            BeanDefinition::of(|_| Ok(PaymentService::default()))
                .property_ref("orders")
                .populate(|payments: &PaymentService, refs| {
                    let _ = payments.orders.set(Arc::downgrade(&refs.get_as::<OrderService>("orders")?));
                    Ok(())
                }),
        )
        .unwrap();
    factory
}

#[test]
fn test_bean_factory_resolves_property_cycle_in_either_order() {
    for first in ["orders", "payments"] {
        let factory = order_payment_factory(RegistrySettings::default());
        factory.get_bean(first).unwrap();

        let orders = factory.get_bean_as::<OrderService>("orders").unwrap();
        let payments = factory.get_bean_as::<PaymentService>("payments").unwrap();
        assert!(Arc::ptr_eq(orders.payments.get().unwrap(), &payments));
        assert!(Arc::ptr_eq(&payments.orders.get().unwrap().upgrade().unwrap(), &orders));
        assert!(factory.registry().is_dependent("orders", "payments"));
        assert!(factory.registry().is_dependent("payments", "orders"));
    }
}

#[test]
fn test_bean_factory_cycle_fails_without_early_exposure() {
    let settings = RegistrySettings {
        allow_circular_references: false,
        ..RegistrySettings::default()
    };
    let factory = order_payment_factory(settings);

    let err = factory.get_bean("orders").unwrap_err();
    assert!(matches!(err, RegistryError::CircularCreation(ref name) if name == "orders"), "got {err}");
    assert!(!factory.registry().contains_singleton("orders"));
    assert!(!factory.registry().contains_singleton("payments"));
    assert!(factory.registry().singletons_in_creation().is_empty());
}

#[test]
fn test_bean_factory_constructor_cycle() {
    let factory = BeanFactory::new();
    factory
        .register_definition("a", BeanDefinition::new(|_| Ok(bean(1u8))).constructor_ref("b"))
        .unwrap();
    factory
        .register_definition("b", BeanDefinition::new(|_| Ok(bean(2u8))).constructor_ref("a"))
        .unwrap();

    assert!(matches!(factory.get_bean("a"), Err(RegistryError::CircularCreation(_))));
    assert!(factory.registry().singleton_names().is_empty());
}

#[test]
fn test_prototype_cycle_is_detected() {
    let factory = BeanFactory::new();
    factory
        .register_definition("p", BeanDefinition::new(|_| Ok(bean(()))).prototype().property_ref("q"))
        .unwrap();
    factory
        .register_definition("q", BeanDefinition::new(|_| Ok(bean(()))).prototype().property_ref("p"))
        .unwrap();

    assert!(matches!(factory.get_bean("p"), Err(RegistryError::CircularCreation(ref n)) if n == "p"));
    // The thread-local marker is released afterwards
    assert!(matches!(factory.get_bean("p"), Err(RegistryError::CircularCreation(_))));
}

#[test]
fn test_circular_depends_on_is_rejected() {
    let factory = BeanFactory::new();
    factory
        .register_definition("a", BeanDefinition::new(|_| Ok(bean(()))).depends_on("b"))
        .unwrap();
    factory
        .register_definition("b", BeanDefinition::new(|_| Ok(bean(()))).depends_on("a"))
        .unwrap();

    let err = factory.get_bean("a").unwrap_err();
    let illegal = match &err {
        RegistryError::IllegalDependsOn { .. } => true,
        RegistryError::ConstructionFailed { cause, .. } => cause.to_string().contains("depends-on"),
        _ => false,
    };
    assert!(illegal, "got {err}");
}
