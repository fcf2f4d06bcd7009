//! # ferrous-ioc
//!
//! Singleton bean registry with three-tier caching and circular reference
//! resolution, modelled on the singleton registry of Spring's IoC container.
//!
//! ## Features
//!
//! - **At-most-once singletons**: every bean name maps to one shared instance
//! - **Circular references**: early references let beans wired after
//!   construction refer to each other
//! - **Fail-fast cycles**: constructor-level cycles are reported instead of looping
//! - **Ordered teardown**: dependents are destroyed before what they depend on
//! - **Thread-safe**: creation is serialized by a reentrant lock, lookups of
//!   finished singletons are lock-free with respect to it
//! - **Factory beans, aliases and bean definitions** on top of the registry
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_ioc::{bean, SingletonRegistry};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! let registry = SingletonRegistry::new();
//! let db = registry
//!     .get_or_create_singleton("db", || {
//!         Ok(bean(Database { connection_string: "postgres://localhost".to_string() }))
//!     })
//!     .unwrap();
//!
//! // Later lookups return the same instance
//! assert!(Arc::ptr_eq(&db, &registry.get_singleton("db").unwrap()));
//! ```
//!
//! ## Circular References
//!
//! A bean that exposes itself early through
//! [`SingletonRegistry::add_singleton_factory`] can be handed to a
//! collaborator before it is fully built:
//!
//! ```rust
//! use ferrous_ioc::{bean, Bean, SingletonRegistry};
//! use once_cell::sync::OnceCell;
//! use std::sync::{Arc, Weak};
//!
//! #[derive(Default)]
//! struct ServiceA { b: OnceCell<Arc<ServiceB>> }
//! struct ServiceB { a: Weak<ServiceA> }
//!
//! let registry = SingletonRegistry::new();
//! let a = registry
//!     .get_or_create_singleton("a", || {
//!         let a = Arc::new(ServiceA::default());
//!         let early: Bean = a.clone();
//!         registry.add_singleton_factory("a", move || early);
//!
//!         let b = registry.get_or_create_singleton("b", || {
//!             let a = registry.get_singleton("a").unwrap().downcast::<ServiceA>().unwrap();
//!             Ok(bean(ServiceB { a: Arc::downgrade(&a) }))
//!         })?;
//!         let _ = a.b.set(b.downcast::<ServiceB>().unwrap());
//!         Ok(a as Bean)
//!     })
//!     .unwrap()
//!     .downcast::<ServiceA>()
//!     .unwrap();
//!
//! let b = a.b.get().unwrap();
//! assert!(Arc::ptr_eq(&b.a.upgrade().unwrap(), &a));
//! ```
//!
//! ## Bean Definitions
//!
//! [`BeanFactory`] drives the registry from [`BeanDefinition`]s, handling
//! early exposure, dependency registration and destroy callbacks:
//!
//! ```rust
//! use ferrous_ioc::{BeanDefinition, BeanFactory};
//!
//! struct Pool;
//!
//! let factory = BeanFactory::new();
//! factory
//!     .register_definition(
//!         "pool",
//!         BeanDefinition::of(|_| Ok(Pool)).destroy(|_: &Pool| {
//!             println!("pool closed");
//!             Ok(())
//!         }),
//!     )
//!     .unwrap();
//!
//! factory.pre_instantiate_singletons().unwrap();
//! factory.destroy_singletons();
//! ```

pub mod alias;
pub mod bean;
pub mod config;
pub mod definition;
pub mod error;
pub mod factory;
pub mod factory_bean;
pub mod graph_export;
pub mod observer;
pub mod registry;
pub mod supplier;
pub mod traits;

// Internal modules
mod internal;

// Re-export core types
pub use alias::AliasRegistry;
pub use bean::{bean, downcast_bean, same_bean, Bean, NullBean, ObjectFactory};
pub use config::{
    ConfigSource, ConfigValue, EnvironmentConfigSource, MapConfigSource, RegistrySettings,
    DEFAULT_SUPPRESSED_EXCEPTIONS_LIMIT, ENV_PREFIX,
};
#[cfg(feature = "config")]
pub use config::JsonConfigSource;
pub use definition::{BeanDefinition, BeanScope, ResolvedRefs};
pub use error::{BoxError, RegistryError, RegistryResult};
pub use factory::{BeanFactory, FACTORY_BEAN_PREFIX};
pub use factory_bean::{FactoryBeanObjects, ObjectPostProcessor};
pub use graph_export::{EdgeKind, ExportFormat, GraphEdge, GraphMetadata, GraphNode, GraphSnapshot, NodeState};
pub use observer::{LoggingObserver, MetricsObserver, RegistryMetrics, RegistryObserver};
pub use registry::SingletonRegistry;
pub use supplier::SingletonSupplier;
pub use traits::{DestroyCallback, DisposableBean, FactoryBean};
