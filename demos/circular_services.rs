//! Circular Services Demo - two singletons that reference each other
//!
//! `orders` and `payments` need each other through property injection. The
//! registry hands `payments` an early reference to the half-built `orders`,
//! finishes both, then tears everything down dependents first.
//!
//! Run with `RUST_LOG=ferrous_ioc=debug` to watch the cache tiers at work.

use ferrous_ioc::*;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing_subscriber::EnvFilter;

struct Database {
    url: String,
}

impl DisposableBean for Database {
    fn destroy(&self) -> Result<(), BoxError> {
        println!("closing connection to {}", self.url);
        Ok(())
    }
}

struct OrderService {
    db: Mutex<Option<Arc<Database>>>,
    payments: Mutex<Weak<PaymentService>>,
}

struct PaymentService {
    orders: Mutex<Weak<OrderService>>,
}

impl OrderService {
    fn place(&self, item: &str) -> String {
        let payments = self.payments.lock().upgrade();
        let db = self.db.lock().as_ref().map(|db| db.url.clone()).unwrap_or_default();
        match payments {
            Some(payments) => format!("{item} stored in {db}, {}", payments.charge(item)),
            None => format!("{item} stored in {db}, payment unavailable"),
        }
    }
}

impl PaymentService {
    fn charge(&self, item: &str) -> String {
        let linked = self.orders.lock().upgrade().is_some();
        format!("charged for {item} (orders linked: {linked})")
    }
}

fn definitions(factory: &BeanFactory) -> RegistryResult<()> {
    factory.register_definition(
        "database",
        BeanDefinition::of(|_| Ok(Database { url: "postgres://localhost/shop".into() })).disposable::<Database>(),
    )?;

    factory.register_definition(
        "orders",
        BeanDefinition::of(|_| Ok(OrderService { db: Mutex::new(None), payments: Mutex::new(Weak::new()) }))
            .property_ref("database")
            .property_ref("payments")
            .populate(|orders: &OrderService, refs| {
                *orders.db.lock() = Some(refs.get_as::<Database>("database")?);
                *orders.payments.lock() = Arc::downgrade(&refs.get_as::<PaymentService>("payments")?);
                Ok(())
            })
            .destroy(|_: &OrderService| {
                println!("orders shut down");
                Ok(())
            }),
    )?;

    factory.register_definition(
        "payments",
        BeanDefinition::of(|_| Ok(PaymentService { orders: Mutex::new(Weak::new()) }))
            .property_ref("orders")
            .populate(|payments: &PaymentService, refs| {
                *payments.orders.lock() = Arc::downgrade(&refs.get_as::<OrderService>("orders")?);
                Ok(())
            })
            .destroy(|_: &PaymentService| {
                println!("payments shut down");
                Ok(())
            }),
    )?;

    factory.register_alias("orders", "orderService")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let metrics = Arc::new(MetricsObserver::new());
    let factory = BeanFactory::new();
    factory.registry().add_observer(Arc::new(LoggingObserver::with_prefix("shop")));
    factory.registry().add_observer(metrics.clone());

    definitions(&factory)?;
    factory.pre_instantiate_singletons()?;

    let orders = factory.get_bean_as::<OrderService>("orderService")?;
    println!("{}", orders.place("keyboard"));

    println!("dependents of orders: {:?}", factory.registry().get_dependent_beans("orders"));
    println!("dependents of database: {:?}", factory.registry().get_dependent_beans("database"));

    let snapshot = factory.registry().graph_snapshot();
    println!("\n{}", snapshot.to_mermaid());
    println!("{}", snapshot.to_dot());

    let stats = metrics.snapshot();
    println!("created {} singletons, {} early references", stats.created, stats.early_references);

    drop(orders);
    factory.destroy_singletons();
    println!("singletons left: {}", factory.registry().singleton_count());
    Ok(())
}
