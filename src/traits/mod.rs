//! Core traits for the singleton registry.

mod dispose;
mod factory_bean;

pub use dispose::{DisposableBean, DestroyCallback};
pub use factory_bean::FactoryBean;
