//! Ordered storage of disposable bean registrations.

use std::sync::Arc;

use crate::DisposableBean;

/// Disposable beans keyed by name, kept in registration order.
///
/// Re-registering a name replaces the callback but keeps its original
/// position, so teardown order reflects when the bean first became
/// disposable.
#[derive(Default)]
pub(crate) struct DisposableBeans {
    entries: Vec<(String, Arc<dyn DisposableBean>)>,
}

impl DisposableBeans {
    /// Add or replace the disposable for `name`.
    pub(crate) fn insert(&mut self, name: String, bean: Arc<dyn DisposableBean>) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = bean,
            None => self.entries.push((name, bean)),
        }
    }

    /// Remove and return the disposable for `name`.
    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<dyn DisposableBean>> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Registered names in registration order.
    pub(crate) fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
