//! Thread-local tracking of prototype beans currently in creation.

use std::cell::RefCell;

use crate::{RegistryError, RegistryResult};

// Prototype creation never goes through the singleton lock, so cycles among
// prototypes are detected per thread.
thread_local! {
    static PROTOTYPES_IN_CREATION: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Marks a prototype bean as in creation on the current thread for the
/// guard's lifetime.
pub(crate) struct PrototypeGuard {
    name: String,
}

impl PrototypeGuard {
    /// Enter creation of `name`; fails if the current thread is already
    /// creating a prototype of that name.
    pub(crate) fn enter(name: &str) -> RegistryResult<Self> {
        PROTOTYPES_IN_CREATION.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|n| n == name) {
                return Err(RegistryError::CircularCreation(name.to_string()));
            }
            stack.push(name.to_string());
            Ok(())
        })?;
        Ok(Self { name: name.to_string() })
    }

    /// Returns true if the current thread is creating a prototype `name`.
    pub(crate) fn is_in_creation(name: &str) -> bool {
        PROTOTYPES_IN_CREATION.with(|stack| stack.borrow().iter().any(|n| n == name))
    }
}

impl Drop for PrototypeGuard {
    fn drop(&mut self) {
        PROTOTYPES_IN_CREATION.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|n| *n == self.name) {
                stack.remove(pos);
            }
        });
    }
}
