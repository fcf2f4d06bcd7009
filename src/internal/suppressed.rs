//! Bounded collection of errors suppressed during one singleton creation.

use crate::RegistryError;

/// Errors from collaborators that failed while a top-level singleton was
/// being created. Attached to the creation error as related causes.
#[derive(Debug)]
pub(crate) struct SuppressedErrors {
    errors: Vec<RegistryError>,
    limit: usize,
}

impl SuppressedErrors {
    pub(crate) fn new(limit: usize) -> Self {
        Self { errors: Vec::new(), limit }
    }

    /// Record `err`; returns false once the limit has been reached.
    pub(crate) fn record(&mut self, err: RegistryError) -> bool {
        if self.errors.len() >= self.limit {
            return false;
        }
        self.errors.push(err);
        true
    }

    pub(crate) fn into_errors(self) -> Vec<RegistryError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_limit() {
        let mut suppressed = SuppressedErrors::new(2);
        assert!(suppressed.record(RegistryError::NotFound("a".into())));
        assert!(suppressed.record(RegistryError::NotFound("b".into())));
        assert!(!suppressed.record(RegistryError::NotFound("c".into())));
        assert_eq!(suppressed.into_errors().len(), 2);
    }
}
