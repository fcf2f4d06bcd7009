//! Error types for the singleton registry and bean factory.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Boxed error type returned by user callbacks (destroy hooks, populate
/// steps) that are not themselves registry operations.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Registry errors
///
/// Represents the conditions that can occur while registering, creating,
/// resolving or destroying singleton beans.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{RegistryError, SingletonRegistry};
/// use std::sync::Arc;
///
/// let registry = SingletonRegistry::new();
/// registry.register_singleton("db", Arc::new(1u32)).unwrap();
///
/// match registry.register_singleton("db", Arc::new(2u32)) {
///     Err(RegistryError::DuplicateRegistration(name)) => assert_eq!(name, "db"),
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use ferrous_ioc::RegistryError;
///
/// let circular = RegistryError::CircularCreation("serviceA".to_string());
/// println!("Error: {}", circular);
/// ```
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// A fully-created singleton is already bound to the name
    DuplicateRegistration(String),
    /// Bean requested while it is already being created (unresolvable cycle)
    CircularCreation(String),
    /// Singleton creation requested while the registry tears down
    DestructionInProgress(String),
    /// The construction callback failed
    ConstructionFailed {
        /// Bean whose construction failed
        name: String,
        /// The original cause
        cause: Arc<dyn Error + Send + Sync + 'static>,
        /// Errors suppressed while resolving collaborators for this creation
        related: Vec<RegistryError>,
    },
    /// No registration of any kind exists for the name
    NotFound(String),
    /// The bean exists but is not of the requested type
    TypeMismatch {
        /// Bean name
        name: String,
        /// Requested Rust type
        expected: &'static str,
    },
    /// `after_singleton_creation` called for a name that was not in creation
    NotInCreation(String),
    /// Circular `depends_on` relationship between two bean definitions
    IllegalDependsOn {
        /// Bean being created
        name: String,
        /// Declared dependency that already depends on `name`
        depends_on: String,
    },
    /// A definition or alias cannot override an existing binding
    DefinitionOverride(String),
    /// Invalid configuration value
    Config(String),
}

impl RegistryError {
    /// Wraps an arbitrary error as a construction failure for `name`.
    ///
    /// Registry errors are passed through untouched so that the recoverable
    /// duplicate-registration signal and cycle errors keep their identity.
    pub fn construction<E>(name: impl Into<String>, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        let cause: BoxError = cause.into();
        match cause.downcast::<RegistryError>() {
            Ok(inner) => *inner,
            Err(cause) => RegistryError::ConstructionFailed {
                name: name.into(),
                cause: Arc::from(cause),
                related: Vec::new(),
            },
        }
    }

    /// Bean name this error refers to, if any.
    pub fn bean_name(&self) -> Option<&str> {
        match self {
            RegistryError::DuplicateRegistration(name)
            | RegistryError::CircularCreation(name)
            | RegistryError::DestructionInProgress(name)
            | RegistryError::NotFound(name)
            | RegistryError::NotInCreation(name) => Some(name),
            RegistryError::ConstructionFailed { name, .. }
            | RegistryError::TypeMismatch { name, .. }
            | RegistryError::IllegalDependsOn { name, .. } => Some(name),
            RegistryError::DefinitionOverride(_) | RegistryError::Config(_) => None,
        }
    }

    /// Related causes attached to a construction failure.
    pub fn related_causes(&self) -> &[RegistryError] {
        match self {
            RegistryError::ConstructionFailed { related, .. } => related,
            _ => &[],
        }
    }

    /// Returns true when the error signals an already-bound singleton.
    pub(crate) fn is_duplicate_of(&self, bean: &str) -> bool {
        matches!(self, RegistryError::DuplicateRegistration(name) if name == bean)
    }

    /// Converts the error into the failure reported for bean `name`.
    ///
    /// A failure of `name` itself gains the related causes; a failure of a
    /// collaborator is chained as the cause of a new `ConstructionFailed`.
    /// Cycle and teardown errors keep their variant so callers can match on
    /// them at any nesting depth.
    pub(crate) fn for_bean(self, name: &str, related: Vec<RegistryError>) -> Self {
        match self {
            RegistryError::ConstructionFailed { name: failed, cause, related: mut existing } if failed == name => {
                existing.extend(related);
                RegistryError::ConstructionFailed { name: failed, cause, related: existing }
            }
            err @ (RegistryError::CircularCreation(_)
            | RegistryError::DestructionInProgress(_)
            | RegistryError::IllegalDependsOn { .. }) => err,
            other => RegistryError::ConstructionFailed {
                name: name.to_string(),
                cause: Arc::new(other),
                related,
            },
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateRegistration(name) => {
                write!(f, "Could not register object under bean name '{}': there is already an object bound", name)
            }
            RegistryError::CircularCreation(name) => write!(
                f,
                "Error creating bean with name '{}': Requested bean is currently in creation: Is there an unresolvable circular reference?",
                name
            ),
            RegistryError::DestructionInProgress(name) => write!(
                f,
                "Error creating bean with name '{}': Singleton bean creation not allowed while singletons of this registry are in destruction",
                name
            ),
            RegistryError::ConstructionFailed { name, cause, related } => {
                write!(f, "Error creating bean with name '{}': {}", name, cause)?;
                if !related.is_empty() {
                    write!(f, " ({} related cause(s))", related.len())?;
                }
                Ok(())
            }
            RegistryError::NotFound(name) => write!(f, "No bean named '{}' available", name),
            RegistryError::TypeMismatch { name, expected } => {
                write!(f, "Bean named '{}' is expected to be of type '{}'", name, expected)
            }
            RegistryError::NotInCreation(name) => write!(f, "Singleton '{}' isn't currently in creation", name),
            RegistryError::IllegalDependsOn { name, depends_on } => {
                write!(f, "Circular depends-on relationship between '{}' and '{}'", name, depends_on)
            }
            RegistryError::DefinitionOverride(msg) => write!(f, "Cannot override registration: {}", msg),
            RegistryError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegistryError::ConstructionFailed { cause, .. } => Some(cause.as_ref() as &(dyn Error + 'static)),
            _ => None,
        }
    }
}

/// Result type for registry operations
///
/// A convenience alias for `Result<T, RegistryError>` used throughout
/// ferrous-ioc.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{RegistryResult, RegistryError};
///
/// fn lookup() -> RegistryResult<u32> {
///     Err(RegistryError::NotFound("missing".to_string()))
/// }
///
/// assert!(lookup().is_err());
/// ```
pub type RegistryResult<T> = Result<T, RegistryError>;
