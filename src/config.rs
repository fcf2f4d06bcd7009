//! Registry configuration.
//!
//! Settings come from layered [`ConfigSource`]s: environment variables with
//! a prefix, in-memory maps, and (with the `config` feature) JSON files.

use std::collections::HashMap;
use std::env;

use parking_lot::RwLock;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::{RegistryError, RegistryResult};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "FERROUS_IOC";

/// Default cap on suppressed errors kept per top-level creation.
pub const DEFAULT_SUPPRESSED_EXCEPTIONS_LIMIT: usize = 100;

/// Behavioural switches for a [`SingletonRegistry`](crate::SingletonRegistry)
/// and the [`BeanFactory`](crate::BeanFactory) that drives it.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::RegistrySettings;
///
/// let settings = RegistrySettings::default();
/// assert!(settings.allow_circular_references);
/// assert_eq!(settings.suppressed_exceptions_limit, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct RegistrySettings {
    /// Expose early references so field/setter cycles can resolve
    pub allow_circular_references: bool,
    /// Allow re-registering a bean definition or alias under an existing name
    pub allow_definition_overriding: bool,
    /// Suppressed errors retained per top-level creation failure
    pub suppressed_exceptions_limit: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            allow_definition_overriding: true,
            suppressed_exceptions_limit: DEFAULT_SUPPRESSED_EXCEPTIONS_LIMIT,
        }
    }
}

impl RegistrySettings {
    /// Reads settings from `FERROUS_IOC_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> RegistryResult<Self> {
        Self::from_source(&EnvironmentConfigSource::with_prefix(ENV_PREFIX))
    }

    /// Reads settings from a single source.
    pub fn from_source(source: &dyn ConfigSource) -> RegistryResult<Self> {
        Self::from_sources(&[source])
    }

    /// Reads settings from sources in priority order (first wins).
    pub fn from_sources(sources: &[&dyn ConfigSource]) -> RegistryResult<Self> {
        let lookup = |key: &str| sources.iter().find_map(|s| s.get(key));
        let mut settings = Self::default();

        if let Some(value) = lookup("allow_circular_references") {
            settings.allow_circular_references = value.as_bool()?;
        }
        if let Some(value) = lookup("allow_definition_overriding") {
            settings.allow_definition_overriding = value.as_bool()?;
        }
        if let Some(value) = lookup("suppressed_exceptions_limit") {
            let limit = value.as_i64()?;
            settings.suppressed_exceptions_limit = usize::try_from(limit)
                .map_err(|_| RegistryError::Config(format!("suppressed_exceptions_limit must not be negative, got {}", limit)))?;
        }
        Ok(settings)
    }
}

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ConfigValue {
    /// Parses a raw string the way environment variables are interpreted.
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(float_val) = raw.parse::<f64>() {
            ConfigValue::Float(float_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    /// Try to convert to boolean
    pub fn as_bool(&self) -> RegistryResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            other => Err(RegistryError::Config(format!("expected a boolean, got {:?}", other))),
        }
    }

    /// Try to convert to integer
    pub fn as_i64(&self) -> RegistryResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(RegistryError::Config(format!("expected an integer, got {:?}", other))),
        }
    }
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Get a configuration value by key
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// List all available keys
    fn keys(&self) -> Vec<String>;
}

/// Environment variable configuration source
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    /// Prefix to filter environment variables
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.env_key(key)).ok().map(|value| ConfigValue::parse(&value))
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => {
                    let prefix_upper = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&prefix_upper).map(str::to_lowercase)
                }
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// In-memory configuration source
#[derive(Debug, Default)]
pub struct MapConfigSource {
    values: RwLock<HashMap<String, ConfigValue>>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: ConfigValue) {
        self.values.write().insert(key.into(), value);
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.read().get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }
}

/// JSON file configuration source
#[cfg(feature = "config")]
#[derive(Debug)]
pub struct JsonConfigSource {
    /// File path to JSON configuration
    file_path: String,
    /// Cached parsed configuration
    config: RwLock<Option<HashMap<String, ConfigValue>>>,
}

#[cfg(feature = "config")]
impl JsonConfigSource {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            config: RwLock::new(None),
        }
    }

    /// Reload configuration from file
    pub fn reload(&self) -> RegistryResult<()> {
        let content = std::fs::read_to_string(&self.file_path)
            .map_err(|e| RegistryError::Config(format!("cannot read {}: {}", self.file_path, e)))?;
        let parsed: HashMap<String, ConfigValue> = serde_json::from_str(&content)
            .map_err(|e| RegistryError::Config(format!("invalid JSON in {}: {}", self.file_path, e)))?;
        *self.config.write() = Some(parsed);
        Ok(())
    }
}

#[cfg(feature = "config")]
impl ConfigSource for JsonConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        if self.config.read().is_none() {
            if let Err(e) = self.reload() {
                tracing::warn!(error = %e, "failed to load JSON configuration");
                return None;
            }
        }
        self.config.read().as_ref()?.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.config
            .read()
            .as_ref()
            .map(|cfg| cfg.keys().cloned().collect())
            .unwrap_or_default()
    }
}
