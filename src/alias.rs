//! Alias registry: alternative names resolving to a canonical bean name.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{RegistryError, RegistryResult};

/// Maps aliases to the names they stand for.
///
/// Aliases may be chained (`alias -> other alias -> name`); the chain is
/// resolved by [`canonical_name`](AliasRegistry::canonical_name). Cycles are
/// rejected at registration time.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::AliasRegistry;
///
/// let aliases = AliasRegistry::new();
/// aliases.register_alias("dataSource", "ds").unwrap();
/// aliases.register_alias("ds", "primaryDs").unwrap();
///
/// assert_eq!(aliases.canonical_name("primaryDs"), "dataSource");
/// assert!(aliases.is_alias("ds"));
/// ```
#[derive(Debug)]
pub struct AliasRegistry {
    alias_map: RwLock<HashMap<String, String>>,
    allow_overriding: bool,
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasRegistry {
    /// Creates an empty alias registry that allows re-pointing aliases.
    pub fn new() -> Self {
        Self::with_overriding(true)
    }

    /// Creates an empty alias registry with the given overriding policy.
    pub fn with_overriding(allow_overriding: bool) -> Self {
        Self {
            alias_map: RwLock::new(HashMap::new()),
            allow_overriding,
        }
    }

    /// Registers `alias` for `name`.
    ///
    /// Registering a name as its own alias removes any existing alias entry.
    pub fn register_alias(&self, name: &str, alias: &str) -> RegistryResult<()> {
        assert!(!name.is_empty(), "'name' must not be empty");
        assert!(!alias.is_empty(), "'alias' must not be empty");

        let mut map = self.alias_map.write();
        if alias == name {
            map.remove(alias);
            return Ok(());
        }
        if let Some(registered) = map.get(alias) {
            if registered.as_str() == name {
                return Ok(());
            }
            if !self.allow_overriding {
                return Err(RegistryError::DefinitionOverride(format!(
                    "alias '{}' for name '{}': it is already registered for name '{}'",
                    alias, name, registered
                )));
            }
        }
        if resolves_to(&map, name, alias) {
            return Err(RegistryError::DefinitionOverride(format!(
                "alias '{}' for name '{}': circular reference - '{}' is a direct or indirect alias for '{}' already",
                alias, name, name, alias
            )));
        }
        tracing::trace!(alias, name, "registering alias");
        map.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    /// Removes an alias; returns false if it was not registered.
    pub fn remove_alias(&self, alias: &str) -> bool {
        self.alias_map.write().remove(alias).is_some()
    }

    /// Returns true if `name` is registered as an alias.
    pub fn is_alias(&self, name: &str) -> bool {
        self.alias_map.read().contains_key(name)
    }

    /// Returns every alias that resolves, directly or transitively, to `name`.
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let map = self.alias_map.read();
        let mut result = Vec::new();
        collect_aliases(&map, name, &mut result);
        result.sort();
        result
    }

    /// Follows the alias chain and returns the canonical bean name.
    pub fn canonical_name(&self, name: &str) -> String {
        let map = self.alias_map.read();
        let mut canonical = name;
        while let Some(resolved) = map.get(canonical) {
            canonical = resolved.as_str();
        }
        canonical.to_string()
    }
}

fn resolves_to(map: &HashMap<String, String>, from: &str, target: &str) -> bool {
    let mut current = from;
    while let Some(next) = map.get(current) {
        if next.as_str() == target {
            return true;
        }
        current = next.as_str();
    }
    false
}

fn collect_aliases(map: &HashMap<String, String>, name: &str, out: &mut Vec<String>) {
    for (alias, registered) in map {
        if registered.as_str() == name && !out.contains(alias) {
            out.push(alias.clone());
            collect_aliases(map, alias, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_alias_removes_entry() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("a", "x").unwrap();
        aliases.register_alias("x", "x").unwrap();
        assert!(!aliases.is_alias("x"));
    }

    #[test]
    fn rejects_cycles() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("a", "b").unwrap();
        let err = aliases.register_alias("b", "a").unwrap_err();
        assert!(matches!(err, RegistryError::DefinitionOverride(_)));
    }

    #[test]
    fn rejects_override_when_disallowed() {
        let aliases = AliasRegistry::with_overriding(false);
        aliases.register_alias("a", "alias").unwrap();
        aliases.register_alias("a", "alias").unwrap();
        assert!(aliases.register_alias("b", "alias").is_err());
        assert_eq!(aliases.canonical_name("alias"), "a");
    }

    #[test]
    fn transitive_aliases_are_collected() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("bean", "one").unwrap();
        aliases.register_alias("one", "two").unwrap();
        aliases.register_alias("other", "three").unwrap();
        assert_eq!(aliases.aliases_of("bean"), vec!["one".to_string(), "two".to_string()]);
        assert!(aliases.remove_alias("two"));
        assert_eq!(aliases.canonical_name("two"), "two");
    }
}
