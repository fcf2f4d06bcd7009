//! Dependency and containment relationships between beans.
//!
//! Only used to order destruction; nothing here participates in creation,
//! so each map has its own narrow lock instead of the singleton lock.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

/// Insertion-ordered set of bean names.
type NameSet = Vec<String>;

fn insert_name(set: &mut NameSet, name: &str) -> bool {
    if set.iter().any(|n| n == name) {
        return false;
    }
    set.push(name.to_string());
    true
}

fn remove_name(set: &mut NameSet, name: &str) {
    set.retain(|n| n != name);
}

/// Dependent-bean graph with its mirror, plus the containment graph.
///
/// Lock order is always `dependent_beans` before `dependencies_for_bean`.
#[derive(Debug, Default)]
pub(crate) struct BeanGraph {
    /// bean name -> beans that depend on it
    dependent_beans: Mutex<HashMap<String, NameSet>>,
    /// dependent bean name -> beans it depends on
    dependencies_for_bean: Mutex<HashMap<String, NameSet>>,
    /// containing bean name -> inner beans it contains
    contained_beans: Mutex<HashMap<String, NameSet>>,
}

impl BeanGraph {
    /// Records that `dependent` depends on `name`. Returns false if the
    /// edge already existed.
    pub(crate) fn register_dependent(&self, name: &str, dependent: &str) -> bool {
        let mut dependents = self.dependent_beans.lock();
        if !insert_name(dependents.entry(name.to_string()).or_default(), dependent) {
            return false;
        }
        let mut dependencies = self.dependencies_for_bean.lock();
        insert_name(dependencies.entry(dependent.to_string()).or_default(), name);
        true
    }

    /// Records that `containing` contains `contained`. Returns false if the
    /// edge already existed.
    pub(crate) fn register_contained(&self, contained: &str, containing: &str) -> bool {
        let mut contained_beans = self.contained_beans.lock();
        insert_name(contained_beans.entry(containing.to_string()).or_default(), contained)
    }

    /// Transitive check whether `dependent` depends on `name`.
    pub(crate) fn is_dependent(&self, name: &str, dependent: &str, canonical: &dyn Fn(&str) -> String) -> bool {
        let dependents = self.dependent_beans.lock();
        let mut seen = HashSet::new();
        is_dependent_in(&dependents, name, dependent, canonical, &mut seen)
    }

    pub(crate) fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependent_beans.lock().get(name).cloned().unwrap_or_default()
    }

    pub(crate) fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.dependencies_for_bean.lock().get(name).cloned().unwrap_or_default()
    }

    pub(crate) fn contained_in(&self, name: &str) -> Vec<String> {
        self.contained_beans.lock().get(name).cloned().unwrap_or_default()
    }

    pub(crate) fn has_dependents(&self, name: &str) -> bool {
        self.dependent_beans.lock().contains_key(name)
    }

    /// Detaches and returns the dependents of `name`, keeping the mirror
    /// map consistent.
    pub(crate) fn take_dependents(&self, name: &str) -> Vec<String> {
        let mut dependents = self.dependent_beans.lock();
        let taken = dependents.remove(name).unwrap_or_default();
        if !taken.is_empty() {
            let mut dependencies = self.dependencies_for_bean.lock();
            for dependent in &taken {
                if let Some(set) = dependencies.get_mut(dependent) {
                    remove_name(set, name);
                    if set.is_empty() {
                        dependencies.remove(dependent);
                    }
                }
            }
        }
        taken
    }

    /// Detaches and returns the beans contained in `name`.
    pub(crate) fn take_contained(&self, name: &str) -> Vec<String> {
        self.contained_beans.lock().remove(name).unwrap_or_default()
    }

    /// Removes every edge that mentions `name`.
    pub(crate) fn purge(&self, name: &str) {
        let mut dependents = self.dependent_beans.lock();
        let mut dependencies = self.dependencies_for_bean.lock();

        dependents.remove(name);
        dependencies.remove(name);
        dependents.retain(|_, set| {
            remove_name(set, name);
            !set.is_empty()
        });
        dependencies.retain(|_, set| {
            remove_name(set, name);
            !set.is_empty()
        });
        drop(dependencies);
        drop(dependents);

        let mut contained = self.contained_beans.lock();
        contained.remove(name);
        contained.retain(|_, set| {
            remove_name(set, name);
            !set.is_empty()
        });
    }

    pub(crate) fn clear(&self) {
        self.contained_beans.lock().clear();
        self.dependent_beans.lock().clear();
        self.dependencies_for_bean.lock().clear();
    }

    /// All `(name, dependent)` edges.
    pub(crate) fn dependent_edges(&self) -> Vec<(String, String)> {
        flatten(&self.dependent_beans.lock())
    }

    /// All `(containing, contained)` edges.
    pub(crate) fn containment_edges(&self) -> Vec<(String, String)> {
        flatten(&self.contained_beans.lock())
    }

    /// Returns true when the two maps mirror each other exactly.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let dependents = self.dependent_beans.lock();
        let dependencies = self.dependencies_for_bean.lock();

        let forward: HashSet<(&str, &str)> = dependents
            .iter()
            .flat_map(|(name, set)| set.iter().map(move |d| (name.as_str(), d.as_str())))
            .collect();
        let backward: HashSet<(&str, &str)> = dependencies
            .iter()
            .flat_map(|(dependent, set)| set.iter().map(move |n| (n.as_str(), dependent.as_str())))
            .collect();
        forward == backward
    }
}

fn is_dependent_in(
    dependents: &HashMap<String, NameSet>,
    name: &str,
    dependent: &str,
    canonical: &dyn Fn(&str) -> String,
    seen: &mut HashSet<String>,
) -> bool {
    if seen.contains(name) {
        return false;
    }
    let canonical_name = canonical(name);
    let Some(direct) = dependents.get(&canonical_name) else {
        return false;
    };
    if direct.iter().any(|d| d == dependent) {
        return true;
    }
    seen.insert(name.to_string());
    direct
        .iter()
        .any(|transitive| is_dependent_in(dependents, transitive, dependent, canonical, seen))
}

fn flatten(map: &HashMap<String, NameSet>) -> Vec<(String, String)> {
    let mut edges: Vec<(String, String)> = map
        .iter()
        .flat_map(|(from, set)| set.iter().map(move |to| (from.clone(), to.clone())))
        .collect();
    edges.sort();
    edges
}
