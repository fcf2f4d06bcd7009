//! Snapshot export of the registry's bean graph for visualization.
//!
//! A [`GraphSnapshot`] captures which singletons exist, which are still in
//! creation, and the dependency and containment edges used to order
//! teardown. It renders to DOT and Mermaid, and with the `graph-export`
//! feature to JSON and YAML.

use std::collections::BTreeMap;
use std::fmt::Write as _;

#[cfg(feature = "graph-export")]
use serde::{Deserialize, Serialize};

use crate::{RegistryError, RegistryResult, SingletonRegistry};

/// Lifecycle state of a node when the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub enum NodeState {
    /// Fully created singleton
    Created,
    /// In creation; an early reference or factory may exist
    InCreation,
    /// Only known from relationships or a disposable registration
    Registered,
}

/// A bean in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphNode {
    /// Bean name
    pub name: String,
    pub state: NodeState,
    /// Whether a destruction callback is registered
    pub disposable: bool,
}

/// Kind of relationship between two beans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub enum EdgeKind {
    /// `from` depends on `to`; `from` is destroyed first
    DependsOn,
    /// `from` contains `to` as an inner bean
    Contains,
}

/// A relationship between two beans.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// Metadata about the snapshot.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphMetadata {
    /// Fully created singletons
    pub singleton_count: usize,
    /// Beans in creation when the snapshot was taken
    pub in_creation_count: usize,
    /// Whether some bean transitively depends on itself
    pub has_circular_references: bool,
    /// Export timestamp (RFC 3339, empty without `graph-export`)
    pub exported_at: String,
    /// Crate version that produced the snapshot
    pub version: String,
}

/// Point-in-time view of a registry's beans and relationships.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{bean, ExportFormat, SingletonRegistry};
///
/// let registry = SingletonRegistry::new();
/// registry.register_singleton("db", bean(())).unwrap();
/// registry.register_singleton("repo", bean(())).unwrap();
/// registry.register_dependent_bean("db", "repo");
///
/// let snapshot = registry.graph_snapshot();
/// let dot = snapshot.export(ExportFormat::Dot).unwrap();
/// assert!(dot.contains("\"repo\" -> \"db\""));
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub metadata: GraphMetadata,
}

/// Export formats supported for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// JSON (requires `graph-export`)
    Json,
    /// YAML (requires `graph-export`)
    Yaml,
    /// DOT for Graphviz
    Dot,
    /// Mermaid for documentation
    Mermaid,
}

fn exported_at() -> String {
    #[cfg(feature = "graph-export")]
    {
        chrono::Utc::now().to_rfc3339()
    }
    #[cfg(not(feature = "graph-export"))]
    {
        String::new()
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

impl SingletonRegistry {
    /// Captures the current beans and relationships.
    ///
    /// Reads each cache without taking the singleton lock, so a snapshot
    /// never waits for an in-flight creation. The parts may therefore be
    /// captured at slightly different moments.
    pub fn graph_snapshot(&self) -> GraphSnapshot {
        let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
        let mut node = |name: &str| {
            nodes.entry(name.to_string()).or_insert_with(|| GraphNode {
                name: name.to_string(),
                state: NodeState::Registered,
                disposable: false,
            });
        };

        let singletons = self.completed_singleton_names();
        let in_creation = self.singletons_in_creation();
        let disposables = self.disposable_names();
        let dependent_edges = self.graph().dependent_edges();
        let containment_edges = self.graph().containment_edges();

        for name in singletons.iter().chain(&in_creation).chain(&disposables) {
            node(name.as_str());
        }
        for (a, b) in dependent_edges.iter().chain(&containment_edges) {
            node(a.as_str());
            node(b.as_str());
        }

        let mut singleton_count = 0;
        for entry in nodes.values_mut() {
            if self.contains_singleton(&entry.name) {
                entry.state = NodeState::Created;
                singleton_count += 1;
            } else if in_creation.contains(&entry.name) {
                entry.state = NodeState::InCreation;
            }
            entry.disposable = disposables.contains(&entry.name);
        }

        let has_circular_references = nodes.keys().any(|name| self.is_dependent(name, name));

        let mut edges: Vec<GraphEdge> = dependent_edges
            .into_iter()
            .map(|(name, dependent)| GraphEdge { from: dependent, to: name, kind: EdgeKind::DependsOn })
            .collect();
        edges.extend(
            containment_edges
                .into_iter()
                .map(|(containing, contained)| GraphEdge { from: containing, to: contained, kind: EdgeKind::Contains }),
        );

        GraphSnapshot {
            nodes: nodes.into_values().collect(),
            edges,
            metadata: GraphMetadata {
                singleton_count,
                in_creation_count: in_creation.len(),
                has_circular_references,
                exported_at: exported_at(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

impl GraphSnapshot {
    /// Renders the snapshot in `format`.
    pub fn export(&self, format: ExportFormat) -> RegistryResult<String> {
        match format {
            ExportFormat::Json => self.to_json(),
            ExportFormat::Yaml => self.to_yaml(),
            ExportFormat::Dot => Ok(self.to_dot()),
            ExportFormat::Mermaid => Ok(self.to_mermaid()),
        }
    }

    #[cfg(feature = "graph-export")]
    fn to_json(&self) -> RegistryResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RegistryError::Config(format!("JSON export failed: {}", e)))
    }

    #[cfg(not(feature = "graph-export"))]
    fn to_json(&self) -> RegistryResult<String> {
        Err(RegistryError::Config("JSON export requires the graph-export feature".to_string()))
    }

    #[cfg(feature = "graph-export")]
    fn to_yaml(&self) -> RegistryResult<String> {
        serde_yaml::to_string(self).map_err(|e| RegistryError::Config(format!("YAML export failed: {}", e)))
    }

    #[cfg(not(feature = "graph-export"))]
    fn to_yaml(&self) -> RegistryResult<String> {
        Err(RegistryError::Config("YAML export requires the graph-export feature".to_string()))
    }

    /// Graphviz DOT rendering.
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph BeanGraph {\n");
        output.push_str("  rankdir=TB;\n");
        output.push_str("  node [shape=box];\n\n");

        for node in &self.nodes {
            let color = match node.state {
                NodeState::Created => "lightblue",
                NodeState::InCreation => "lightyellow",
                NodeState::Registered => "white",
            };
            let peripheries = if node.disposable { 2 } else { 1 };
            let _ = writeln!(
                output,
                "  {} [fillcolor={}, style=filled, peripheries={}];",
                quote(&node.name),
                color,
                peripheries
            );
        }

        output.push('\n');
        for edge in &self.edges {
            let style = match edge.kind {
                EdgeKind::DependsOn => "solid",
                EdgeKind::Contains => "dashed",
            };
            let _ = writeln!(output, "  {} -> {} [style={}];", quote(&edge.from), quote(&edge.to), style);
        }

        output.push_str("}\n");
        output
    }

    /// Mermaid flowchart rendering.
    pub fn to_mermaid(&self) -> String {
        let ids: BTreeMap<&str, String> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.as_str(), format!("n{}", i)))
            .collect();

        let mut output = String::from("graph TD\n");
        for node in &self.nodes {
            let label = node.name.replace('"', "#quot;");
            let _ = writeln!(output, "  {}[\"{}\"]", ids[node.name.as_str()], label);
        }
        for edge in &self.edges {
            let (Some(from), Some(to)) = (ids.get(edge.from.as_str()), ids.get(edge.to.as_str())) else {
                continue;
            };
            let arrow = match edge.kind {
                EdgeKind::DependsOn => "-->",
                EdgeKind::Contains => "-.->",
            };
            let _ = writeln!(output, "  {} {} {}", from, arrow, to);
        }

        output.push_str("\n  classDef created fill:#e1f5fe\n");
        output.push_str("  classDef creating fill:#fff3e0\n");
        for node in &self.nodes {
            let class = match node.state {
                NodeState::Created => "created",
                NodeState::InCreation => "creating",
                NodeState::Registered => continue,
            };
            let _ = writeln!(output, "  class {} {}", ids[node.name.as_str()], class);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bean, DestroyCallback};
    use std::sync::Arc;

    fn sample() -> SingletonRegistry {
        let registry = SingletonRegistry::new();
        registry.register_singleton("db", bean(())).unwrap();
        registry.register_singleton("repo", bean(())).unwrap();
        registry.register_dependent_bean("db", "repo");
        registry.register_contained_bean("inner", "repo");
        registry.register_disposable_bean("db", Arc::new(DestroyCallback::new(|| Ok(()))));
        registry
    }

    #[test]
    fn snapshot_collects_nodes_and_edges() {
        let snapshot = sample().graph_snapshot();
        let names: Vec<&str> = snapshot.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["db", "inner", "repo"]);
        assert_eq!(snapshot.metadata.singleton_count, 2);
        assert!(!snapshot.metadata.has_circular_references);

        let db = &snapshot.nodes[0];
        assert_eq!(db.state, NodeState::Created);
        assert!(db.disposable);
        assert_eq!(snapshot.nodes[1].state, NodeState::Registered);

        assert!(snapshot
            .edges
            .contains(&GraphEdge { from: "repo".into(), to: "db".into(), kind: EdgeKind::DependsOn }));
        assert!(snapshot
            .edges
            .contains(&GraphEdge { from: "repo".into(), to: "inner".into(), kind: EdgeKind::Contains }));
    }

    #[test]
    fn snapshot_does_not_wait_for_creation() {
        let owned = SingletonRegistry::new();
        owned.register_singleton("db", bean(())).unwrap();
        let registry = &owned;
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        crossbeam_utils::thread::scope(|s| {
            s.spawn(move |_| {
                registry
                    .get_or_create_singleton("slow", || {
                        started_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(bean(()))
                    })
                    .unwrap();
            });

            started_rx.recv().unwrap();
            let snapshot = registry.graph_snapshot();
            release_tx.send(()).unwrap();

            let slow = snapshot.nodes.iter().find(|n| n.name == "slow").unwrap();
            assert_eq!(slow.state, NodeState::InCreation);
            assert_eq!(snapshot.metadata.singleton_count, 1);
        })
        .unwrap();

        assert!(owned.contains_singleton("slow"));
    }

    #[test]
    fn detects_cycles() {
        let registry = SingletonRegistry::new();
        registry.register_dependent_bean("a", "b");
        registry.register_dependent_bean("b", "a");
        assert!(registry.graph_snapshot().metadata.has_circular_references);
    }

    #[test]
    fn mermaid_uses_safe_ids() {
        let registry = SingletonRegistry::new();
        registry.register_singleton("my.bean", bean(())).unwrap();
        let mermaid = registry.graph_snapshot().to_mermaid();
        assert!(mermaid.contains("n0[\"my.bean\"]"));
        assert!(mermaid.contains("class n0 created"));
    }

    #[test]
    fn dot_escapes_names() {
        let registry = SingletonRegistry::new();
        registry.register_singleton("say \"hi\"", bean(())).unwrap();
        let dot = registry.graph_snapshot().to_dot();
        assert!(dot.contains("\"say \\\"hi\\\"\""));
    }

    #[cfg(feature = "graph-export")]
    #[test]
    fn serializes_to_json_and_yaml() {
        let snapshot = sample().graph_snapshot();
        let json = snapshot.export(ExportFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["metadata"]["singleton_count"], 2);
        assert!(!parsed["metadata"]["exported_at"].as_str().unwrap().is_empty());

        let yaml = snapshot.export(ExportFormat::Yaml).unwrap();
        assert!(yaml.contains("DependsOn"));
    }

    #[cfg(not(feature = "graph-export"))]
    #[test]
    fn structured_formats_need_feature() {
        assert!(matches!(sample().graph_snapshot().export(ExportFormat::Json), Err(RegistryError::Config(_))));
    }
}
