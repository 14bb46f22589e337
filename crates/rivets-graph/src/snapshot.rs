//! Snapshots and exports: the boundary with persistence and rendering.
//!
//! The engine does no file or network I/O on graph data. Instead it trades
//! plain serde-serializable values with its collaborators:
//!
//! - [`GraphSnapshot`]: every node and edge, for a persistence collaborator
//!   implementing [`SnapshotSource`]
//! - [`GraphExport`]: `{nodes: {id, label, state}[], edges: {from, to}[]}`
//!   for a rendering collaborator (DOT, Mermaid, ...)
//!
//! # Restore Semantics
//!
//! [`restore`] is a bulk path. It does **not** run the cycle guard or
//! reject dangling edges or self-loops, so that whatever was saved comes
//! back as-is and [`validate`](crate::DependencyGraph::validate) can report
//! it. Duplicate nodes keep the last record; duplicate edges collapse.

use crate::domain::{Edge, IssueId, LifecycleState, Node};
use crate::error::{GraphError, Result};
use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every node and edge of a graph at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Issue records, sorted by ID
    #[serde(default)]
    pub nodes: Vec<Node>,

    /// Edges, sorted, dangling ones included
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Serialization` if the input is not a snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Capture the full contents of a store.
#[must_use]
pub fn capture(store: &GraphStore) -> GraphSnapshot {
    let nodes = store
        .node_ids()
        .iter()
        .filter_map(|id| store.node(id).cloned())
        .collect();

    GraphSnapshot {
        nodes,
        edges: store.edges(),
    }
}

/// Build a store from a snapshot without per-edge checks.
#[must_use]
pub fn restore(snapshot: &GraphSnapshot) -> GraphStore {
    let mut store = GraphStore::new();

    let mut records: BTreeMap<&IssueId, &Node> = BTreeMap::new();
    for node in &snapshot.nodes {
        if records.insert(&node.id, node).is_some() {
            tracing::warn!(id = %node.id, "Duplicate node in snapshot, keeping last record");
        }
    }
    for node in records.into_values() {
        if let Err(e) = store.add_node(node.clone()) {
            tracing::warn!(error = %e, "Skipped node while restoring snapshot");
        }
    }

    let mut duplicates = 0;
    for edge in &snapshot.edges {
        if !store.insert_edge_unchecked(&edge.from, &edge.to) {
            duplicates += 1;
        }
    }

    tracing::debug!(
        nodes = store.node_count(),
        edges = store.edge_count(),
        duplicates,
        "Restored graph from snapshot"
    );

    store
}

/// Persistence collaborator: an opaque snapshot source and sink.
pub trait SnapshotSource {
    /// Load the most recently saved snapshot.
    ///
    /// # Errors
    ///
    /// Implementations return `GraphError::Source` (or a more specific
    /// variant) when the snapshot cannot be produced.
    fn load(&self) -> Result<GraphSnapshot>;

    /// Save a snapshot, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Implementations return `GraphError::Source` (or a more specific
    /// variant) when the snapshot cannot be stored.
    fn save(&mut self, snapshot: &GraphSnapshot) -> Result<()>;
}

/// A [`SnapshotSource`] that keeps the snapshot as JSON in memory.
///
/// Holding the encoded form rather than the value exercises the same
/// serialization path a file- or database-backed source would.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    json: Option<String>,
}

impl InMemorySource {
    /// An empty source; loading from it yields an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A source pre-seeded with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Serialization` if encoding fails.
    pub fn with_snapshot(snapshot: &GraphSnapshot) -> Result<Self> {
        Ok(Self {
            json: Some(snapshot.to_json()?),
        })
    }

    /// The encoded snapshot, if one was saved.
    #[must_use]
    pub fn as_json(&self) -> Option<&str> {
        self.json.as_deref()
    }
}

impl SnapshotSource for InMemorySource {
    fn load(&self) -> Result<GraphSnapshot> {
        match &self.json {
            Some(json) => GraphSnapshot::from_json(json),
            None => Ok(GraphSnapshot::default()),
        }
    }

    fn save(&mut self, snapshot: &GraphSnapshot) -> Result<()> {
        self.json = Some(snapshot.to_json()?);
        Ok(())
    }
}

/// A node as handed to a rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportNode {
    /// Issue ID
    pub id: IssueId,
    /// Display label: the title if set, otherwise the ID
    pub label: String,
    /// Lifecycle state
    pub state: LifecycleState,
}

/// Rendering input: registered nodes and the edges between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphExport {
    /// Nodes sorted by ID
    pub nodes: Vec<ExportNode>,
    /// Edges between registered nodes, sorted
    pub edges: Vec<Edge>,
}

impl GraphExport {
    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(GraphError::from)
    }
}

/// Build the rendering view of a store. Dangling edges are left out.
#[must_use]
pub fn export(store: &GraphStore) -> GraphExport {
    let nodes = store
        .node_ids()
        .into_iter()
        .filter_map(|id| {
            let node = store.node(&id)?;
            Some(ExportNode {
                label: node.title.clone().unwrap_or_else(|| id.to_string()),
                state: node.state,
                id,
            })
        })
        .collect();

    let edges = store
        .edges()
        .into_iter()
        .filter(|edge| store.has_node(&edge.from) && store.has_node(&edge.to))
        .collect();

    GraphExport { nodes, edges }
}
