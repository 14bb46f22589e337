//! Raw node and edge storage.
//!
//! [`GraphStore`] owns the issue records and the dependency graph and offers
//! add/remove/lookup primitives with no policy beyond structural existence.
//! Cycle prevention lives in [`cycle`](crate::cycle); the store will happily
//! hold whatever it is given.
//!
//! # Architecture
//!
//! - `HashMap<IssueId, Node>` for O(1) record lookups
//! - `petgraph::StableDiGraph` for the edges, so removals never shift the
//!   indices of surviving vertices
//! - `HashMap<IssueId, NodeIndex>` mapping IDs to graph vertices
//!
//! ## Placeholder Vertices
//!
//! Every registered node has a vertex, but not every vertex has a record.
//! When a snapshot is restored with an edge whose endpoint is missing, the
//! endpoint gets a vertex and no record. Such edges are *dangling*: queries
//! skip them, and [`validation`](crate::validation) reports and repairs them.
//! A placeholder vertex is dropped as soon as its last edge goes away.

use crate::domain::{Edge, IssueId, LifecycleState, Node};
use crate::error::{GraphError, Result};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

/// Owned node and edge sets for one dependency graph.
///
/// Edge direction: source (dependent) -> target (dependency).
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    /// Registered issues indexed by ID
    nodes: HashMap<IssueId, Node>,

    /// Dependency edges. Vertex weights are the issue IDs.
    graph: StableDiGraph<IssueId, ()>,

    /// Mapping from IssueId to graph vertex, including placeholders.
    node_map: HashMap<IssueId, NodeIndex>,

    /// Bumped on every committed mutation
    version: u64,
}

impl GraphStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic version of this store, bumped on every mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether `id` is a registered issue.
    #[must_use]
    pub fn has_node(&self, id: &IssueId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up an issue record.
    #[must_use]
    pub fn node(&self, id: &IssueId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Lifecycle state of a registered issue.
    #[must_use]
    pub fn state(&self, id: &IssueId) -> Option<LifecycleState> {
        self.nodes.get(id).map(|node| node.state)
    }

    /// Iterate over all registered issues in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Registered issue IDs in sorted order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<IssueId> {
        let mut ids: Vec<IssueId> = self.nodes.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered issues.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges, dangling ones included.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edges in sorted order, dangling edges and self-loops included.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| Edge {
                from: self.graph[a].clone(),
                to: self.graph[b].clone(),
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Register a new issue.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::DuplicateNode` if the ID is already registered.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }

        // A placeholder left by a restore is adopted, which heals its edges
        if !self.node_map.contains_key(&node.id) {
            let index = self.graph.add_node(node.id.clone());
            self.node_map.insert(node.id.clone(), index);
        }
        self.nodes.insert(node.id.clone(), node);
        self.touch();

        Ok(())
    }

    /// Remove an issue.
    ///
    /// Without `cascade`, removal fails while any edge references the issue.
    /// With `cascade`, incident edges are removed first and returned.
    ///
    /// # Errors
    ///
    /// - `GraphError::UnknownNode` if the issue is not registered
    /// - `GraphError::NodeInUse` if edges reference it and `cascade` is false
    pub fn remove_node(&mut self, id: &IssueId, cascade: bool) -> Result<Vec<Edge>> {
        if !self.nodes.contains_key(id) {
            return Err(GraphError::UnknownNode(id.clone()));
        }
        let index = self.node_map[id];

        let dependents = self.neighbor_ids(index, Direction::Incoming);
        let dependencies = self.neighbor_ids(index, Direction::Outgoing);

        if !cascade && (!dependents.is_empty() || !dependencies.is_empty()) {
            return Err(GraphError::NodeInUse {
                issue_id: id.clone(),
                dependents: dependents.into_iter().collect(),
                dependencies: dependencies.into_iter().collect(),
            });
        }

        let mut removed: Vec<Edge> = dependencies
            .iter()
            .map(|to| Edge::new(id.clone(), to.clone()))
            .chain(
                dependents
                    .iter()
                    .filter(|from| *from != id)
                    .map(|from| Edge::new(from.clone(), id.clone())),
            )
            .collect();
        removed.sort_unstable();

        // Neighbours that were only placeholders go away with their last edge
        let orphans: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .chain(self.graph.neighbors_directed(index, Direction::Incoming))
            .filter(|n| *n != index)
            .collect();

        self.graph.remove_node(index);
        self.node_map.remove(id);
        self.nodes.remove(id);
        for orphan in orphans {
            self.prune_placeholder(orphan);
        }
        self.touch();

        Ok(removed)
    }

    /// Change an issue's lifecycle state, returning the previous state.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if the issue is not registered.
    pub fn set_state(&mut self, id: &IssueId, state: LifecycleState) -> Result<LifecycleState> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
        let previous = std::mem::replace(&mut node.state, state);
        if previous != state {
            self.touch();
        }
        Ok(previous)
    }

    /// Direct dependencies of an issue (targets of its outgoing edges).
    ///
    /// Dangling targets are included; queries such as roots and
    /// availability skip them.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if the issue is not registered.
    pub fn outgoing(&self, id: &IssueId) -> Result<BTreeSet<IssueId>> {
        let index = self.registered_index(id)?;
        Ok(self.neighbor_ids(index, Direction::Outgoing))
    }

    /// Direct dependents of an issue (sources of its incoming edges).
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if the issue is not registered.
    pub fn incoming(&self, id: &IssueId) -> Result<BTreeSet<IssueId>> {
        let index = self.registered_index(id)?;
        Ok(self.neighbor_ids(index, Direction::Incoming))
    }

    /// Whether the edge `from -> to` exists.
    #[must_use]
    pub fn contains_edge(&self, from: &IssueId, to: &IssueId) -> bool {
        match (self.node_map.get(from), self.node_map.get(to)) {
            (Some(a), Some(b)) => self.graph.find_edge(*a, *b).is_some(),
            _ => false,
        }
    }

    /// Remove the edge `from -> to`.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::EdgeNotFound` if the edge does not exist.
    pub fn remove_edge(&mut self, from: &IssueId, to: &IssueId) -> Result<()> {
        let not_found = || GraphError::EdgeNotFound {
            from: from.clone(),
            to: to.clone(),
        };

        let a = *self.node_map.get(from).ok_or_else(not_found)?;
        let b = *self.node_map.get(to).ok_or_else(not_found)?;
        let edge = self.graph.find_edge(a, b).ok_or_else(not_found)?;

        self.graph.remove_edge(edge);
        self.prune_placeholder(a);
        self.prune_placeholder(b);
        self.touch();

        Ok(())
    }

    /// Insert `from -> to` between two registered issues.
    ///
    /// Callers are responsible for the acyclicity check. Returns `false` if
    /// the edge was already present.
    pub(crate) fn insert_edge(&mut self, from: &IssueId, to: &IssueId) -> Result<bool> {
        let a = self.registered_index(from)?;
        let b = self.registered_index(to)?;
        if self.graph.find_edge(a, b).is_some() {
            return Ok(false);
        }
        self.graph.add_edge(a, b, ());
        self.touch();
        Ok(true)
    }

    /// Insert an edge with no checks at all, creating placeholder vertices
    /// for unknown endpoints. Only the restore path uses this.
    pub(crate) fn insert_edge_unchecked(&mut self, from: &IssueId, to: &IssueId) -> bool {
        let a = self.vertex_or_placeholder(from);
        let b = self.vertex_or_placeholder(to);
        if self.graph.find_edge(a, b).is_some() {
            return false;
        }
        self.graph.add_edge(a, b, ());
        self.touch();
        true
    }

    /// Borrow the underlying graph for read-only algorithms.
    pub(crate) fn graph(&self) -> &StableDiGraph<IssueId, ()> {
        &self.graph
    }

    /// Vertex of a registered issue.
    pub(crate) fn registered_index(&self, id: &IssueId) -> Result<NodeIndex> {
        if !self.nodes.contains_key(id) {
            return Err(GraphError::UnknownNode(id.clone()));
        }
        Ok(self.node_map[id])
    }

    /// Whether a vertex carries a registered issue (not a placeholder).
    pub(crate) fn is_registered(&self, index: NodeIndex) -> bool {
        self.graph
            .node_weight(index)
            .is_some_and(|id| self.nodes.contains_key(id))
    }

    /// Registered neighbours of a vertex, sorted by ID.
    ///
    /// Sorting keeps traversal order deterministic regardless of insertion
    /// history.
    pub(crate) fn registered_neighbors(
        &self,
        index: NodeIndex,
        direction: Direction,
    ) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self
            .graph
            .edges_directed(index, direction)
            .map(|edge| match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .filter(|n| self.is_registered(*n))
            .collect();
        neighbors.sort_unstable_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        neighbors.dedup();
        neighbors
    }

    fn neighbor_ids(&self, index: NodeIndex, direction: Direction) -> BTreeSet<IssueId> {
        self.graph
            .neighbors_directed(index, direction)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    fn vertex_or_placeholder(&mut self, id: &IssueId) -> NodeIndex {
        if let Some(index) = self.node_map.get(id) {
            return *index;
        }
        let index = self.graph.add_node(id.clone());
        self.node_map.insert(id.clone(), index);
        index
    }

    fn prune_placeholder(&mut self, index: NodeIndex) {
        if self.is_registered(index) {
            return;
        }
        let Some(id) = self.graph.node_weight(index).cloned() else {
            return;
        };
        let has_edges = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .next()
            .is_some()
            || self
                .graph
                .neighbors_directed(index, Direction::Incoming)
                .next()
                .is_some();
        if !has_edges {
            self.graph.remove_node(index);
            self.node_map.remove(&id);
        }
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Carry the version on from a store this one replaces.
    pub(crate) fn continue_from(&mut self, previous: u64) {
        self.version = self.version.max(previous) + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> IssueId {
        IssueId::new(s)
    }

    fn store_with(ids: &[&str]) -> GraphStore {
        let mut store = GraphStore::new();
        for s in ids {
            store.add_node(Node::new(*s)).unwrap();
        }
        store
    }

    #[test]
    fn add_node_rejects_duplicates() {
        let mut store = store_with(&["a"]);
        let err = store.add_node(Node::new("a")).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(ref d) if d == &id("a")));
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn outgoing_and_incoming_are_mirrors() {
        let mut store = store_with(&["a", "b", "c"]);
        store.insert_edge(&id("a"), &id("b")).unwrap();
        store.insert_edge(&id("c"), &id("b")).unwrap();

        assert_eq!(store.outgoing(&id("a")).unwrap(), BTreeSet::from([id("b")]));
        assert_eq!(
            store.incoming(&id("b")).unwrap(),
            BTreeSet::from([id("a"), id("c")])
        );
        assert!(store.outgoing(&id("b")).unwrap().is_empty());
    }

    #[test]
    fn outgoing_of_unknown_node_fails() {
        let store = GraphStore::new();
        assert!(matches!(
            store.outgoing(&id("ghost")),
            Err(GraphError::UnknownNode(_))
        ));
    }

    #[test]
    fn remove_node_in_use_without_cascade_fails() {
        let mut store = store_with(&["a", "b"]);
        store.insert_edge(&id("a"), &id("b")).unwrap();

        let err = store.remove_node(&id("b"), false).unwrap_err();
        match err {
            GraphError::NodeInUse {
                dependents,
                dependencies,
                ..
            } => {
                assert_eq!(dependents, vec![id("a")]);
                assert!(dependencies.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.has_node(&id("b")));
        assert!(store.contains_edge(&id("a"), &id("b")));
    }

    #[test]
    fn remove_node_with_cascade_drops_incident_edges() {
        let mut store = store_with(&["a", "b", "c"]);
        store.insert_edge(&id("a"), &id("b")).unwrap();
        store.insert_edge(&id("b"), &id("c")).unwrap();

        let removed = store.remove_node(&id("b"), true).unwrap();

        assert_eq!(removed, vec![Edge::new("a", "b"), Edge::new("b", "c")]);
        assert!(!store.has_node(&id("b")));
        assert_eq!(store.edge_count(), 0);
        assert!(store.outgoing(&id("a")).unwrap().is_empty());
    }

    #[test]
    fn indices_survive_removal() {
        let mut store = store_with(&["a", "b", "c", "d"]);
        store.insert_edge(&id("c"), &id("d")).unwrap();
        store.remove_node(&id("a"), false).unwrap();

        assert!(store.contains_edge(&id("c"), &id("d")));
        assert_eq!(store.outgoing(&id("c")).unwrap(), BTreeSet::from([id("d")]));
    }

    #[test]
    fn remove_missing_edge_fails() {
        let mut store = store_with(&["a", "b"]);
        assert!(matches!(
            store.remove_edge(&id("a"), &id("b")),
            Err(GraphError::EdgeNotFound { .. })
        ));
    }

    #[test]
    fn placeholder_is_pruned_with_last_edge() {
        let mut store = store_with(&["a"]);
        assert!(store.insert_edge_unchecked(&id("a"), &id("ghost")));
        assert_eq!(store.edges(), vec![Edge::new("a", "ghost")]);
        assert!(!store.has_node(&id("ghost")));
        assert!(store.outgoing(&id("a")).unwrap().contains(&id("ghost")));

        store.remove_edge(&id("a"), &id("ghost")).unwrap();
        assert_eq!(store.edge_count(), 0);
        assert!(!store.node_map.contains_key(&id("ghost")));
    }

    #[test]
    fn adding_placeholder_id_adopts_its_edges() {
        let mut store = store_with(&["a"]);
        store.insert_edge_unchecked(&id("a"), &id("late"));
        store.add_node(Node::new("late")).unwrap();

        assert!(store.has_node(&id("late")));
        assert_eq!(store.incoming(&id("late")).unwrap(), BTreeSet::from([id("a")]));
    }

    #[test]
    fn version_tracks_mutations() {
        let mut store = store_with(&["a", "b"]);
        let v0 = store.version();

        store.insert_edge(&id("a"), &id("b")).unwrap();
        assert_eq!(store.version(), v0 + 1);

        // Re-inserting and no-op state changes are not mutations
        store.insert_edge(&id("a"), &id("b")).unwrap();
        store.set_state(&id("a"), LifecycleState::Backlog).unwrap();
        assert_eq!(store.version(), v0 + 1);

        let previous = store.set_state(&id("a"), LifecycleState::Done).unwrap();
        assert_eq!(previous, LifecycleState::Backlog);
        assert_eq!(store.version(), v0 + 2);
    }
}
