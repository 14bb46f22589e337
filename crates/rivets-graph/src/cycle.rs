//! Cycle prevention and detection.
//!
//! [`try_add_edge`] is the only way an edge gets into the graph through the
//! public API, and it is the sole gatekeeper of acyclicity: adding
//! `from -> to` closes a cycle exactly when `from` is already reachable from
//! `to`. The search is an iterative BFS with an explicit visited set, so deep
//! chains cannot overflow the stack.
//!
//! [`find_cycles`] is the independent global check used by validation to
//! catch cycles that entered through restore paths.

use crate::domain::IssueId;
use crate::error::{GraphError, Result};
use crate::store::GraphStore;
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

/// Result of a successful dependency insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The edge was inserted
    Added,
    /// The edge was already present; nothing changed
    AlreadyExists,
}

/// Add `from -> to` unless it would break the DAG.
///
/// Adding an existing edge is an idempotent no-op.
///
/// The reachability search also follows dangling edges through placeholder
/// vertices, which traversals skip. On a restored graph the reported path
/// may therefore pass through an unregistered ID. Such a route becomes real
/// as soon as the missing issue is registered, so the edge is refused now.
///
/// # Errors
///
/// - `GraphError::SelfLoop` if `from == to`
/// - `GraphError::UnknownNode` if either issue is not registered
/// - `GraphError::CycleDetected` with the path `to -> ... -> from` if the
///   edge would close a cycle
pub fn try_add_edge(store: &mut GraphStore, from: &IssueId, to: &IssueId) -> Result<AddOutcome> {
    if from == to {
        return Err(GraphError::SelfLoop(from.clone()));
    }

    let from_node = store.registered_index(from)?;
    let to_node = store.registered_index(to)?;

    // Duplicate check must come first, otherwise an existing edge could be
    // misreported as part of a cycle on a corrupted graph
    if store.graph().find_edge(from_node, to_node).is_some() {
        return Ok(AddOutcome::AlreadyExists);
    }

    if let Some(path) = shortest_path(store.graph(), to_node, from_node) {
        tracing::warn!(%from, %to, path_len = path.len(), "Rejected dependency: would create cycle");
        return Err(GraphError::CycleDetected {
            from: from.clone(),
            to: to.clone(),
            path,
        });
    }

    store.insert_edge(from, to)?;
    tracing::debug!(%from, %to, "Added dependency");
    Ok(AddOutcome::Added)
}

/// Check whether adding `from -> to` would close a cycle, without adding it.
///
/// Returns the offending path `to -> ... -> from`, or `None` if the edge is
/// safe. Self-loops are reported as the one-element path `[from]`.
///
/// # Errors
///
/// Returns `GraphError::UnknownNode` if either issue is not registered.
pub fn would_create_cycle(
    store: &GraphStore,
    from: &IssueId,
    to: &IssueId,
) -> Result<Option<Vec<IssueId>>> {
    let from_node = store.registered_index(from)?;
    let to_node = store.registered_index(to)?;
    Ok(shortest_path(store.graph(), to_node, from_node))
}

/// BFS along outgoing edges from `start` to `target`.
///
/// Returns the node IDs of the shortest path, both ends included.
pub(crate) fn shortest_path(
    graph: &StableDiGraph<IssueId, ()>,
    start: NodeIndex,
    target: NodeIndex,
) -> Option<Vec<IssueId>> {
    let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);
    let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    while let Some(current) = queue.pop_front() {
        if current == target {
            return Some(reconstruct_path(graph, target, &parent));
        }

        for edge in graph.edges(current) {
            let next = edge.target();
            if visited.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }

    None
}

fn reconstruct_path(
    graph: &StableDiGraph<IssueId, ()>,
    end: NodeIndex,
    parent: &HashMap<NodeIndex, NodeIndex>,
) -> Vec<IssueId> {
    let mut path = vec![graph[end].clone()];
    let mut cursor = end;
    while let Some(prev) = parent.get(&cursor) {
        path.push(graph[*prev].clone());
        cursor = *prev;
    }
    path.reverse();
    path
}

/// Find every cycle among registered issues.
///
/// Self-loops and dangling edges are ignored here; validation reports them
/// separately. Each strongly connected component with more than one issue
/// yields one closed path `[s, ..., s]` starting at its smallest ID.
#[must_use]
pub fn find_cycles(store: &GraphStore) -> Vec<Vec<IssueId>> {
    let source = store.graph();

    let mut dense: DiGraph<IssueId, ()> = DiGraph::new();
    let mut index_map: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    for vertex in source.node_indices() {
        if store.is_registered(vertex) {
            index_map.insert(vertex, dense.add_node(source[vertex].clone()));
        }
    }
    for edge in source.edge_indices() {
        let Some((a, b)) = source.edge_endpoints(edge) else {
            continue;
        };
        if a == b {
            continue;
        }
        if let (Some(x), Some(y)) = (index_map.get(&a), index_map.get(&b)) {
            dense.add_edge(*x, *y, ());
        }
    }

    let mut cycles: Vec<Vec<IssueId>> = tarjan_scc(&dense)
        .into_iter()
        .filter(|component| component.len() > 1)
        .filter_map(|component| closed_path(&dense, &component))
        .collect();

    cycles.sort_unstable();
    cycles
}

/// A closed walk through `component` that starts and ends at its smallest ID.
fn closed_path(
    graph: &DiGraph<IssueId, ()>,
    component: &[NodeIndex],
) -> Option<Vec<IssueId>> {
    let members: HashSet<_> = component.iter().copied().collect();
    let start = *component.iter().min_by(|a, b| graph[**a].cmp(&graph[**b]))?;

    let mut queue = VecDeque::from([start]);
    let mut visited = HashSet::from([start]);
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    while let Some(current) = queue.pop_front() {
        for next in graph.neighbors(current) {
            if next == start {
                // Walk parents back from `current` to `start`, then close the loop
                let mut path = vec![graph[current].clone()];
                let mut cursor = current;
                while let Some(prev) = parent.get(&cursor) {
                    path.push(graph[*prev].clone());
                    cursor = *prev;
                }
                path.reverse();
                path.push(graph[start].clone());
                return Some(path);
            }
            if members.contains(&next) && visited.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;

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
    fn adds_acyclic_edge() {
        let mut store = store_with(&["a", "b"]);
        let outcome = try_add_edge(&mut store, &id("a"), &id("b")).unwrap();
        assert_eq!(outcome, AddOutcome::Added);
        assert!(store.contains_edge(&id("a"), &id("b")));
    }

    #[test]
    fn duplicate_add_is_noop() {
        let mut store = store_with(&["a", "b"]);
        try_add_edge(&mut store, &id("a"), &id("b")).unwrap();
        let version = store.version();

        let outcome = try_add_edge(&mut store, &id("a"), &id("b")).unwrap();
        assert_eq!(outcome, AddOutcome::AlreadyExists);
        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.version(), version);
    }

    #[test]
    fn rejects_self_loop() {
        let mut store = store_with(&["a"]);
        assert!(matches!(
            try_add_edge(&mut store, &id("a"), &id("a")),
            Err(GraphError::SelfLoop(_))
        ));
    }

    #[test]
    fn rejects_unknown_endpoint() {
        let mut store = store_with(&["a"]);
        let err = try_add_edge(&mut store, &id("a"), &id("ghost")).unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(ref g) if g == &id("ghost")));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn reports_cycle_path_from_to_back_to_from() {
        let mut store = store_with(&["a", "b", "c"]);
        try_add_edge(&mut store, &id("a"), &id("b")).unwrap();
        try_add_edge(&mut store, &id("b"), &id("c")).unwrap();

        let err = try_add_edge(&mut store, &id("c"), &id("a")).unwrap_err();
        match err {
            GraphError::CycleDetected { from, to, path } => {
                assert_eq!(from, id("c"));
                assert_eq!(to, id("a"));
                assert_eq!(path, vec![id("a"), id("b"), id("c")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let ids: Vec<String> = (0..20_000).map(|i| format!("n{i}")).collect();
        let mut store = GraphStore::new();
        for s in &ids {
            store.add_node(Node::new(s.as_str())).unwrap();
        }
        for pair in ids.windows(2) {
            try_add_edge(&mut store, &id(&pair[0]), &id(&pair[1])).unwrap();
        }

        let last = id(&ids[ids.len() - 1]);
        let first = id(&ids[0]);
        let path = would_create_cycle(&store, &last, &first).unwrap().unwrap();
        assert_eq!(path.len(), ids.len());
    }

    #[test]
    fn find_cycles_on_clean_graph_is_empty() {
        let mut store = store_with(&["a", "b", "c"]);
        try_add_edge(&mut store, &id("a"), &id("b")).unwrap();
        try_add_edge(&mut store, &id("b"), &id("c")).unwrap();
        assert!(find_cycles(&store).is_empty());
    }

    #[test]
    fn find_cycles_reports_closed_path() {
        let mut store = store_with(&["a", "b", "c", "d"]);
        store.insert_edge_unchecked(&id("b"), &id("c"));
        store.insert_edge_unchecked(&id("c"), &id("d"));
        store.insert_edge_unchecked(&id("d"), &id("b"));
        store.insert_edge_unchecked(&id("a"), &id("b"));

        let cycles = find_cycles(&store);
        assert_eq!(cycles, vec![vec![id("b"), id("c"), id("d"), id("b")]]);
    }

    #[test]
    fn find_cycles_ignores_self_loops() {
        let mut store = store_with(&["a"]);
        store.insert_edge_unchecked(&id("a"), &id("a"));
        assert!(find_cycles(&store).is_empty());
    }

    #[test]
    fn guard_follows_dangling_edges() {
        let mut store = store_with(&["a", "b"]);
        store.insert_edge_unchecked(&id("a"), &id("ghost"));
        store.insert_edge_unchecked(&id("ghost"), &id("b"));

        let err = try_add_edge(&mut store, &id("b"), &id("a")).unwrap_err();
        match err {
            GraphError::CycleDetected { path, .. } => {
                assert_eq!(path, vec![id("a"), id("ghost"), id("b")]);
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
        assert!(!store.contains_edge(&id("b"), &id("a")));
    }
}
