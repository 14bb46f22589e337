//! Transitive reduction analysis.
//!
//! An edge `u -> v` is redundant when `v` is still reachable from `u` through
//! one of `u`'s other direct dependencies. Such edges add no ordering
//! constraint, but callers may keep them on purpose for documentation, so
//! this module only reports candidates and never removes anything.

use crate::cancel::CancelToken;
use crate::domain::IssueId;
use crate::error::Result;
use crate::store::GraphStore;
use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// An edge implied by other edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedundantEdge {
    /// Dependent side
    pub from: IssueId,
    /// Dependency side
    pub to: IssueId,
    /// Shortest alternative path `from -> ... -> to` that avoids the edge
    pub via: Vec<IssueId>,
}

/// Find every redundant edge, sorted by `(from, to)`.
///
/// For each issue `u`, the transitive closures of its direct dependencies
/// are computed once; a dependency `v` is redundant if it appears in the
/// closure of any sibling.
///
/// # Errors
///
/// Returns `GraphError::Cancelled` if `cancel` fires.
pub fn redundant_edges(store: &GraphStore, cancel: &CancelToken) -> Result<Vec<RedundantEdge>> {
    let mut found = Vec::new();
    let mut step = 0;

    for id in store.node_ids() {
        let u = store.registered_index(&id)?;
        let successors = direct_dependencies(store, u);
        if successors.len() < 2 {
            continue;
        }

        let mut closures: HashMap<NodeIndex, HashSet<NodeIndex>> = HashMap::new();
        for w in &successors {
            closures.insert(*w, closure(store, *w, cancel, &mut step)?);
        }

        for v in &successors {
            let implied = successors
                .iter()
                .any(|w| w != v && closures[w].contains(v));
            if !implied {
                continue;
            }
            let via = alternative_path(store, u, *v).unwrap_or_default();
            tracing::debug!(from = %id, to = %store.graph()[*v], "Redundant dependency");
            found.push(RedundantEdge {
                from: id.clone(),
                to: store.graph()[*v].clone(),
                via,
            });
        }
    }

    Ok(found)
}

/// Whether `to` is reachable from `from` without using the direct edge.
///
/// # Errors
///
/// Returns `GraphError::UnknownNode` if either issue is not registered.
pub fn is_transitive(store: &GraphStore, from: &IssueId, to: &IssueId) -> Result<bool> {
    let a = store.registered_index(from)?;
    let b = store.registered_index(to)?;
    Ok(alternative_path(store, a, b).is_some())
}

/// The minimal set of direct dependencies of `id` with the same reachability.
///
/// # Errors
///
/// Returns `GraphError::UnknownNode` if the issue is not registered.
pub fn reduced_dependencies(store: &GraphStore, id: &IssueId) -> Result<BTreeSet<IssueId>> {
    let u = store.registered_index(id)?;
    let successors = direct_dependencies(store, u);
    let cancel = CancelToken::new();
    let mut step = 0;

    let mut closures: HashMap<NodeIndex, HashSet<NodeIndex>> = HashMap::new();
    for w in &successors {
        closures.insert(*w, closure(store, *w, &cancel, &mut step)?);
    }

    Ok(successors
        .iter()
        .filter(|v| !successors.iter().any(|w| w != *v && closures[w].contains(*v)))
        .map(|v| store.graph()[*v].clone())
        .collect())
}

/// Registered direct dependencies of `u`, self-loops excluded.
fn direct_dependencies(store: &GraphStore, u: NodeIndex) -> Vec<NodeIndex> {
    store
        .registered_neighbors(u, Direction::Outgoing)
        .into_iter()
        .filter(|w| *w != u)
        .collect()
}

/// Everything reachable from `start` through at least one edge.
///
/// On cancellation, `reached` counts the issues this closure had visited.
fn closure(
    store: &GraphStore,
    start: NodeIndex,
    cancel: &CancelToken,
    step: &mut usize,
) -> Result<HashSet<NodeIndex>> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        cancel.checkpoint(*step, seen.len())?;
        *step += 1;

        for next in store.registered_neighbors(current, Direction::Outgoing) {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }

    Ok(seen)
}

/// Shortest path `from -> ... -> to` that skips the direct edge.
fn alternative_path(store: &GraphStore, from: NodeIndex, to: NodeIndex) -> Option<Vec<IssueId>> {
    let mut queue = VecDeque::from([from]);
    let mut visited = HashSet::from([from]);
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    while let Some(current) = queue.pop_front() {
        for next in store.registered_neighbors(current, Direction::Outgoing) {
            if current == from && next == to {
                continue;
            }
            if next == to {
                let mut path = vec![store.graph()[to].clone()];
                let mut cursor = current;
                path.push(store.graph()[cursor].clone());
                while let Some(prev) = parent.get(&cursor) {
                    path.push(store.graph()[*prev].clone());
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            if visited.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }

    None
}
