//! Breadth-first walks over the dependency graph.
//!
//! This module backs the structural queries:
//! - Dependency trees (outgoing edges) and downstream trees (incoming edges)
//! - Root detection
//! - Blocked and ready issue listings
//!
//! # Edge Direction Reminder
//!
//! Edges point from **dependent -> dependency**. Walking
//! [`Direction::Dependencies`] follows outgoing edges; walking
//! [`Direction::Dependents`] follows incoming edges.

use crate::availability::{resolve, Availability};
use crate::cancel::CancelToken;
use crate::config::RejectedPolicy;
use crate::domain::{IssueId, LifecycleState};
use crate::error::Result;
use crate::store::GraphStore;
use petgraph::stable_graph::NodeIndex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Which way a walk follows edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Follow outgoing edges: what the start issue depends on
    Dependencies,
    /// Follow incoming edges: what depends on the start issue
    Dependents,
}

impl Direction {
    fn as_petgraph(self) -> petgraph::Direction {
        match self {
            Self::Dependencies => petgraph::Direction::Outgoing,
            Self::Dependents => petgraph::Direction::Incoming,
        }
    }
}

/// The edge through which a walk first reached an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEdge {
    /// Issue the walk came from
    pub parent: IssueId,
    /// Issue reached
    pub node: IssueId,
    /// Hops from the start issue (1 for direct neighbours)
    pub depth: usize,
}

/// Result of a bounded or unbounded walk.
///
/// `tree` lists each reached issue exactly once, in breadth-first discovery
/// order, attached to the parent it was first discovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Traversal {
    /// Where the walk started
    pub root: IssueId,
    /// Which way it went
    pub direction: Direction,
    /// Discovery edges in BFS order
    pub tree: Vec<TreeEdge>,
    /// Reached issues whose state is `done`
    pub done_count: usize,
    /// Number of reached issues
    pub total: usize,
}

impl Traversal {
    /// Reached issues in discovery order.
    pub fn reached(&self) -> impl Iterator<Item = &IssueId> {
        self.tree.iter().map(|edge| &edge.node)
    }

    /// Whether the walk reached `id`.
    #[must_use]
    pub fn contains(&self, id: &IssueId) -> bool {
        self.tree.iter().any(|edge| &edge.node == id)
    }

    /// Issues first discovered from `parent`, for tree rendering.
    #[must_use]
    pub fn children_of(&self, parent: &IssueId) -> Vec<&IssueId> {
        self.tree
            .iter()
            .filter(|edge| &edge.parent == parent)
            .map(|edge| &edge.node)
            .collect()
    }

    /// Deepest level reached, 0 if nothing was reached.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.tree.iter().map(|edge| edge.depth).max().unwrap_or(0)
    }
}

/// Walk from `root` in `direction`, up to `depth` hops.
///
/// `depth == 0` means unbounded (full transitive closure); `depth == 1`
/// returns direct neighbours only. Dangling edges are not followed.
///
/// # Errors
///
/// - `GraphError::UnknownNode` if `root` is not registered
/// - `GraphError::Cancelled` if `cancel` fires during the walk
pub fn walk(
    store: &GraphStore,
    root: &IssueId,
    direction: Direction,
    depth: usize,
    cancel: &CancelToken,
) -> Result<Traversal> {
    let start_node = store.registered_index(root)?;
    let max_depth = (depth > 0).then_some(depth);

    let mut tree = Vec::new();
    let mut visited: HashSet<NodeIndex> = HashSet::from([start_node]);
    let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(start_node, 0)]);
    let mut step = 0;

    while let Some((current, current_depth)) = queue.pop_front() {
        cancel.checkpoint(step, tree.len())?;
        step += 1;

        if max_depth.is_some_and(|max| current_depth >= max) {
            continue;
        }

        for next in store.registered_neighbors(current, direction.as_petgraph()) {
            if visited.insert(next) {
                let next_depth = current_depth + 1;
                tree.push(TreeEdge {
                    parent: store.graph()[current].clone(),
                    node: store.graph()[next].clone(),
                    depth: next_depth,
                });
                queue.push_back((next, next_depth));
            }
        }
    }

    let done_count = tree
        .iter()
        .filter(|edge| store.state(&edge.node) == Some(LifecycleState::Done))
        .count();
    let total = tree.len();

    tracing::trace!(%root, ?direction, depth, total, done_count, "Walk complete");

    Ok(Traversal {
        root: root.clone(),
        direction,
        tree,
        done_count,
        total,
    })
}

/// Issues with no dependencies on registered issues, sorted by ID.
///
/// Dangling edges do not count, matching how availability ignores them.
/// [`GraphStore::outgoing`] still lists them, so an issue whose only edge
/// is dangling is a root even though its outgoing set is not empty.
#[must_use]
pub fn roots(store: &GraphStore) -> Vec<IssueId> {
    store
        .node_ids()
        .into_iter()
        .filter(|id| {
            store.registered_index(id).is_ok_and(|index| {
                store
                    .registered_neighbors(index, petgraph::Direction::Outgoing)
                    .is_empty()
            })
        })
        .collect()
}

/// Roots that are not already done or rejected: immediately startable.
#[must_use]
pub fn startable_roots(store: &GraphStore) -> Vec<IssueId> {
    roots(store)
        .into_iter()
        .filter(|id| store.state(id).is_some_and(|state| !state.is_terminal()))
        .collect()
}

/// A blocked issue and the direct dependencies holding it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedIssue {
    /// The blocked issue
    pub id: IssueId,
    /// Unresolved direct dependencies and their states
    pub blocking: Vec<(IssueId, LifecycleState)>,
}

/// Every blocked issue with its blockers, sorted by ID.
#[must_use]
pub fn blocked(store: &GraphStore, policy: RejectedPolicy) -> Vec<BlockedIssue> {
    store
        .node_ids()
        .into_iter()
        .filter_map(|id| {
            let node = store.node(&id)?;
            match resolve(store, node, policy) {
                Availability::Blocked { blocking } => Some(BlockedIssue { id, blocking }),
                _ => None,
            }
        })
        .collect()
}

/// Every issue whose availability is ready, sorted by ID.
#[must_use]
pub fn ready(store: &GraphStore, policy: RejectedPolicy) -> Vec<IssueId> {
    store
        .node_ids()
        .into_iter()
        .filter(|id| {
            store
                .node(id)
                .is_some_and(|node| resolve(store, node, policy).is_ready())
        })
        .collect()
}
