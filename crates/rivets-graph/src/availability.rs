//! Derived availability of an issue.
//!
//! Availability is a pure function of an issue's own lifecycle state and the
//! states of its direct dependencies. It is recomputed on every query and
//! never stored, so it cannot go stale when edges or states change.

use crate::config::RejectedPolicy;
use crate::domain::{IssueId, LifecycleState, Node};
use crate::error::{GraphError, Result};
use crate::store::GraphStore;
use petgraph::Direction;

/// Whether an issue can be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Every direct dependency is resolved
    Ready,

    /// At least one direct dependency is unresolved
    Blocked {
        /// Unresolved direct dependencies with their current states, by ID
        blocking: Vec<(IssueId, LifecycleState)>,
    },

    /// The issue itself is done
    Complete,

    /// The issue itself is rejected
    Rejected,
}

impl Availability {
    /// Whether the issue can be started now.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether the issue is waiting on dependencies.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// The unresolved dependencies, empty unless blocked.
    #[must_use]
    pub fn blocking(&self) -> &[(IssueId, LifecycleState)] {
        match self {
            Self::Blocked { blocking } => blocking,
            _ => &[],
        }
    }
}

/// Compute the availability of a registered issue.
///
/// # Errors
///
/// Returns `GraphError::UnknownNode` if the issue is not registered.
pub fn availability(store: &GraphStore, id: &IssueId, policy: RejectedPolicy) -> Result<Availability> {
    let node = store
        .node(id)
        .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
    Ok(resolve(store, node, policy))
}

/// Resolve availability for a record known to be registered.
///
/// Dangling dependencies (no registered record) are skipped; validation is
/// responsible for reporting them.
pub(crate) fn resolve(store: &GraphStore, node: &Node, policy: RejectedPolicy) -> Availability {
    match node.state {
        LifecycleState::Done => return Availability::Complete,
        LifecycleState::Rejected => return Availability::Rejected,
        LifecycleState::Backlog | LifecycleState::InProgress => {}
    }

    let Ok(index) = store.registered_index(&node.id) else {
        return Availability::Ready;
    };

    let blocking: Vec<(IssueId, LifecycleState)> = store
        .registered_neighbors(index, Direction::Outgoing)
        .into_iter()
        .filter_map(|dep| {
            let dep_id = &store.graph()[dep];
            let state = store.state(dep_id)?;
            (!is_resolved(state, policy)).then(|| (dep_id.clone(), state))
        })
        .collect();

    if blocking.is_empty() {
        Availability::Ready
    } else {
        Availability::Blocked { blocking }
    }
}

/// Whether a dependency in `state` no longer holds up its dependents.
pub(crate) fn is_resolved(state: LifecycleState, policy: RejectedPolicy) -> bool {
    match state {
        LifecycleState::Done => true,
        LifecycleState::Rejected => policy == RejectedPolicy::Satisfies,
        LifecycleState::Backlog | LifecycleState::InProgress => false,
    }
}
