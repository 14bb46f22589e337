//! Error types for dependency graph operations.
//!
//! Every mutation error is returned before anything is written, so a failed
//! call leaves the graph exactly as it was. Integrity problems found by
//! [`validate`](crate::DependencyGraph::validate) are not errors; they are
//! reported as [`Violation`](crate::Violation)s.

use crate::domain::IssueId;
use std::io;
use thiserror::Error;

/// The error type for dependency graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Adding the edge would close a cycle.
    ///
    /// `path` is the existing route `to -> ... -> from` that the new edge
    /// would have turned into a loop.
    #[error("Circular dependency: {from} -> {to} would close the cycle {}", format_path(.path))]
    CycleDetected {
        /// The issue that would have gained the dependency
        from: IssueId,
        /// The issue it would have depended on
        to: IssueId,
        /// Existing path from `to` back to `from`
        path: Vec<IssueId>,
    },

    /// An issue cannot depend on itself.
    #[error("Issue cannot depend on itself: {0}")]
    SelfLoop(IssueId),

    /// The referenced issue is not registered in the graph.
    #[error("Issue not found: {0}")]
    UnknownNode(IssueId),

    /// An issue with this ID is already registered.
    #[error("Issue already exists: {0}")]
    DuplicateNode(IssueId),

    /// Removal of a dependency that does not exist.
    #[error("Dependency not found: {from} -> {to}")]
    EdgeNotFound {
        /// Dependent side of the missing edge
        from: IssueId,
        /// Dependency side of the missing edge
        to: IssueId,
    },

    /// Removal of an issue that still has incident edges, without cascade.
    #[error(
        "Cannot remove {issue_id}: {} dependent(s) and {} dependency(ies) still reference it",
        .dependents.len(),
        .dependencies.len()
    )]
    NodeInUse {
        /// The issue that was asked to be removed
        issue_id: IssueId,
        /// Issues that depend on it
        dependents: Vec<IssueId>,
        /// Issues it depends on
        dependencies: Vec<IssueId>,
    },

    /// A traversal was cancelled or ran past its deadline.
    #[error("Traversal cancelled after reaching {reached} issue(s)")]
    Cancelled {
        /// Number of issues reached before the walk stopped
        reached: usize,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persistence collaborator failed to load or save a snapshot.
    #[error("Snapshot source error: {0}")]
    Source(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A thread panicked while holding the graph lock.
    #[error("Graph lock poisoned")]
    Poisoned,
}

fn format_path(path: &[IssueId]) -> String {
    path.iter()
        .map(IssueId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A specialized Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
