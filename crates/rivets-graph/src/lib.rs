//! Rivets graph - the dependency graph engine behind rivets issue tracking.
//!
//! Issues are linked by directed "depends on" edges that must always form a
//! directed acyclic graph. This crate owns that graph and answers the
//! structural questions asked of it:
//!
//! - **Mutation** with cycle prevention ([`DependencyGraph::add_dependency`])
//! - **Availability** of an issue, derived on demand ([`availability`])
//! - **Traversal** of dependencies and dependents, bounded or unbounded
//! - **Roots** and **blocked** queries
//! - **Transitive reduction** analysis ([`reduction`])
//! - **Integrity validation** with safe auto-repair ([`validation`])
//!
//! Issue metadata, persistence formats and rendering live elsewhere. The
//! engine consumes a minimal node/edge store and talks to the outside world
//! through [`GraphSnapshot`] and [`GraphExport`].
//!
//! # Edge Direction
//!
//! Edges point from **dependent -> dependency**: an edge `A -> B` means A
//! cannot start until B is done. "Outgoing" edges of a node are therefore its
//! dependencies and "incoming" edges are its dependents.
//!
//! # Example
//!
//! ```
//! use rivets_graph::{DependencyGraph, GraphConfig, IssueId, LifecycleState};
//!
//! # fn main() -> rivets_graph::Result<()> {
//! let graph = DependencyGraph::new(GraphConfig::default())?;
//! graph.add_node("api")?;
//! graph.add_node("schema")?;
//! graph.add_dependency(&IssueId::new("api"), &IssueId::new("schema"))?;
//!
//! let blocked = graph.query_blocked()?;
//! assert_eq!(blocked.len(), 1);
//! assert_eq!(blocked[0].id, IssueId::new("api"));
//!
//! graph.set_state(&IssueId::new("schema"), LifecycleState::Done)?;
//! assert!(graph.query_blocked()?.is_empty());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod availability;
pub mod cancel;
pub mod config;
pub mod cycle;
pub mod domain;
pub mod engine;
pub mod error;
pub mod reduction;
pub mod snapshot;
pub mod store;
pub mod traversal;
pub mod validation;

pub use availability::Availability;
pub use cancel::CancelToken;
pub use config::{GraphConfig, RejectedPolicy};
pub use cycle::AddOutcome;
pub use domain::{Edge, IssueId, LifecycleState, Node};
pub use engine::{BulkAddResult, BulkRemoveResult, DependencyGraph};
pub use error::{GraphError, Result};
pub use reduction::RedundantEdge;
pub use snapshot::{ExportNode, GraphExport, GraphSnapshot, InMemorySource, SnapshotSource};
pub use store::GraphStore;
pub use traversal::{BlockedIssue, Direction, Traversal, TreeEdge};
pub use validation::{ValidationReport, Violation};
