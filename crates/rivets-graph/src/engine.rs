//! The owned, thread-safe dependency graph facade.
//!
//! [`DependencyGraph`] is the single entry point callers hold. It wraps a
//! [`GraphStore`] and routes every operation through the cycle guard,
//! traversal, availability, reduction and validation modules.
//!
//! # Thread Safety
//!
//! The current store version lives in `RwLock<Arc<GraphStore>>`:
//!
//! - **Reads** take the read lock just long enough to clone the `Arc`, then
//!   run against that version with no lock held. A long traversal never
//!   blocks writers and never observes a half-applied mutation.
//! - **Mutations** hold the write lock for the whole check-then-commit
//!   sequence and edit through [`Arc::make_mut`]. The store is only cloned
//!   when a reader still holds the previous version.
//!
//! Two concurrent `add_dependency` calls in opposite directions are therefore
//! serialized: exactly one succeeds and the other sees its edge and reports
//! `CycleDetected`.

use crate::availability::{self, Availability};
use crate::cancel::CancelToken;
use crate::config::GraphConfig;
use crate::cycle::{self, AddOutcome};
use crate::domain::{Edge, IssueId, LifecycleState, Node};
use crate::error::{GraphError, Result};
use crate::reduction::{self, RedundantEdge};
use crate::snapshot::{self, GraphExport, GraphSnapshot, SnapshotSource};
use crate::store::GraphStore;
use crate::traversal::{self, BlockedIssue, Direction, Traversal};
use crate::validation::{self, ValidationReport};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// Outcome of adding several dependencies to one issue.
///
/// Each target is attempted independently; one failure does not stop the
/// others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkAddResult {
    /// Dependencies that were added
    pub added: Vec<IssueId>,
    /// Dependencies that already existed
    pub already_exist: Vec<IssueId>,
    /// Dependencies that were refused, with the reason
    pub errors: Vec<(IssueId, String)>,
}

impl BulkAddResult {
    /// Whether every target was added or already present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of removing several dependencies from one issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkRemoveResult {
    /// Dependencies that were removed
    pub removed: Vec<IssueId>,
    /// Dependencies that did not exist
    pub not_found: Vec<IssueId>,
}

/// A dependency graph shared by concurrent callers.
///
/// Construct one per project and pass it around (usually inside an `Arc`).
#[derive(Debug)]
pub struct DependencyGraph {
    current: RwLock<Arc<GraphStore>>,
    config: GraphConfig,
}

impl DependencyGraph {
    /// An empty graph.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` if `config` is invalid.
    pub fn new(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_store(GraphStore::new(), config))
    }

    /// A graph restored from `snapshot` without per-edge checks.
    ///
    /// Call [`validate`](Self::validate) afterwards to find anything the
    /// snapshot smuggled in.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Config` if `config` is invalid.
    pub fn from_snapshot(snapshot: &GraphSnapshot, config: GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_store(snapshot::restore(snapshot), config))
    }

    /// A graph loaded from a persistence collaborator.
    ///
    /// # Errors
    ///
    /// - `GraphError::Config` if `config` is invalid
    /// - whatever `source.load()` returns
    pub fn from_source(source: &dyn SnapshotSource, config: GraphConfig) -> Result<Self> {
        config.validate()?;
        let snapshot = source.load()?;
        tracing::info!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "Loading dependency graph"
        );
        Self::from_snapshot(&snapshot, config)
    }

    fn with_store(store: GraphStore, config: GraphConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(store)),
            config,
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// The current store version.
    ///
    /// The returned handle is immutable and unaffected by later mutations.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn store(&self) -> Result<Arc<GraphStore>> {
        let guard = self.current.read().map_err(|_| GraphError::Poisoned)?;
        Ok(Arc::clone(&*guard))
    }

    /// Mutation counter of the current store version.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn version(&self) -> Result<u64> {
        Ok(self.store()?.version())
    }

    /// Run `op` against the current store under the write lock.
    ///
    /// If `op` fails the store is left as it was: every mutation in this
    /// crate validates before it changes anything.
    fn mutate<T>(&self, op: impl FnOnce(&mut GraphStore) -> Result<T>) -> Result<T> {
        let mut guard = self.current.write().map_err(|_| GraphError::Poisoned)?;
        op(Arc::make_mut(&mut *guard))
    }

    // === Nodes ===

    /// Register an issue.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::DuplicateNode` if the ID is already registered.
    pub fn add_node(&self, node: impl Into<Node>) -> Result<()> {
        let node = node.into();
        self.mutate(|store| store.add_node(node))
    }

    /// Unregister an issue.
    ///
    /// Without `cascade` the issue must have no edges. With `cascade` its
    /// edges are removed too and returned.
    ///
    /// # Errors
    ///
    /// - `GraphError::UnknownNode` if the issue is not registered
    /// - `GraphError::NodeInUse` if it has edges and `cascade` is false
    pub fn remove_node(&self, id: &IssueId, cascade: bool) -> Result<Vec<Edge>> {
        self.mutate(|store| store.remove_node(id, cascade))
    }

    /// Move an issue to a new lifecycle state, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if the issue is not registered.
    pub fn set_state(&self, id: &IssueId, state: LifecycleState) -> Result<LifecycleState> {
        let previous = self.mutate(|store| store.set_state(id, state))?;
        tracing::debug!(%id, from = %previous, to = %state, "State changed");
        Ok(previous)
    }

    // === Edges ===

    /// Record that `from` depends on `to`.
    ///
    /// # Errors
    ///
    /// - `GraphError::SelfLoop` if `from == to`
    /// - `GraphError::UnknownNode` if either issue is not registered
    /// - `GraphError::CycleDetected` if the edge would close a cycle
    pub fn add_dependency(&self, from: &IssueId, to: &IssueId) -> Result<AddOutcome> {
        self.mutate(|store| cycle::try_add_edge(store, from, to))
    }

    /// Add several dependencies of `from` under one write lock.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked. Per-target
    /// failures are collected in the result instead.
    pub fn add_dependencies(&self, from: &IssueId, targets: &[IssueId]) -> Result<BulkAddResult> {
        self.mutate(|store| {
            let mut result = BulkAddResult::default();
            for to in targets {
                match cycle::try_add_edge(store, from, to) {
                    Ok(AddOutcome::Added) => result.added.push(to.clone()),
                    Ok(AddOutcome::AlreadyExists) => result.already_exist.push(to.clone()),
                    Err(e) => result.errors.push((to.clone(), e.to_string())),
                }
            }
            Ok(result)
        })
    }

    /// Drop the dependency `from -> to`.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::EdgeNotFound` if the edge does not exist.
    pub fn remove_dependency(&self, from: &IssueId, to: &IssueId) -> Result<()> {
        self.mutate(|store| store.remove_edge(from, to))?;
        tracing::debug!(%from, %to, "Removed dependency");
        Ok(())
    }

    /// Drop several dependencies of `from` under one write lock.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn remove_dependencies(
        &self,
        from: &IssueId,
        targets: &[IssueId],
    ) -> Result<BulkRemoveResult> {
        self.mutate(|store| {
            let mut result = BulkRemoveResult::default();
            for to in targets {
                match store.remove_edge(from, to) {
                    Ok(()) => result.removed.push(to.clone()),
                    Err(_) => result.not_found.push(to.clone()),
                }
            }
            Ok(result)
        })
    }

    /// Whether `from -> to` could be added without closing a cycle.
    ///
    /// Returns the would-be cycle path `to -> ... -> from` if not.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if either issue is not registered.
    pub fn would_create_cycle(&self, from: &IssueId, to: &IssueId) -> Result<Option<Vec<IssueId>>> {
        cycle::would_create_cycle(&*self.store()?, from, to)
    }

    // === Traversal ===

    /// Everything `id` depends on, up to `depth` hops (0 = unbounded).
    ///
    /// Uses the configured default timeout, if any.
    ///
    /// # Errors
    ///
    /// - `GraphError::UnknownNode` if the issue is not registered
    /// - `GraphError::Cancelled` if the configured timeout elapses
    pub fn query_deps(&self, id: &IssueId, depth: usize) -> Result<Traversal> {
        self.query_deps_with(id, depth, &self.config.default_cancel_token())
    }

    /// [`query_deps`](Self::query_deps) with an explicit cancellation token.
    ///
    /// # Errors
    ///
    /// - `GraphError::UnknownNode` if the issue is not registered
    /// - `GraphError::Cancelled` if `cancel` fires
    pub fn query_deps_with(
        &self,
        id: &IssueId,
        depth: usize,
        cancel: &CancelToken,
    ) -> Result<Traversal> {
        traversal::walk(&*self.store()?, id, Direction::Dependencies, depth, cancel)
    }

    /// Everything that depends on `id`, up to `depth` hops (0 = unbounded).
    ///
    /// # Errors
    ///
    /// - `GraphError::UnknownNode` if the issue is not registered
    /// - `GraphError::Cancelled` if the configured timeout elapses
    pub fn query_downstream(&self, id: &IssueId, depth: usize) -> Result<Traversal> {
        self.query_downstream_with(id, depth, &self.config.default_cancel_token())
    }

    /// [`query_downstream`](Self::query_downstream) with an explicit
    /// cancellation token.
    ///
    /// # Errors
    ///
    /// - `GraphError::UnknownNode` if the issue is not registered
    /// - `GraphError::Cancelled` if `cancel` fires
    pub fn query_downstream_with(
        &self,
        id: &IssueId,
        depth: usize,
        cancel: &CancelToken,
    ) -> Result<Traversal> {
        traversal::walk(&*self.store()?, id, Direction::Dependents, depth, cancel)
    }

    /// Issues with no dependencies, sorted by ID.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn query_roots(&self) -> Result<Vec<IssueId>> {
        Ok(traversal::roots(&*self.store()?))
    }

    /// Roots that are neither done nor rejected.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn query_startable_roots(&self) -> Result<Vec<IssueId>> {
        Ok(traversal::startable_roots(&*self.store()?))
    }

    // === Availability ===

    /// Blocked issues with the dependencies holding them up.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn query_blocked(&self) -> Result<Vec<BlockedIssue>> {
        Ok(traversal::blocked(
            &*self.store()?,
            self.config.rejected_dependency,
        ))
    }

    /// Issues that can be started now.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn query_ready(&self) -> Result<Vec<IssueId>> {
        Ok(traversal::ready(&*self.store()?, self.config.rejected_dependency))
    }

    /// Derived availability of one issue.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if the issue is not registered.
    pub fn availability(&self, id: &IssueId) -> Result<Availability> {
        availability::availability(&*self.store()?, id, self.config.rejected_dependency)
    }

    // === Analysis ===

    /// Edges implied by other paths. Nothing is removed.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Cancelled` if the configured timeout elapses.
    pub fn compute_redundant_edges(&self) -> Result<Vec<RedundantEdge>> {
        self.compute_redundant_edges_with(&self.config.default_cancel_token())
    }

    /// [`compute_redundant_edges`](Self::compute_redundant_edges) with an
    /// explicit cancellation token.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Cancelled` if `cancel` fires.
    pub fn compute_redundant_edges_with(&self, cancel: &CancelToken) -> Result<Vec<RedundantEdge>> {
        reduction::redundant_edges(&*self.store()?, cancel)
    }

    /// Whether `to` is reachable from `from` other than through a direct edge.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if either issue is not registered.
    pub fn is_transitive(&self, from: &IssueId, to: &IssueId) -> Result<bool> {
        reduction::is_transitive(&*self.store()?, from, to)
    }

    /// The direct dependencies of `id` left after transitive reduction.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if the issue is not registered.
    pub fn reduced_dependencies(&self, id: &IssueId) -> Result<BTreeSet<IssueId>> {
        reduction::reduced_dependencies(&*self.store()?, id)
    }

    /// Sweep for cycles, dangling edges and self-loops.
    ///
    /// With `fix`, dangling edges and self-loops are removed atomically with
    /// the sweep. Without it the graph is only read.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn validate(&self, fix: bool) -> Result<ValidationReport> {
        if fix {
            self.mutate(|store| Ok(validation::validate(store, true)))
        } else {
            Ok(validation::inspect(&*self.store()?))
        }
    }

    // === Collaborators ===

    /// The rendering view of the current graph.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn export(&self) -> Result<GraphExport> {
        Ok(snapshot::export(&*self.store()?))
    }

    /// Every node and edge of the current graph.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn snapshot(&self) -> Result<GraphSnapshot> {
        Ok(snapshot::capture(&*self.store()?))
    }

    /// Hand the current graph to a persistence collaborator.
    ///
    /// # Errors
    ///
    /// Returns whatever `sink.save()` returns.
    pub fn save_to(&self, sink: &mut dyn SnapshotSource) -> Result<()> {
        let snapshot = self.snapshot()?;
        sink.save(&snapshot)?;
        tracing::info!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "Saved dependency graph"
        );
        Ok(())
    }

    /// Replace the whole graph with the contents of `snapshot`.
    ///
    /// Readers holding the old version keep it; new reads see the restored
    /// graph.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Poisoned` if a writer panicked.
    pub fn restore(&self, snapshot: &GraphSnapshot) -> Result<()> {
        let mut restored = snapshot::restore(snapshot);
        let mut guard = self.current.write().map_err(|_| GraphError::Poisoned)?;
        restored.continue_from(guard.version());
        *guard = Arc::new(restored);
        Ok(())
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::with_store(GraphStore::new(), GraphConfig::default())
    }
}
