//! Whole-graph integrity validation.
//!
//! Per-edge checks in [`cycle`](crate::cycle) keep a graph built through the
//! API clean. Snapshots restored in bulk skip those checks, so this module
//! re-verifies everything from scratch:
//!
//! - **Cycles**: global acyclicity, independent of the per-edge guard
//! - **Dangling edges**: an endpoint has no registered issue
//! - **Self-loops**: an issue depending on itself
//!
//! Dangling edges and self-loops have exactly one sensible repair (drop the
//! edge), so `fix` applies it. Cycles are only reported: which edge to drop
//! is a decision about the work itself.

use crate::cycle::find_cycles;
use crate::domain::{Edge, IssueId};
use crate::store::GraphStore;
use serde::Serialize;

/// A single integrity problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A closed path `[s, ..., s]`
    Cycle {
        /// Issues along the cycle, first repeated at the end
        path: Vec<IssueId>,
    },

    /// An edge whose endpoint is not a registered issue
    DanglingEdge {
        /// The offending edge
        edge: Edge,
    },

    /// An issue that depends on itself
    SelfLoop {
        /// The issue
        node: IssueId,
    },
}

/// Outcome of a validation sweep.
///
/// The violation lists describe what was found; `fixed` lists the edges
/// removed when repair was requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Cycles, each as a closed path
    pub cycles: Vec<Vec<IssueId>>,
    /// Edges referencing a missing issue
    pub dangling: Vec<Edge>,
    /// Issues with an edge to themselves
    pub self_loops: Vec<IssueId>,
    /// Edges removed by auto-repair
    pub fixed: Vec<Edge>,
}

impl ValidationReport {
    /// Whether the sweep found nothing at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.dangling.is_empty() && self.self_loops.is_empty()
    }

    /// Whether problems remain after any repair that was applied.
    ///
    /// Cycles always remain; dangling edges and self-loops remain unless
    /// they were fixed.
    #[must_use]
    pub fn has_unresolved(&self) -> bool {
        let fixable = self.dangling.len() + self.self_loops.len();
        !self.cycles.is_empty() || fixable > self.fixed.len()
    }

    /// Every violation as a flat list.
    #[must_use]
    pub fn violations(&self) -> Vec<Violation> {
        let cycles = self
            .cycles
            .iter()
            .map(|path| Violation::Cycle { path: path.clone() });
        let dangling = self
            .dangling
            .iter()
            .map(|edge| Violation::DanglingEdge { edge: edge.clone() });
        let self_loops = self
            .self_loops
            .iter()
            .map(|node| Violation::SelfLoop { node: node.clone() });
        cycles.chain(dangling).chain(self_loops).collect()
    }
}

/// Sweep the store without changing it.
#[must_use]
pub fn inspect(store: &GraphStore) -> ValidationReport {
    let mut report = ValidationReport {
        cycles: find_cycles(store),
        ..ValidationReport::default()
    };

    for edge in store.edges() {
        if !store.has_node(&edge.from) || !store.has_node(&edge.to) {
            report.dangling.push(edge);
        } else if edge.is_self_loop() {
            report.self_loops.push(edge.from);
        }
    }

    for path in &report.cycles {
        tracing::warn!(cycle = ?path, "Integrity violation: dependency cycle");
    }
    if !report.dangling.is_empty() || !report.self_loops.is_empty() {
        tracing::warn!(
            dangling = report.dangling.len(),
            self_loops = report.self_loops.len(),
            "Integrity violations found"
        );
    }

    report
}

/// Sweep the store and, if `fix` is set, remove dangling edges and
/// self-loops.
pub fn validate(store: &mut GraphStore, fix: bool) -> ValidationReport {
    let mut report = inspect(store);
    if !fix {
        return report;
    }

    let repairs: Vec<Edge> = report
        .dangling
        .iter()
        .cloned()
        .chain(
            report
                .self_loops
                .iter()
                .map(|node| Edge::new(node.clone(), node.clone())),
        )
        .collect();

    for edge in repairs {
        if store.remove_edge(&edge.from, &edge.to).is_ok() {
            tracing::info!(%edge, "Removed invalid edge");
            report.fixed.push(edge);
        }
    }
    report.fixed.sort_unstable();

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::try_add_edge;
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
    fn api_built_graph_is_clean() {
        let mut store = store_with(&["a", "b", "c"]);
        try_add_edge(&mut store, &id("a"), &id("b")).unwrap();
        try_add_edge(&mut store, &id("b"), &id("c")).unwrap();
        try_add_edge(&mut store, &id("a"), &id("c")).unwrap();

        let report = validate(&mut store, false);
        assert!(report.is_clean());
        assert!(!report.has_unresolved());
        assert!(report.violations().is_empty());
    }

    #[test]
    fn reports_each_kind() {
        let mut store = store_with(&["a", "b", "c"]);
        store.insert_edge_unchecked(&id("a"), &id("b"));
        store.insert_edge_unchecked(&id("b"), &id("a"));
        store.insert_edge_unchecked(&id("c"), &id("c"));
        store.insert_edge_unchecked(&id("c"), &id("ghost"));

        let report = inspect(&store);

        assert_eq!(report.cycles, vec![vec![id("a"), id("b"), id("a")]]);
        assert_eq!(report.dangling, vec![Edge::new("c", "ghost")]);
        assert_eq!(report.self_loops, vec![id("c")]);
        assert!(report.fixed.is_empty());
        assert_eq!(report.violations().len(), 3);
    }

    #[test]
    fn fix_removes_dangling_and_self_loops_but_not_cycles() {
        let mut store = store_with(&["a", "b", "c"]);
        store.insert_edge_unchecked(&id("a"), &id("b"));
        store.insert_edge_unchecked(&id("b"), &id("a"));
        store.insert_edge_unchecked(&id("c"), &id("c"));
        store.insert_edge_unchecked(&id("ghost"), &id("c"));

        let report = validate(&mut store, true);

        assert_eq!(
            report.fixed,
            vec![Edge::new("c", "c"), Edge::new("ghost", "c")]
        );
        assert!(report.has_unresolved());
        assert!(store.contains_edge(&id("a"), &id("b")));
        assert!(store.contains_edge(&id("b"), &id("a")));

        let again = inspect(&store);
        assert!(again.dangling.is_empty());
        assert!(again.self_loops.is_empty());
        assert_eq!(again.cycles.len(), 1);
    }

    #[test]
    fn fix_on_clean_graph_changes_nothing() {
        let mut store = store_with(&["a", "b"]);
        try_add_edge(&mut store, &id("a"), &id("b")).unwrap();
        let version = store.version();

        let report = validate(&mut store, true);
        assert!(report.fixed.is_empty());
        assert_eq!(store.version(), version);
    }

    #[test]
    fn violations_serialize_with_kind_tag() {
        let violation = Violation::SelfLoop { node: id("x") };
        let json = serde_json::to_string(&violation).unwrap();
        assert_eq!(json, r#"{"kind":"self_loop","node":"x"}"#);
    }
}
