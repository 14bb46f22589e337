//! Property tests: the graph stays a DAG whatever edges are thrown at it.

use proptest::prelude::*;
use rivets_graph::{DependencyGraph, GraphError, IssueId};
use std::collections::BTreeSet;

const NODES: usize = 12;

fn node(i: usize) -> IssueId {
    IssueId::new(format!("n{i:02}"))
}

fn graph_from(edges: &[(usize, usize)]) -> DependencyGraph {
    let graph = DependencyGraph::default();
    for i in 0..NODES {
        graph.add_node(node(i)).unwrap();
    }
    for (from, to) in edges {
        let _ = graph.add_dependency(&node(*from), &node(*to));
    }
    graph
}

fn arb_edges() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..NODES, 0..NODES), 0..60)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn any_insertion_sequence_stays_acyclic(edges in arb_edges()) {
        let graph = graph_from(&edges);
        let report = graph.validate(false).unwrap();
        prop_assert!(report.is_clean(), "report: {:?}", report);
    }

    #[test]
    fn refused_edges_really_close_a_cycle(edges in arb_edges(), from in 0..NODES, to in 0..NODES) {
        let graph = graph_from(&edges);
        match graph.add_dependency(&node(from), &node(to)) {
            Err(GraphError::CycleDetected { path, .. }) => {
                // to already reaches from
                prop_assert_eq!(path.first(), Some(&node(to)));
                prop_assert_eq!(path.last(), Some(&node(from)));
                prop_assert!(graph.query_deps(&node(to), 0).unwrap().contains(&node(from)));
            }
            Err(GraphError::SelfLoop(_)) => {
                prop_assert_eq!(from, to);
            }
            Err(other) => {
                prop_assert!(false, "unexpected error: {}", other);
            }
            Ok(_) => {}
        }
    }

    #[test]
    fn downstream_unbounded_equals_every_ancestor(edges in arb_edges(), target in 0..NODES) {
        let graph = graph_from(&edges);

        let downstream: BTreeSet<IssueId> = graph
            .query_downstream(&node(target), 0)
            .unwrap()
            .reached()
            .cloned()
            .collect();

        let ancestors: BTreeSet<IssueId> = (0..NODES)
            .filter(|i| *i != target)
            .map(node)
            .filter(|candidate| graph.query_deps(candidate, 0).unwrap().contains(&node(target)))
            .collect();

        prop_assert_eq!(downstream, ancestors);
    }

    #[test]
    fn traversal_reports_each_node_once(edges in arb_edges(), start in 0..NODES) {
        let graph = graph_from(&edges);
        let walk = graph.query_deps(&node(start), 0).unwrap();
        let unique: BTreeSet<&IssueId> = walk.reached().collect();
        prop_assert_eq!(unique.len(), walk.total);
    }
}
