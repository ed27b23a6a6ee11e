//! Property tests for pruning random graphs with planted duplicates.
//!
//! Properties:
//!
//! 1. Idempotence - pruning a pruned graph changes nothing
//! 2. Convergence - no two nodes of a pruned graph still match
//! 3. Identifier uniqueness - one identifier node per distinct uri survives

use disambig_rs::test_support::{generate_graph, node_signatures, scholarly};
use disambig_rs::{resolve, GraphDisambiguator, NodeIndex, PropertyGraph};
use proptest::prelude::*;
use std::collections::BTreeSet;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prune_is_idempotent(
        work_count in 1u32..24,
        duplicate_probability in 0.0f64..0.7,
        seed in any::<u64>(),
    ) {
        let disambiguator = GraphDisambiguator::new(scholarly());
        let graph = generate_graph(work_count, duplicate_probability, seed);

        let once = disambiguator.prune(graph).unwrap();
        let signatures = node_signatures(&once);
        let edges = once.edge_count();

        let twice = disambiguator.prune(once).unwrap();
        prop_assert_eq!(node_signatures(&twice), signatures);
        prop_assert_eq!(twice.edge_count(), edges);
    }

    #[test]
    fn pruned_graph_has_no_matches_left(
        work_count in 1u32..24,
        duplicate_probability in 0.0f64..0.7,
        seed in any::<u64>(),
    ) {
        let registry = scholarly();
        let graph = generate_graph(work_count, duplicate_probability, seed);
        let before = graph.len();
        let pruned = GraphDisambiguator::new(registry.clone()).prune(graph).unwrap();
        prop_assert!(pruned.len() <= before);

        let index = NodeIndex::build(&registry, &pruned).unwrap();
        for id in pruned.node_ids() {
            if let Some(info) = resolve(&registry, &pruned, id).unwrap() {
                let matches = index.lookup(&info);
                prop_assert!(matches.is_empty(), "{} still matches {:?}", id, matches);
            }
        }
    }

    #[test]
    fn one_identifier_per_uri(
        work_count in 1u32..24,
        duplicate_probability in 0.0f64..0.7,
        seed in any::<u64>(),
    ) {
        let graph = generate_graph(work_count, duplicate_probability, seed);
        let uris = |graph: &PropertyGraph| -> (usize, BTreeSet<String>) {
            let identifiers: Vec<_> = graph
                .nodes()
                .filter(|n| n.type_name == "workidentifier")
                .collect();
            let distinct = identifiers.iter().map(|n| n.attrs["uri"].render()).collect();
            (identifiers.len(), distinct)
        };
        let (_, expected) = uris(&graph);

        let pruned = GraphDisambiguator::new(scholarly()).prune(graph).unwrap();
        let (count, distinct) = uris(&pruned);
        prop_assert_eq!(count, expected.len());
        prop_assert_eq!(distinct, expected);
    }
}
