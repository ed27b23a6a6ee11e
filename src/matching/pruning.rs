use super::{fold_into, single_candidate, Matcher};
use crate::conflicts::ConflictPolicy;
use crate::descriptor::resolve;
use crate::error::Result;
use crate::graph::PropertyGraph;
use crate::index::NodeIndex;
use crate::model::NodeId;
use crate::schema::SchemaRegistry;
use tracing::debug;

/// Removes duplicate nodes within one graph.
///
/// The index only knows nodes already seen in the current pass, so each
/// node is compared against its predecessors in processing order.
#[derive(Debug)]
pub struct SelfPruning<'a> {
    registry: &'a SchemaRegistry,
    policy: &'a ConflictPolicy,
    index: NodeIndex,
}

impl<'a> SelfPruning<'a> {
    pub fn new(registry: &'a SchemaRegistry, policy: &'a ConflictPolicy) -> Self {
        Self {
            registry,
            policy,
            index: NodeIndex::new(),
        }
    }
}

impl Matcher for SelfPruning<'_> {
    fn reset(&mut self) {
        self.index.clear();
    }

    fn match_node(&mut self, graph: &mut PropertyGraph, node: NodeId) -> Result<bool> {
        let Some(info) = resolve(self.registry, graph, node)? else {
            return Ok(false);
        };

        let candidates = self.index.lookup(&info);
        let Some(matched) = single_candidate(graph, &info, candidates, "pruning")? else {
            self.index.add(&info)?;
            return Ok(false);
        };

        let matched_type = graph.get(matched)?.type_name.clone();
        let survivor = if self.registry.is_subtype(&info.type_name, &matched_type) {
            // Keep the more specific node.
            debug!(
                "Found duplicate! Keeping {}, pruning {}",
                graph.get(node)?,
                graph.get(matched)?
            );
            self.index.remove(matched)?;
            fold_into(self.registry, self.policy, graph, matched, node)?;
            node
        } else {
            debug!(
                "Found duplicate! Keeping {}, pruning {}",
                graph.get(matched)?,
                graph.get(node)?
            );
            fold_into(self.registry, self.policy, graph, node, matched)?;
            self.index.remove(matched)?;
            matched
        };

        // The survivor's keys may have grown with the folded node's edges.
        if let Some(info) = resolve(self.registry, graph, survivor)? {
            self.index.add(&info)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attributes, Value};

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_first_seen_survives() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();
        let mut graph = PropertyGraph::new();
        let first = graph.create("_:a", "tag", attrs(&[("name", "rust")]));
        let second = graph.create("_:b", "tag", attrs(&[("name", "rust")]));

        let mut pruning = SelfPruning::new(&registry, &policy);
        assert!(!pruning.match_node(&mut graph, first).unwrap());
        assert!(pruning.match_node(&mut graph, second).unwrap());
        assert!(graph.contains(first));
        assert!(!graph.contains(second));
    }

    #[test]
    fn test_more_specific_type_survives() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();
        let mut graph = PropertyGraph::new();
        let sparse = graph.create("_:cw", "creativework", attrs(&[("language", "en")]));
        let article = graph.create("_:art", "article", attrs(&[("title", "Graphs")]));
        let ident = graph.create("_:i", "workidentifier", attrs(&[("uri", "http://osf.io/x")]));
        graph.relate(ident, sparse, "creative_work").unwrap();
        graph.relate(ident, article, "creative_work").unwrap();

        let mut pruning = SelfPruning::new(&registry, &policy);
        assert!(!pruning.match_node(&mut graph, sparse).unwrap());
        assert!(pruning.match_node(&mut graph, article).unwrap());

        assert!(!graph.contains(sparse));
        let survivor = graph.get(article).unwrap();
        assert_eq!(survivor.type_name, "article");
        assert_eq!(survivor.attrs["language"], Value::from("en"));
        assert_eq!(survivor.attrs["title"], Value::from("Graphs"));
        assert_eq!(graph.related(ident, "creative_work"), vec![article]);

        // Specific type survives regardless of processing order.
        let mut graph = PropertyGraph::new();
        let article = graph.create("_:art", "article", Attributes::new());
        let sparse = graph.create("_:cw", "creativework", Attributes::new());
        let ident = graph.create("_:i", "workidentifier", attrs(&[("uri", "http://osf.io/x")]));
        graph.relate(ident, sparse, "creative_work").unwrap();
        graph.relate(ident, article, "creative_work").unwrap();

        let mut pruning = SelfPruning::new(&registry, &policy);
        assert!(!pruning.match_node(&mut graph, article).unwrap());
        assert!(pruning.match_node(&mut graph, sparse).unwrap());
        assert!(graph.contains(article));
        assert!(!graph.contains(sparse));
    }

    #[test]
    fn test_ambiguous_duplicates_fail() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();
        let mut graph = PropertyGraph::new();
        let ident_a = graph.create("_:ia", "workidentifier", attrs(&[("uri", "a")]));
        let ident_b = graph.create("_:ib", "workidentifier", attrs(&[("uri", "b")]));
        let first = graph.create("_:w1", "article", Attributes::new());
        let second = graph.create("_:w2", "article", Attributes::new());
        let both = graph.create("_:w3", "article", Attributes::new());
        graph.relate(ident_a, first, "creative_work").unwrap();
        graph.relate(ident_b, second, "creative_work").unwrap();
        graph.relate(ident_a, both, "creative_work").unwrap();
        graph.relate(ident_b, both, "creative_work").unwrap();

        let mut pruning = SelfPruning::new(&registry, &policy);
        assert!(!pruning.match_node(&mut graph, first).unwrap());
        assert!(!pruning.match_node(&mut graph, second).unwrap());
        let err = pruning.match_node(&mut graph, both).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_reset_forgets_seen_nodes() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();
        let mut graph = PropertyGraph::new();
        let first = graph.create("_:a", "tag", attrs(&[("name", "rust")]));
        let second = graph.create("_:b", "tag", attrs(&[("name", "rust")]));

        let mut pruning = SelfPruning::new(&registry, &policy);
        pruning.match_node(&mut graph, first).unwrap();
        pruning.reset();
        assert!(!pruning.match_node(&mut graph, second).unwrap());
        assert_eq!(graph.len(), 2);
    }
}
