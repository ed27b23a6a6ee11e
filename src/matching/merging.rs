use super::{fold_into, single_candidate, Matcher};
use crate::conflicts::ConflictPolicy;
use crate::descriptor::resolve;
use crate::error::{DisambiguationError, Result};
use crate::graph::PropertyGraph;
use crate::index::NodeIndex;
use crate::model::NodeId;
use crate::schema::SchemaRegistry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Folds the nodes of an incoming graph into a base graph.
///
/// A hit creates a fresh merged node in the base graph and folds the
/// existing match into it. Misses are materialized by [`Merging::finish`],
/// which also copies the incoming graph's forward edges. Edges are only
/// ever added or redirected, never removed.
///
/// Relation keys compare external ids across the two graphs, so the incoming
/// graph must not reuse the base graph's ids for other entities; see
/// [`PropertyGraph::namespace_external_ids`].
#[derive(Debug)]
pub struct Merging<'a> {
    registry: &'a SchemaRegistry,
    policy: &'a ConflictPolicy,
    base: PropertyGraph,
    index: NodeIndex,
    /// Incoming node -> base node it was merged into
    merged: BTreeMap<NodeId, NodeId>,
    unmerged: BTreeSet<NodeId>,
    /// Base node -> base node that replaced it
    replaced: BTreeMap<NodeId, NodeId>,
}

impl<'a> Merging<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        policy: &'a ConflictPolicy,
        base: PropertyGraph,
    ) -> Result<Self> {
        let index = NodeIndex::build(registry, &base)?;
        Ok(Self {
            registry,
            policy,
            base,
            index,
            merged: BTreeMap::new(),
            unmerged: BTreeSet::new(),
            replaced: BTreeMap::new(),
        })
    }

    pub fn base(&self) -> &PropertyGraph {
        &self.base
    }

    /// Materialize unmerged nodes and copy the forward edges of every
    /// incoming node onto its base counterpart.
    pub fn finish(mut self, incoming: &PropertyGraph) -> Result<PropertyGraph> {
        for id in std::mem::take(&mut self.unmerged) {
            let node = incoming.get(id)?;
            let created = self.base.create(
                node.external_id.clone(),
                node.type_name.clone(),
                node.attrs.clone(),
            );
            if let Some(instance) = &node.instance {
                self.base.bind_instance(created, instance.clone())?;
            }
            self.merged.insert(id, created);
        }

        for (&source, &merged) in &self.merged {
            let subject = self.current(merged);
            for edge in incoming.outgoing(source) {
                let target = self
                    .merged
                    .get(&edge.object)
                    .copied()
                    .ok_or(DisambiguationError::UnknownNode(edge.object))?;
                let object = self.current(target);
                if subject != object {
                    self.base.relate(subject, object, &edge.name)?;
                }
            }
        }
        Ok(self.base)
    }

    /// Follow replacements to the base node now standing for `id`.
    fn current(&self, mut id: NodeId) -> NodeId {
        while let Some(&next) = self.replaced.get(&id) {
            id = next;
        }
        id
    }
}

impl Matcher for Merging<'_> {
    fn reset(&mut self) {}

    fn match_node(&mut self, graph: &mut PropertyGraph, node: NodeId) -> Result<bool> {
        if self.merged.contains_key(&node) {
            return Ok(false);
        }
        let Some(info) = resolve(self.registry, graph, node)? else {
            self.unmerged.insert(node);
            return Ok(false);
        };

        let candidates = self.index.candidates(&info);
        let Some(matched) = single_candidate(graph, &info, candidates, "merging graphs")? else {
            self.unmerged.insert(node);
            return Ok(false);
        };

        let incoming = graph.get(node)?;
        let matched_type = &self.base.get(matched)?.type_name;
        let type_name = if self.registry.is_subtype(matched_type, &incoming.type_name) {
            matched_type.clone()
        } else {
            incoming.type_name.clone()
        };
        let merged = self.base.create(
            incoming.external_id.clone(),
            type_name,
            incoming.attrs.clone(),
        );
        if let Some(instance) = &incoming.instance {
            self.base.bind_instance(merged, instance.clone())?;
        }
        debug!(
            "Merging {} into {} as {}",
            incoming,
            self.base.get(matched)?,
            merged
        );

        fold_into(self.registry, self.policy, &mut self.base, matched, merged)?;
        self.replaced.insert(matched, merged);
        self.merged.insert(node, merged);
        self.unmerged.remove(&node);

        self.index.rebuild(self.registry, &self.base)?;
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
    fn test_hit_creates_merged_node() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();
        let mut base = PropertyGraph::new();
        let old = base.create("_:old", "tag", attrs(&[("name", "rust")]));

        let mut incoming = PropertyGraph::new();
        let tag = incoming.create("_:new", "tag", attrs(&[("name", "rust")]));

        let mut merging = Merging::new(&registry, &policy, base).unwrap();
        assert!(merging.match_node(&mut incoming, tag).unwrap());
        // Already merged nodes are skipped.
        assert!(!merging.match_node(&mut incoming, tag).unwrap());

        let base = merging.finish(&incoming).unwrap();
        assert_eq!(base.len(), 1);
        assert!(!base.contains(old));
        let merged = base.nodes().next().unwrap();
        assert_eq!(merged.external_id, "_:new");
        assert_eq!(merged.attrs["name"], Value::from("rust"));
    }

    #[test]
    fn test_finish_materializes_misses_with_edges() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();
        let base = PropertyGraph::new();

        let mut incoming = PropertyGraph::new();
        let work = incoming.create("_:w", "article", attrs(&[("title", "Graphs")]));
        let ident = incoming.create("_:i", "workidentifier", attrs(&[("uri", "http://osf.io/x")]));
        incoming.relate(ident, work, "creative_work").unwrap();

        let mut merging = Merging::new(&registry, &policy, base).unwrap();
        for id in incoming.node_ids() {
            assert!(!merging.match_node(&mut incoming, id).unwrap());
        }
        let base = merging.finish(&incoming).unwrap();

        assert_eq!(base.len(), 2);
        let work = base.find_by_external_id("_:w").unwrap();
        let ident = base.find_by_external_id("_:i").unwrap();
        assert_eq!(base.related(ident, "creative_work"), vec![work]);
    }

    #[test]
    fn test_finish_rejects_unprocessed_targets() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();

        let mut incoming = PropertyGraph::new();
        let work = incoming.create("_:w", "article", Attributes::new());
        let ident = incoming.create("_:i", "workidentifier", attrs(&[("uri", "u")]));
        incoming.relate(ident, work, "creative_work").unwrap();

        let mut merging = Merging::new(&registry, &policy, PropertyGraph::new()).unwrap();
        merging.match_node(&mut incoming, ident).unwrap();
        assert!(matches!(
            merging.finish(&incoming),
            Err(DisambiguationError::UnknownNode(id)) if id == work
        ));
    }

    #[test]
    fn test_merged_node_keeps_specific_type() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();
        let mut base = PropertyGraph::new();
        let article = base.create("_:a", "article", attrs(&[("title", "A Much Longer Title")]));
        let ident = base.create("_:i", "workidentifier", attrs(&[("uri", "u")]));
        base.relate(ident, article, "creative_work").unwrap();

        let mut incoming = PropertyGraph::new();
        let sparse = incoming.create("_:cw", "creativework", attrs(&[("title", "Short")]));
        let same_ident = incoming.create("_:i", "workidentifier", attrs(&[("uri", "u")]));
        incoming.relate(same_ident, sparse, "creative_work").unwrap();

        let mut merging = Merging::new(&registry, &policy, base).unwrap();
        assert!(merging.match_node(&mut incoming, sparse).unwrap());
        let merged = merging.base().find_by_external_id("_:cw").unwrap();
        let node = merging.base().get(merged).unwrap();
        assert_eq!(node.type_name, "article");
        assert_eq!(node.attrs["title"], Value::from("A Much Longer Title"));
    }
}
