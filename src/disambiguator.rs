//! # Disambiguator
//!
//! Drives a matching strategy to a fixed point: every pass resets the
//! strategy, snapshots the node set in processing order and offers each
//! node to the strategy, until a full pass changes nothing.
//!
//! Processing order is by descending weight (see
//! [`disambiguation_weight`]), then type name, then external id, then node
//! handle. The order is recomputed every pass since merges change which
//! nodes remain.

use crate::config::EngineConfig;
use crate::conflicts::{ConflictPolicy, JoinNameParts, NameNormalizer};
use crate::descriptor::disambiguation_weight;
use crate::error::Result;
use crate::graph::PropertyGraph;
use crate::matching::{DatabaseComparison, Matcher, Merging, SelfPruning};
use crate::model::NodeId;
use crate::schema::SchemaRegistry;
use crate::store::EntityStore;
use hashbrown::HashMap;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GraphDisambiguator {
    registry: Arc<SchemaRegistry>,
    config: EngineConfig,
    policy: ConflictPolicy,
}

impl GraphDisambiguator {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self::with_config(Arc::new(registry), EngineConfig::default())
    }

    pub fn with_config(registry: Arc<SchemaRegistry>, config: EngineConfig) -> Self {
        let policy = ConflictPolicy::new(config.person_type.clone(), Arc::new(JoinNameParts));
        Self {
            registry,
            config,
            policy,
        }
    }

    /// Build from configuration, loading the configured schema registry.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let registry = config.registry()?;
        Ok(Self::with_config(Arc::new(registry), config))
    }

    /// Replace the routine recomputing person names after a merge.
    pub fn with_name_normalizer(mut self, normalizer: Arc<dyn NameNormalizer>) -> Self {
        self.policy = ConflictPolicy::new(self.config.person_type.clone(), normalizer);
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Remove duplicate nodes within `graph`.
    pub fn prune(&self, mut graph: PropertyGraph) -> Result<PropertyGraph> {
        let mut matcher = SelfPruning::new(&self.registry, &self.policy);
        self.disambiguate(&mut graph, &mut matcher)?;
        Ok(graph)
    }

    /// Fold `change` into `base` and return the grown base graph.
    ///
    /// External ids of `change` that also occur in `base` are renamed first,
    /// so relation keys of the two graphs never collide by accident.
    pub fn merge(&self, base: PropertyGraph, mut change: PropertyGraph) -> Result<PropertyGraph> {
        let renamed = change.namespace_external_ids(&base);
        if !renamed.is_empty() {
            debug!(
                "Renamed {} incoming external ids already used by the base graph",
                renamed.len()
            );
        }
        let mut matcher = Merging::new(&self.registry, &self.policy, base)?;
        self.disambiguate(&mut change, &mut matcher)?;
        matcher.finish(&change)
    }

    /// Bind nodes of `graph` to the persisted entities of `store` where the
    /// match is unambiguous.
    pub fn find_instances(
        &self,
        mut graph: PropertyGraph,
        store: &dyn EntityStore,
    ) -> Result<PropertyGraph> {
        let mut matcher = DatabaseComparison::new(&self.registry, store)
            .with_subject_type(self.config.subject_type.clone())
            .with_probe_limit(self.config.probe_limit);
        self.disambiguate(&mut graph, &mut matcher)?;
        Ok(graph)
    }

    /// Run `matcher` over `graph` until a pass makes no change. Returns the
    /// number of passes.
    pub fn disambiguate(&self, graph: &mut PropertyGraph, matcher: &mut dyn Matcher) -> Result<usize> {
        let mut passes = 0;
        loop {
            passes += 1;
            matcher.reset();
            let mut changes = 0;
            for id in self.processing_order(graph) {
                // Removed by an earlier match in this pass.
                if !graph.contains(id) {
                    continue;
                }
                if matcher.match_node(graph, id)? {
                    changes += 1;
                }
            }
            debug!("Disambiguation pass {}: {} changes", passes, changes);
            if changes == 0 {
                return Ok(passes);
            }
        }
    }

    /// Node handles in processing order.
    pub fn processing_order(&self, graph: &PropertyGraph) -> Vec<NodeId> {
        let mut weights: HashMap<&str, i64> = HashMap::new();
        let mut keyed: Vec<_> = graph
            .nodes()
            .map(|node| {
                let weight = *weights.entry(node.type_name.as_str()).or_insert_with(|| {
                    disambiguation_weight(
                        &self.registry,
                        &node.type_name,
                        &self.config.ignored_relations,
                    )
                });
                (
                    Reverse((weight, node.type_name.as_str(), node.external_id.as_str(), node.id)),
                    node.id,
                )
            })
            .collect();
        keyed.sort();
        keyed.into_iter().map(|(_, id)| id).collect()
    }
}
