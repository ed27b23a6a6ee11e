use super::Matcher;
use crate::config::{DEFAULT_PROBE_LIMIT, DEFAULT_SUBJECT_TYPE};
use crate::descriptor::{resolve, DisambiguationInfo, FieldValue, KeyField};
use crate::error::{DisambiguationError, Result};
use crate::graph::PropertyGraph;
use crate::model::{InstanceRef, NodeId};
use crate::schema::SchemaRegistry;
use crate::store::{Condition, EntityQuery, EntityStore};
use std::collections::BTreeSet;
use tracing::{debug, error, warn};

/// Binds graph nodes to persisted entities.
///
/// Queries go straight to the store; nothing is cached between calls. Each
/// query fetches at most `probe_limit` rows, so ambiguity is detected
/// without materializing the full match set.
pub struct DatabaseComparison<'a> {
    registry: &'a SchemaRegistry,
    store: &'a dyn EntityStore,
    subject_type: String,
    probe_limit: usize,
}

impl std::fmt::Debug for DatabaseComparison<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseComparison")
            .field("subject_type", &self.subject_type)
            .field("probe_limit", &self.probe_limit)
            .finish_non_exhaustive()
    }
}

impl<'a> DatabaseComparison<'a> {
    pub fn new(registry: &'a SchemaRegistry, store: &'a dyn EntityStore) -> Self {
        Self {
            registry,
            store,
            subject_type: DEFAULT_SUBJECT_TYPE.to_string(),
            probe_limit: DEFAULT_PROBE_LIMIT,
        }
    }

    /// Closed-vocabulary type for which "no match" is an error.
    pub fn with_subject_type(mut self, subject_type: impl Into<String>) -> Self {
        self.subject_type = subject_type.into();
        self
    }

    pub fn with_probe_limit(mut self, probe_limit: usize) -> Self {
        self.probe_limit = probe_limit.max(DEFAULT_PROBE_LIMIT);
        self
    }

    fn condition(&self, key: &KeyField) -> Option<Condition> {
        match &key.value {
            FieldValue::Attribute(value) => Some(Condition::Attribute {
                field: key.field.clone(),
                value: value.clone(),
            }),
            FieldValue::Related(refs) => {
                let mut pks = BTreeSet::new();
                for related in refs {
                    let pk = match &related.instance {
                        Some(instance) => instance.pk,
                        None => self.store.resolve_reference(&related.external_id)?,
                    };
                    pks.insert(pk);
                }
                Some(Condition::Related {
                    field: key.field.clone(),
                    pks,
                })
            }
        }
    }

    /// `Ok(None)` when nothing matched or a key could not be expressed
    /// against storage.
    fn instance_for(&self, graph: &PropertyGraph, info: &DisambiguationInfo) -> Result<Option<InstanceRef>> {
        let mut all = Vec::with_capacity(info.all.len());
        for key in &info.all {
            match self.condition(key) {
                Some(condition) => all.push(condition),
                None => return Ok(None),
            }
        }

        let mut alternatives = Vec::new();
        for key in &info.any {
            if let Some(condition) = self.condition(key) {
                let mut alternative = all.clone();
                alternative.push(condition);
                alternatives.push(alternative);
            }
        }
        if !info.any.is_empty() && alternatives.is_empty() {
            return Ok(None);
        }
        if alternatives.is_empty() {
            alternatives.push(all.clone());
        }

        let mut query = EntityQuery::new(info.concrete_type.clone());
        query.alternatives = alternatives;
        if let Some(types) = &info.matching_types {
            query = query.restrict_types(types.clone());
        }

        // Loosest first, so records stored under a supertype still match.
        let type_info = self.registry.get(&info.type_name)?;
        let mut variants = vec![query.clone()];
        if !type_info.is_concrete() {
            for types in [type_info.hierarchy(), BTreeSet::from([info.type_name.clone()])] {
                let variant = query.clone().restrict_types(types);
                // Narrowing can repeat an earlier restriction.
                if variants.iter().all(|seen| seen.types != variant.types) {
                    variants.push(variant);
                }
            }
        }

        let mut ambiguous_on = None;
        for variant in &variants {
            let mut found = self.store.find(variant, self.probe_limit)?;
            match found.len() {
                0 => debug!("No {}s found for {}", info.concrete_type, variant),
                1 => return Ok(found.pop()),
                _ => {
                    ambiguous_on = Some(variant);
                    if !all.is_empty() {
                        return Err(self.ambiguous(graph, info, variant, "the main query"));
                    }
                    warn!(
                        "Multiple {}s returned for {}, trying a narrower query",
                        info.concrete_type, variant
                    );
                }
            }
        }

        match ambiguous_on {
            Some(variant) => Err(self.ambiguous(graph, info, variant, "every query")),
            None => Ok(None),
        }
    }

    fn ambiguous(
        &self,
        graph: &PropertyGraph,
        info: &DisambiguationInfo,
        query: &EntityQuery,
        which: &str,
    ) -> DisambiguationError {
        let node = graph
            .node(info.node)
            .map(ToString::to_string)
            .unwrap_or_else(|| info.node.to_string());
        let detail = format!("too many {}s found from {} ({})", info.concrete_type, query, which);
        error!("Could not disambiguate {}: {}", node, detail);
        DisambiguationError::AmbiguousMatch {
            node,
            type_name: info.type_name.clone(),
            detail,
        }
    }
}

impl Matcher for DatabaseComparison<'_> {
    fn reset(&mut self) {}

    fn match_node(&mut self, graph: &mut PropertyGraph, node: NodeId) -> Result<bool> {
        if graph.get(node)?.instance.is_some() {
            return Ok(false);
        }
        let Some(info) = resolve(self.registry, graph, node)? else {
            return Ok(false);
        };
        if info.is_empty() {
            return Ok(false);
        }

        if let Some(instance) = self.instance_for(graph, &info)? {
            debug!("Disambiguated {} to {}", graph.get(node)?, instance);
            graph.bind_instance(node, instance)?;
            return Ok(true);
        }

        if info.type_name == self.subject_type {
            let subject = graph.get(node)?;
            let value = subject
                .attr("name")
                .map(|name| name.render())
                .unwrap_or_else(|| subject.external_id.clone());
            return Err(DisambiguationError::InvalidEntity {
                type_name: info.type_name,
                value,
            });
        }
        Ok(false)
    }
}
