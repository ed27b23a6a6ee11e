//! # Descriptor Resolution
//!
//! Derives, per node, the matching key shape declared by its type: the
//! conjunctive `all` key, the disjunctive `any` keys, and the set of types
//! a match may carry.

use crate::canonical::{canonical_set, canonicalize, AllKey, CanonicalKey, FieldKey};
use crate::error::{DisambiguationError, Result};
use crate::graph::PropertyGraph;
use crate::model::{InstanceRef, NodeId};
use crate::schema::{FieldDef, SchemaRegistry, TypeInfo};
use std::collections::BTreeSet;
use tracing::debug;

/// A node reached through a relation field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedRef {
    pub node: NodeId,
    pub external_id: String,
    pub instance: Option<InstanceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Attribute(CanonicalKey),
    /// One related node for to-one relations and `any` fields, the full
    /// set of related nodes for a to-many relation used in `all`.
    Related(Vec<RelatedRef>),
}

impl FieldValue {
    /// Canonical form used as an index key. Relations key on the related
    /// nodes' external ids so keys compare across graphs.
    pub fn key(&self) -> CanonicalKey {
        match self {
            FieldValue::Attribute(key) => key.clone(),
            FieldValue::Related(refs) if refs.len() == 1 => {
                CanonicalKey::Str(refs[0].external_id.clone())
            }
            FieldValue::Related(refs) => {
                canonical_set(refs.iter().map(|r| r.external_id.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyField {
    pub field: String,
    pub value: FieldValue,
}

impl KeyField {
    pub fn key(&self) -> FieldKey {
        FieldKey::new(self.field.clone(), self.value.key())
    }
}

/// Resolved matching keys of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisambiguationInfo {
    pub node: NodeId,
    pub type_name: String,
    pub concrete_type: String,
    /// One entry per `all` field, or empty when any of them is absent
    pub all: Vec<KeyField>,
    /// Zero or more entries per `any` field
    pub any: Vec<KeyField>,
    pub matching_types: Option<BTreeSet<String>>,
}

impl DisambiguationInfo {
    pub fn all_key(&self) -> AllKey {
        self.all.iter().map(KeyField::key).collect()
    }

    pub fn any_keys(&self) -> Vec<FieldKey> {
        self.any.iter().map(KeyField::key).collect()
    }

    /// Nothing to match on.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }

    /// Whether a candidate of `type_name` satisfies the type constraint.
    pub fn accepts_type(&self, type_name: &str) -> bool {
        self.matching_types
            .as_ref()
            .map(|types| types.contains(type_name))
            .unwrap_or(true)
    }
}

/// Resolve the matching keys of `node`.
///
/// Returns `Ok(None)` when the node's type declares neither `all` nor `any`
/// fields; such nodes are not disambiguated.
pub fn resolve(
    registry: &SchemaRegistry,
    graph: &PropertyGraph,
    node: NodeId,
) -> Result<Option<DisambiguationInfo>> {
    let type_name = &graph.get(node)?.type_name;
    let info = registry.get(type_name)?;
    let descriptor = match &info.descriptor {
        Some(descriptor) if !descriptor.is_empty() => descriptor,
        _ => {
            debug!("{} declares nothing to disambiguate on; skipping {}", type_name, node);
            return Ok(None);
        }
    };

    let mut all = Vec::with_capacity(descriptor.all.len());
    for field in &descriptor.all {
        let mut values = field_values(info, graph, node, field, true)?;
        if values.is_empty() {
            // A partial conjunction cannot discriminate.
            all.clear();
            break;
        }
        all.push(KeyField {
            field: field.clone(),
            value: values.swap_remove(0),
        });
    }

    let mut any = Vec::new();
    for field in &descriptor.any {
        for value in field_values(info, graph, node, field, false)? {
            any.push(KeyField {
                field: field.clone(),
                value,
            });
        }
    }

    Ok(Some(DisambiguationInfo {
        node,
        type_name: info.name.clone(),
        concrete_type: info.concrete.clone(),
        all,
        any,
        matching_types: info.matching_types.clone(),
    }))
}

fn field_values(
    info: &TypeInfo,
    graph: &PropertyGraph,
    node: NodeId,
    field: &str,
    conjunctive: bool,
) -> Result<Vec<FieldValue>> {
    let def = info.field(field).ok_or_else(|| {
        DisambiguationError::Schema(format!("{} has no field {:?}", info.name, field))
    })?;

    let values = match def {
        FieldDef::Attribute { .. } => graph
            .get(node)?
            .attr(field)
            .map(|value| vec![FieldValue::Attribute(canonicalize(value))])
            .unwrap_or_default(),
        FieldDef::ToOne { .. } => {
            let mut targets = graph.related(node, field);
            targets.sort();
            if targets.len() > 1 {
                debug!("{} has {} {:?} edges; keying on the first", node, targets.len(), field);
            }
            match targets.first() {
                Some(&target) => vec![FieldValue::Related(vec![related_ref(graph, target)?])],
                None => Vec::new(),
            }
        }
        FieldDef::ToMany { reverse_of, .. } => {
            let mut sources = graph.referrers(node, reverse_of);
            sources.sort();
            let refs = sources
                .into_iter()
                .map(|source| related_ref(graph, source))
                .collect::<Result<Vec<_>>>()?;
            if refs.is_empty() {
                Vec::new()
            } else if conjunctive {
                vec![FieldValue::Related(refs)]
            } else {
                refs.into_iter()
                    .map(|r| FieldValue::Related(vec![r]))
                    .collect()
            }
        }
        FieldDef::ManyToMany { .. } => {
            return Err(DisambiguationError::UnsupportedField {
                type_name: info.name.clone(),
                field: field.to_string(),
            })
        }
    };
    Ok(values)
}

fn related_ref(graph: &PropertyGraph, id: NodeId) -> Result<RelatedRef> {
    let node = graph.get(id)?;
    Ok(RelatedRef {
        node: id,
        external_id: node.external_id.clone(),
        instance: node.instance.clone(),
    })
}

/// Processing priority of a type.
///
/// Types keyed by exactly one relation come first, since one identifying
/// relation often pins down the related node. Then types with no relation
/// keys, then two or more (the more, the later). Bookkeeping relations named
/// in `ignored` do not count.
pub fn disambiguation_weight(registry: &SchemaRegistry, type_name: &str, ignored: &[String]) -> i64 {
    let Some(info) = registry.type_info(type_name) else {
        return 0;
    };
    let Some(descriptor) = &info.descriptor else {
        return 0;
    };
    let count = descriptor
        .fields()
        .filter(|field| !ignored.iter().any(|name| name == *field))
        .filter(|field| info.field(field).map(FieldDef::is_relation).unwrap_or(false))
        .count() as i64;
    if count == 1 {
        1
    } else {
        -count
    }
}
