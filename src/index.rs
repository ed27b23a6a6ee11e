//! # Node Index
//!
//! Two-level lookup of graph nodes by their disambiguation keys:
//! concrete type, then `all` key, then either a direct candidate list (nodes
//! without `any` keys) or one candidate list per individual `any` key.
//!
//! The index remembers exactly where each node was inserted, so removal
//! undoes the insertions even if the node's keys changed since.

use crate::canonical::{AllKey, FieldKey};
use crate::descriptor::{resolve, DisambiguationInfo};
use crate::error::{DisambiguationError, Result};
use crate::graph::PropertyGraph;
use crate::model::NodeId;
use crate::schema::SchemaRegistry;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct KeyBucket {
    direct: Vec<NodeId>,
    by_any: FxHashMap<FieldKey, Vec<NodeId>>,
}

impl KeyBucket {
    fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.by_any.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Direct,
    ByAny,
    /// Tracked, but had nothing to be indexed under
    Unindexed,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    concrete_type: String,
    type_name: String,
    all_key: AllKey,
    any_keys: Vec<FieldKey>,
    placement: Placement,
}

#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    index: FxHashMap<String, FxHashMap<AllKey, KeyBucket>>,
    entries: FxHashMap<NodeId, IndexEntry>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every disambiguable node of `graph`.
    pub fn build(registry: &SchemaRegistry, graph: &PropertyGraph) -> Result<Self> {
        let mut index = Self::new();
        index.rebuild(registry, graph)?;
        Ok(index)
    }

    pub fn rebuild(&mut self, registry: &SchemaRegistry, graph: &PropertyGraph) -> Result<()> {
        self.clear();
        for id in graph.node_ids() {
            if let Some(info) = resolve(registry, graph, id)? {
                self.add(&info)?;
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    /// Number of tracked nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    /// Track a node under its resolved keys. A node already tracked is
    /// re-indexed under the new keys.
    pub fn add(&mut self, info: &DisambiguationInfo) -> Result<()> {
        if self.entries.contains_key(&info.node) {
            self.remove(info.node)?;
        }

        let all_key = info.all_key();
        let any_keys: Vec<FieldKey> = info
            .any_keys()
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let placement = if !any_keys.is_empty() {
            Placement::ByAny
        } else if !all_key.is_empty() {
            Placement::Direct
        } else {
            debug!("Nothing to disambiguate on. Ignoring node {}", info.node);
            Placement::Unindexed
        };

        if placement != Placement::Unindexed {
            let bucket = self
                .index
                .entry(info.concrete_type.clone())
                .or_default()
                .entry(all_key.clone())
                .or_default();
            match placement {
                Placement::ByAny => {
                    for key in &any_keys {
                        bucket.by_any.entry(key.clone()).or_default().push(info.node);
                    }
                }
                _ => bucket.direct.push(info.node),
            }
        }

        self.entries.insert(
            info.node,
            IndexEntry {
                concrete_type: info.concrete_type.clone(),
                type_name: info.type_name.clone(),
                all_key,
                any_keys,
                placement,
            },
        );
        Ok(())
    }

    /// Undo exactly the insertions `add` performed for `node`.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        let entry = self
            .entries
            .remove(&node)
            .ok_or(DisambiguationError::IndexInvariantViolation(node))?;
        if entry.placement == Placement::Unindexed {
            return Ok(());
        }

        let by_type = self
            .index
            .get_mut(&entry.concrete_type)
            .ok_or(DisambiguationError::IndexInvariantViolation(node))?;
        let bucket = by_type
            .get_mut(&entry.all_key)
            .ok_or(DisambiguationError::IndexInvariantViolation(node))?;

        match entry.placement {
            Placement::ByAny => {
                for key in &entry.any_keys {
                    let candidates = bucket
                        .by_any
                        .get_mut(key)
                        .ok_or(DisambiguationError::IndexInvariantViolation(node))?;
                    remove_one(candidates, node)?;
                    if candidates.is_empty() {
                        bucket.by_any.remove(key);
                    }
                }
            }
            _ => remove_one(&mut bucket.direct, node)?,
        }

        if bucket.is_empty() {
            by_type.remove(&entry.all_key);
        }
        if by_type.is_empty() {
            self.index.remove(&entry.concrete_type);
        }
        Ok(())
    }

    /// Candidates sharing the node's keys, excluding the node itself and
    /// filtered by its type constraint.
    pub fn lookup(&self, info: &DisambiguationInfo) -> BTreeSet<NodeId> {
        let mut matches = self.candidates(info);
        matches.remove(&info.node);
        matches
    }

    /// Like `lookup`, for a node that lives in another graph and so cannot
    /// be among the candidates.
    pub fn candidates(&self, info: &DisambiguationInfo) -> BTreeSet<NodeId> {
        let mut matches = BTreeSet::new();
        let all_key = info.all_key();
        let any_keys = info.any_keys();

        let Some(bucket) = self
            .index
            .get(&info.concrete_type)
            .and_then(|by_type| by_type.get(&all_key))
        else {
            return matches;
        };

        if !any_keys.is_empty() {
            for key in &any_keys {
                if let Some(candidates) = bucket.by_any.get(key) {
                    matches.extend(candidates.iter().copied());
                }
            }
        } else if !all_key.is_empty() {
            matches.extend(bucket.direct.iter().copied());
        }

        if info.matching_types.is_some() {
            matches.retain(|candidate| {
                self.entries
                    .get(candidate)
                    .map(|entry| info.accepts_type(&entry.type_name))
                    .unwrap_or(false)
            });
        }
        matches
    }
}

fn remove_one(candidates: &mut Vec<NodeId>, node: NodeId) -> Result<()> {
    let position = candidates
        .iter()
        .position(|&candidate| candidate == node)
        .ok_or(DisambiguationError::IndexInvariantViolation(node))?;
    candidates.remove(position);
    Ok(())
}
