//! # Matching Strategies
//!
//! Three ways of deciding what to do with a node that shares its
//! disambiguation keys with something else:
//!
//! - [`SelfPruning`] dedups nodes within one graph,
//! - [`Merging`] folds an incoming graph into a base graph,
//! - [`DatabaseComparison`] binds nodes to persisted entities.
//!
//! Each is driven to a fixed point by the disambiguator.

mod database;
mod merging;
mod pruning;

pub use database::DatabaseComparison;
pub use merging::Merging;
pub use pruning::SelfPruning;

use crate::conflicts::ConflictPolicy;
use crate::descriptor::DisambiguationInfo;
use crate::error::{DisambiguationError, Result};
use crate::graph::PropertyGraph;
use crate::model::NodeId;
use crate::schema::SchemaRegistry;
use std::collections::BTreeSet;
use tracing::error;

pub trait Matcher {
    /// Called once at the start of every full pass.
    fn reset(&mut self);

    /// Try to match `node` of `graph`. Returns true iff the call changed a
    /// graph or a binding.
    fn match_node(&mut self, graph: &mut PropertyGraph, node: NodeId) -> Result<bool>;
}

/// The only candidate, if there is one. Several candidates are ambiguous.
fn single_candidate(
    graph: &PropertyGraph,
    info: &DisambiguationInfo,
    candidates: BTreeSet<NodeId>,
    what: &str,
) -> Result<Option<NodeId>> {
    if candidates.len() > 1 {
        let node = graph.get(info.node)?.to_string();
        let detail = format!(
            "multiple matches while {}: {:?}",
            what,
            candidates.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
        error!("Could not disambiguate {}: {}", node, detail);
        return Err(DisambiguationError::AmbiguousMatch {
            node,
            type_name: info.type_name.clone(),
            detail,
        });
    }
    Ok(candidates.into_iter().next())
}

/// Fold the attributes of `loser` into `survivor`, then replace `loser`
/// with `survivor` in the graph.
fn fold_into(
    registry: &SchemaRegistry,
    policy: &ConflictPolicy,
    graph: &mut PropertyGraph,
    loser: NodeId,
    survivor: NodeId,
) -> Result<()> {
    let (attrs, instance) = {
        let node = graph.get(loser)?;
        (node.attrs.clone(), node.instance.clone())
    };
    let node = graph
        .node_mut(survivor)
        .ok_or(DisambiguationError::UnknownNode(survivor))?;
    policy.merge_into(registry, node, &attrs);
    if let Some(instance) = instance {
        graph.bind_instance(survivor, instance)?;
    }
    graph.replace(loser, survivor)
}
