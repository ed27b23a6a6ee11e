//! # Error Module
//!
//! Failure taxonomy of a disambiguation pass. Every variant is fatal to the
//! pass that raised it; recoverable outcomes ("no match", "already bound")
//! are reported through `Ok(false)` by the matchers instead.

use crate::model::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DisambiguationError>;

#[derive(Debug, Error)]
pub enum DisambiguationError {
    /// Two or more equally valid candidates where exactly one is required.
    #[error("ambiguous match for {node} ({type_name}): {detail}")]
    AmbiguousMatch {
        node: String,
        type_name: String,
        detail: String,
    },

    /// A closed-vocabulary node had no persisted counterpart.
    #[error("invalid {type_name}: {value:?}")]
    InvalidEntity { type_name: String, value: String },

    /// A many-to-many relation was used as a disambiguation key.
    #[error("field {type_name}.{field} is a many-to-many relation and cannot be used to disambiguate")]
    UnsupportedField { type_name: String, field: String },

    /// The node index was asked to remove a node it never tracked.
    #[error("could not remove node from index: node {0} not found")]
    IndexInvariantViolation(NodeId),

    #[error("node {0} is not part of the graph")]
    UnknownNode(NodeId),

    #[error("type {0:?} is not declared in the schema registry")]
    UnknownType(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl DisambiguationError {
    /// True for the data-quality and ambiguity outcomes a job framework may
    /// report back to the source, as opposed to internal or authoring bugs.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousMatch { .. } | Self::InvalidEntity { .. }
        )
    }
}
