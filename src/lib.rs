//! # Disambig
//!
//! Entity-resolution engine for property graphs of scholarly metadata.
//!
//! Given a graph of typed, attributed nodes produced by an upstream parser,
//! the engine decides which nodes stand for the same real-world entity and
//! merges or binds them: within one document ([`GraphDisambiguator::prune`]),
//! across documents ([`GraphDisambiguator::merge`]) and against persisted
//! records ([`GraphDisambiguator::find_instances`]). Ambiguity is detected
//! and reported, never guessed away.

pub mod canonical;
pub mod config;
pub mod conflicts;
pub mod descriptor;
pub mod disambiguator;
pub mod error;
pub mod graph;
pub mod index;
pub mod matching;
pub mod model;
pub mod obfuscate;
pub mod schema;
pub mod store;
pub mod test_support;

// Re-export main types for convenience
pub use canonical::{canonicalize, CanonicalKey, FieldKey};
pub use config::{ConfigError, EngineConfig};
pub use conflicts::{ConflictPolicy, NameNormalizer};
pub use descriptor::{resolve, DisambiguationInfo};
pub use disambiguator::GraphDisambiguator;
pub use error::{DisambiguationError, Result};
pub use graph::{Edge, PropertyGraph};
pub use index::NodeIndex;
pub use matching::{DatabaseComparison, Matcher, Merging, SelfPruning};
pub use model::{Attributes, InstanceRef, Node, NodeId, Value};
pub use obfuscate::{IdObfuscator, InvalidId};
pub use schema::SchemaRegistry;
pub use store::{Condition, EntityQuery, EntityStore, MemoryStore, PersistedEntity};
