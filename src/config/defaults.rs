//! Default constants for engine configuration.

/// Closed-vocabulary type whose unmatched nodes are invalid
pub const DEFAULT_SUBJECT_TYPE: &str = "subject";

/// Type whose display name is recomputed after a merge
pub const DEFAULT_PERSON_TYPE: &str = "person";

/// Bookkeeping relations that never count towards processing order
pub const DEFAULT_IGNORED_RELATIONS: [&str; 2] = ["same_as", "extra"];

/// Rows fetched by each ambiguity query, and the smallest accepted value:
/// fewer rows cannot tell one match from many.
pub const DEFAULT_PROBE_LIMIT: usize = 2;

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "DISAMBIG_";
