//! Engine configuration.
//!
//! Configuration is loaded with precedence: Env vars > Config file > Defaults
//!
//! # Example config file (disambig.toml)
//! ```toml
//! schema = "/etc/disambig/schema.json"
//! ignored_relations = ["same_as", "extra"]
//! subject_type = "subject"
//! person_type = "person"
//! probe_limit = 2
//! ```

mod defaults;

pub use defaults::*;

use crate::error::Result as EngineResult;
use crate::schema::SchemaRegistry;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Schema registry file (JSON); the built-in scholarly schema if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,
    /// Relations excluded from the processing-order weight
    pub ignored_relations: Vec<String>,
    /// Type for which a missing database match is invalid input
    pub subject_type: String,
    /// Type whose `name` is recomputed after a merge
    pub person_type: String,
    /// Row cap of each ambiguity query
    pub probe_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema: None,
            ignored_relations: DEFAULT_IGNORED_RELATIONS
                .iter()
                .map(|r| r.to_string())
                .collect(),
            subject_type: DEFAULT_SUBJECT_TYPE.to_string(),
            person_type: DEFAULT_PERSON_TYPE.to_string(),
            probe_limit: DEFAULT_PROBE_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Load configuration with precedence: Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(EngineConfig::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_limit < DEFAULT_PROBE_LIMIT {
            return Err(ConfigError {
                message: format!(
                    "probe_limit must be at least {}, got {}",
                    DEFAULT_PROBE_LIMIT, self.probe_limit
                ),
            });
        }
        Ok(())
    }

    /// The configured schema registry.
    pub fn registry(&self) -> EngineResult<SchemaRegistry> {
        match &self.schema {
            Some(path) => SchemaRegistry::load(path),
            None => SchemaRegistry::scholarly(),
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}
