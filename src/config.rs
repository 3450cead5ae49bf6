//! Engine configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

use crate::error::ConfigError;
use crate::rules::{KnownFields, Severity};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Dimension registry: names the rule tokenizer classifies as fields.
    pub known_fields: Vec<String>,

    /// Severity attached to rules compiled without an explicit effect.
    pub default_effect: Severity,

    /// Rewrite `feature <= 0.5` style splits to `feature is No/Yes` before evaluating.
    pub boolean_rewrite: bool,

    /// Records per chunk handed to a batch worker.
    pub batch_chunk_size: usize,

    /// Worker threads for batch evaluation; `0` uses the available parallelism.
    pub batch_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            known_fields: Vec::new(),
            default_effect: Severity::Moderate,
            boolean_rewrite: false,
            batch_chunk_size: 256,
            batch_threads: 0,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;

        if config.batch_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_chunk_size",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(config)
    }

    /// Field registry for rule expressions.
    ///
    /// `overrides` is a comma-separated list that replaces `known_fields`.
    /// An empty registry is rejected: no word would classify as a field.
    pub fn field_registry(&self, overrides: Option<&str>) -> Result<KnownFields, ConfigError> {
        let fields = match overrides {
            Some(list) => KnownFields::new(list.split(',').filter(|s| !s.trim().is_empty())),
            None => KnownFields::new(&self.known_fields),
        };
        if fields.is_empty() {
            return Err(ConfigError::Invalid {
                field: "known_fields",
                reason: "no field names given; pass --fields or set known_fields".to_string(),
            });
        }
        tracing::debug!(fields = fields.len(), "field registry ready");
        Ok(fields)
    }

    /// Batch options derived from this configuration.
    pub fn batch_options(&self) -> crate::BatchOptions {
        crate::BatchOptions { chunk_size: self.batch_chunk_size, threads: self.batch_threads }
    }
}
