//! # Relay Configuration
//!
//! Layered configuration built with the `config` crate:
//!
//! 1. Compiled defaults (`RelayConfig::default()`)
//! 2. An optional file (TOML, YAML or JSON, chosen by extension)
//! 3. `RELAY_*` environment variables, e.g. `RELAY_MAX_BATCH_SIZE=50`
//!
//! `RELAY_RELATIONSHIP_FIELDS` is parsed as a comma separated list.

use crate::constants::{env, DEFAULT_MAX_BATCH_SIZE, DEFAULT_WORKER_THREAD_NAME};
use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum number of items the remote service accepts per call
    pub max_batch_size: usize,
    /// Name given to the dedicated worker thread
    pub worker_thread_name: String,
    /// Relationship fields requested during a roster refresh; empty skips the query
    pub relationship_fields: Vec<String>,
    pub environment: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            worker_thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
            relationship_fields: vec!["status".to_string()],
            environment: "development".to_string(),
        }
    }
}

impl RelayConfig {
    /// Load defaults overridden by process environment variables
    pub fn from_env() -> Result<Self> {
        Self::load(None::<&Path>)
    }

    /// Load defaults, then an optional file, then process environment variables
    pub fn load(path: Option<impl AsRef<Path>>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Same as [`RelayConfig::load`] but reads variables from `vars` instead of
    /// the process environment when given. Useful for tests.
    pub fn load_with_env(
        path: Option<impl AsRef<Path>>,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let path = path.as_ref();
            debug!(path = %path.display(), "Loading relay configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        // `separator` would otherwise also become the prefix separator
        let environment = config::Environment::with_prefix(env::CONFIG_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("relationship_fields")
            .source(vars);

        let config: RelayConfig = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(RelayError::Configuration(
                "max_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.worker_thread_name.trim().is_empty() {
            return Err(RelayError::Configuration(
                "worker_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_relationship_fields(mut self, fields: Vec<String>) -> Self {
        self.relationship_fields = fields;
        self
    }
}
