//! CLI configuration
//!
//! Merges an optional TOML/JSON config file with `DRIFTWATCH_*`
//! environment variables. Policy rules are validated here, at load
//! time: a misspelled operator or metric reference fails the whole
//! load instead of being skipped quietly during evaluation.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use driftwatch_lib::PolicyRule;
use serde::Deserialize;

/// Driftwatch orchestrator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DriftwatchConfig {
    /// Log output format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Default log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of telemetry files read concurrently
    #[serde(default = "default_collector_threads")]
    pub collector_threads: usize,

    /// Entity type label attached to aggregated stats
    #[serde(default = "default_entity_type")]
    pub entity_type: String,

    /// Feature toggles for fixed policy rules and reporting
    #[serde(default)]
    pub feature_flags: BTreeMap<String, bool>,

    /// User-defined policy rules
    #[serde(default)]
    pub policy_rules: Vec<PolicyRule>,
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_collector_threads() -> usize {
    1
}

fn default_entity_type() -> String {
    "link".to_string()
}

impl Default for DriftwatchConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            collector_threads: default_collector_threads(),
            entity_type: default_entity_type(),
            feature_flags: BTreeMap::new(),
            policy_rules: Vec::new(),
        }
    }
}

impl DriftwatchConfig {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("DRIFTWATCH"));
        let settings = builder.build().context("Failed to read configuration")?;
        settings
            .try_deserialize()
            .context("Invalid driftwatch configuration")
    }
}
