//! Dashboard configuration loaded from TOML.
//!
//! ```toml
//! base_url = "http://localhost:8080"
//! refresh_interval_ms = 1000
//! range = 60
//! granularity = "m"
//! mode = "tabular"
//!
//! [[rules]]
//! source_ref = "app.events"
//! value_field = "latency"
//! granularities = ["h", "m"]
//! ```
//!
//! A rule's granularities may also be given as the flag record
//! `{ Month = false, Day = true, ... }`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use metricboard_core::domain::index_rules;
use metricboard_core::{Granularity, Rule};

/// Largest window the backend will serve in one request.
pub const MAX_RANGE: usize = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid dashboard TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which backend route feeds the chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// `/tabular` point stream, aligned onto the live window.
    #[default]
    Tabular,
    /// `/data` bucket documents, materialized.
    Bucketed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    pub base_url: String,

    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Ticks per chart window.
    #[serde(default = "default_range")]
    pub range: usize,

    #[serde(default = "default_granularity")]
    pub granularity: Granularity,

    #[serde(default)]
    pub mode: FetchMode,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_refresh_interval_ms() -> u64 {
    1000
}

fn default_range() -> usize {
    60
}

fn default_granularity() -> Granularity {
    Granularity::Minute
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl DashboardConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate. Rule indices are assigned by position.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: DashboardConfig = toml::from_str(content)?;
        index_rules(&mut config.rules);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.range == 0 {
            return Err(ConfigError::Invalid("range must be positive".into()));
        }
        if self.range > MAX_RANGE {
            return Err(ConfigError::Invalid(format!(
                "range {} exceeds the backend limit of {MAX_RANGE}",
                self.range
            )));
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid("refresh_interval_ms must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        for rule in &self.rules {
            if rule.value_field.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "rule {} has an empty value_field",
                    rule.index
                )));
            }
            if rule.supported_granularities.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "rule '{}' supports no granularity",
                    rule.value_field
                )));
            }
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Rules that can be charted at `granularity`.
    pub fn rules_for(&self, granularity: Granularity) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.supports(granularity))
            .cloned()
            .collect()
    }
}
