//! Application configuration.

use duet_core::matching::ScoreWeights;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable policy for the chat use case.
///
/// Everything here is policy, not core correctness: the coordinator and
/// relay gate behave identically under any of these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Scoring weights handed to the match scorer
    #[serde(default)]
    pub weights: ScoreWeights,
    /// Seconds in `searching` before the fallback offer is surfaced
    #[serde(default = "default_search_wait_secs")]
    pub search_wait_secs: u64,
    /// Report count at which a user is auto-banned
    #[serde(default = "default_report_ban_threshold")]
    pub report_ban_threshold: u32,
    /// Length of an auto-ban
    #[serde(default = "default_ban_duration_hours")]
    pub ban_duration_hours: i64,
    /// Backoff before the single retry of a transient store failure
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_search_wait_secs() -> u64 {
    30
}

fn default_report_ban_threshold() -> u32 {
    5
}

fn default_ban_duration_hours() -> i64 {
    24
}

fn default_retry_backoff_ms() -> u64 {
    150
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            search_wait_secs: default_search_wait_secs(),
            report_ban_threshold: default_report_ban_threshold(),
            ban_duration_hours: default_ban_duration_hours(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl ChatConfig {
    /// Parses a configuration from TOML text. Missing fields take defaults.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
