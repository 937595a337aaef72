//! Configuration handling for schema_clone

use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{Error, Result};

/// Load configuration from a TOML file
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete schema_clone configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub comparison: ComparisonOptions,
    #[serde(default)]
    pub generator: MigrationGeneratorOptions,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Schema comparison behavior
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ComparisonOptions {
    /// Exclude comment-only changes in SQL bodies and expressions
    pub ignore_comments: bool,
    pub ignore_indexes: bool,
    pub ignore_policies: bool,
    pub ignore_extensions: bool,
    /// Glob patterns; matching object names (plain or qualified) are skipped
    pub custom_ignore_patterns: Vec<String>,
    /// Populate dependencies and priorities on each difference
    pub dependency_analysis: bool,
    pub source_label: String,
    pub target_label: String,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            ignore_comments: true,
            ignore_indexes: false,
            ignore_policies: false,
            ignore_extensions: false,
            custom_ignore_patterns: Vec::new(),
            dependency_analysis: true,
            source_label: "source".to_string(),
            target_label: "target".to_string(),
        }
    }
}

/// Migration script generation behavior
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MigrationGeneratorOptions {
    pub include_rollback: bool,
    pub validate_syntax: bool,
    /// Prefix each statement with a `--` description line
    pub add_comments: bool,
    /// Rows per batch for data-bearing work; feeds the duration estimate
    pub batch_size: u64,
    /// Advisory per-operation budget in milliseconds
    pub timeout_per_operation: Option<u64>,
    /// Prefer non-locking variants such as `CREATE INDEX CONCURRENTLY`
    pub safe_mode: bool,
}

impl Default for MigrationGeneratorOptions {
    fn default() -> Self {
        Self {
            include_rollback: true,
            validate_syntax: true,
            add_comments: false,
            batch_size: 1000,
            timeout_per_operation: None,
            safe_mode: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            stdout: true,
        }
    }
}

/// Health monitor thresholds
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Share of failed operations above which health is degraded
    pub max_failure_ratio: f64,
    /// Seconds without an update before an in-progress operation counts as stalled
    pub stall_after_secs: i64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            max_failure_ratio: 0.25,
            stall_after_secs: 900,
        }
    }
}
