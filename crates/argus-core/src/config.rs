//! Run configuration, loaded from JSON.

use std::path::{Path, PathBuf};

use argus_explore::SearchConfig;
use argus_grammar::value::ValueConfig;
use argus_sandbox::SandboxConfig;
use serde::{Deserialize, Serialize};

use crate::limits::RunGoals;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which loop the tester drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Open-ended coverage-guided generation.
    #[default]
    Generate,
    /// Run the predefined tests once and compare outputs.
    Suite,
}

/// Where coverage comes from and how much of it is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// JSON report written by the coverage agent after each test.
    /// `None` runs without coverage feedback.
    pub report_path: Option<PathBuf>,
    pub remove_after_read: bool,
    /// Number of recent per-test snapshots retained.
    pub history_window: usize,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            report_path: None,
            remove_after_read: true,
            history_window: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: RunMode,
    pub search: SearchConfig,
    pub values: ValueConfig,
    pub sandbox: SandboxConfig,
    pub coverage: CoverageConfig,
    pub goals: RunGoals,
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub log_level: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Generate,
            search: SearchConfig::default(),
            values: ValueConfig::default(),
            sandbox: SandboxConfig::default(),
            coverage: CoverageConfig::default(),
            goals: RunGoals::default(),
            log_level: "info".to_string(),
        }
    }
}

impl RunConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = self.search.exploration_weight;
        if !w.is_finite() || w < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "exploration_weight must be finite and non-negative, got {w}"
            )));
        }
        if self.sandbox.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".into()));
        }
        if self.sandbox.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".into(),
            ));
        }
        if self.sandbox.begin_sentinel.trim().is_empty()
            || self.sandbox.begin_sentinel == self.sandbox.end_sentinel
        {
            return Err(ConfigError::Invalid(
                "watchdog sentinels must be non-empty and distinct".into(),
            ));
        }
        if self.coverage.history_window == 0 {
            return Err(ConfigError::Invalid(
                "history_window must be at least 1".into(),
            ));
        }
        if self.search.max_vector_len == 0 {
            return Err(ConfigError::Invalid(
                "max_vector_len must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
