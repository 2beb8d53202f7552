//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Exit time recorded when a scheduled checkout closes a visit.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExitTimePolicy {
    /// Use the time the checkout was scheduled for.
    Scheduled,
    /// Use the time the batch actually ran.
    #[default]
    Processed,
}

/// Scheduled checkout processing configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Whether the background processing task runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between processing ticks.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Which instant becomes the visit exit time.
    #[serde(default)]
    pub exit_time_policy: ExitTimePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval_seconds(),
            exit_time_policy: ExitTimePolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Tick interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Purge of old, fully closed sessions.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfig {
    /// Days after a session ends before it is purged; 0 disables purging.
    #[serde(default)]
    pub days: u32,
}

fn default_true() -> bool {
    true
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_http_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    pub database_path: PathBuf,
    /// HTTP listen port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// HTTP listen address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Scheduled checkout processing.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Data retention.
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Socket address string the HTTP server binds to.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }

    fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(AppError::Config("database_path must not be empty".into()));
        }

        if self.scheduler.interval_seconds == 0 {
            return Err(AppError::Config(
                "scheduler.interval_seconds must be greater than zero".into(),
            ));
        }

        if self.bind_address.trim().is_empty() {
            return Err(AppError::Config("bind_address must not be empty".into()));
        }

        Ok(())
    }
}
