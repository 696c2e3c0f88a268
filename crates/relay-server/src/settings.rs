//! Service settings.
//!
//! Three layers, later wins: compiled defaults, an optional JSON file, and
//! `RELAY_*` environment variables. Loaded once at startup and shared
//! read-only through [`crate::state::AppState`]; no ambient globals.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings loading errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON for this shape.
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override holds an unusable value.
    #[error("invalid setting {name}: {value}")]
    Invalid {
        /// Environment variable name.
        name: String,
        /// Rejected value.
        value: String,
    },
}

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// SQLite database path. `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    /// Base URL of the agent executor, no trailing slash.
    pub executor_url: String,
    /// Grace period for draining in-flight streams at shutdown.
    pub shutdown_grace_secs: u64,
    /// TTL assumed for sessions the registry has no record of.
    pub session_ttl_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_path: None,
            executor_url: "http://127.0.0.1:9090".into(),
            shutdown_grace_secs: 10,
            session_ttl_secs: 3600,
        }
    }
}

impl RelaySettings {
    /// Loads settings: defaults, then the file at `path` (when given), then
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };
        settings.apply_env_from(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    /// Applies `RELAY_*` overrides from `get`. Split out from [`Self::load`]
    /// so tests can inject variables without touching process state.
    pub fn apply_env_from(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        if let Some(v) = get("RELAY_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = get("RELAY_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("RELAY_EXECUTOR_URL") {
            self.executor_url = v;
        }
        if let Some(v) = get("RELAY_SHUTDOWN_GRACE_SECS") {
            self.shutdown_grace_secs = parse_secs("RELAY_SHUTDOWN_GRACE_SECS", &v)?;
        }
        if let Some(v) = get("RELAY_SESSION_TTL_SECS") {
            self.session_ttl_secs = parse_secs("RELAY_SESSION_TTL_SECS", &v)?;
        }
        Ok(())
    }

    /// Shutdown grace period as a [`Duration`].
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64, SettingsError> {
    value.parse().map_err(|_| SettingsError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
    })
}
