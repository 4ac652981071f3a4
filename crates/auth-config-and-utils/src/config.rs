//! Configuration for the session runtime and tools.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default bound of a session's event queue.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;

/// By default a session whose handles are all dropped is force-cancelled.
pub const DEFAULT_CANCEL_ON_HANDLE_DROP: bool = true;

/// Environment variable overriding `log_level`.
pub const LOG_LEVEL_ENV: &str = "BIOMETRIC_SESSION_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Maximum number of events buffered per session.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    /// Force-cancel a live session when nobody can post to it any more.
    #[serde(default = "default_cancel_on_handle_drop")]
    pub cancel_on_handle_drop: bool,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_event_queue_capacity() -> usize {
    DEFAULT_EVENT_QUEUE_CAPACITY
}

fn default_cancel_on_handle_drop() -> bool {
    DEFAULT_CANCEL_ON_HANDLE_DROP
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            cancel_on_handle_drop: DEFAULT_CANCEL_ON_HANDLE_DROP,
        }
    }
}

impl Config {
    /// Load from the config file if present, falling back to defaults, then
    /// apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            debug!(path = %config_path.display(), "Loading config file");
            Self::load_from_file(&config_path)?
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Self::default()
        };
        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file as pretty JSON.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        self.validate()?;
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.event_queue_capacity == 0 {
            return Err(CoreError::Config(
                "event_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Only `log_level` can be overridden from the environment.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(log_level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.log_level = log_level.trim().to_string();
        }
    }
}
