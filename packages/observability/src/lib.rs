//! # Observability
//!
//! Centralized tracing setup for the biometric session workspace.
//!
//! Binaries call [`init`] or [`init_with_config`] once at startup and then use
//! plain `tracing` macros. Every event is written as one JSON object per line
//! to `~/.biometric-session/logs/session.jsonl`:
//!
//! - `tail -f ~/.biometric-session/logs/session.jsonl | jq` to follow a run
//! - filter with `RUST_LOG`, e.g. `RUST_LOG=biometric_auth_session=debug`
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("biometric-session-sim").ok();
//!     tracing::info!("simulator started");
//! }
//! ```

mod file_writer;
mod json_layer;

pub use file_writer::{CentralLogWriter, WriterFactory};
pub use json_layer::{JsonLayer, LogEntry};

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// How much detail reaches the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObservabilityMode {
    /// Every field, plus source file and line.
    #[default]
    DevVerbose,
    /// Secret-bearing fields redacted, no source locations.
    ProdMetadataOnly,
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every log line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info"). `RUST_LOG` takes precedence.
    pub default_level: String,

    /// Log file path. Defaults to `~/.biometric-session/logs/session.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,

    pub mode: ObservabilityMode,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
            mode: ObservabilityMode::DevVerbose,
        }
    }
}

/// Errors raised while installing the subscriber.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Default central log file location.
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".biometric-session")
        .join("logs")
        .join("session.jsonl")
}

/// Initialize with default settings.
pub fn init(service_name: &str) -> Result<PathBuf, InitError> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize the global subscriber. Returns the log file in use.
pub fn init_with_config(config: LogConfig) -> Result<PathBuf, InitError> {
    let log_path = config.log_path.clone().unwrap_or_else(default_log_path);

    let writer = CentralLogWriter::new(&log_path).map_err(|source| InitError::LogFile {
        path: log_path.clone(),
        source,
    })?;

    let json_layer = JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
        .with_mode(config.mode);

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter(&config.default_level)))
        .with(stderr_layer)
        .try_init()
        .map_err(|_| InitError::AlreadyInitialized)?;

    tracing::info!(
        log_path = %log_path.display(),
        service = %config.service_name,
        "observability initialized"
    );
    Ok(log_path)
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

pub use tracing::{debug, error, info, instrument, trace, warn, Level};
