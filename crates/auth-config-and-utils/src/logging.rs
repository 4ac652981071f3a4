//! Logging initialization.
//!
//! Wraps the observability crate: structured JSONL goes to
//! `<base dir>/logs/session.jsonl`, with an optional stderr copy.

use observability::{InitError, LogConfig, ObservabilityMode};
use std::path::PathBuf;

/// Environment variable selecting `prod` or `dev` observability.
const OBS_MODE_ENV: &str = "BIOMETRIC_SESSION_OBS_MODE";

/// Default service name written into every log line.
const DEFAULT_SERVICE_NAME: &str = "biometric-session";

/// Initialize logging with the default service name.
///
/// `level` is the default filter; `RUST_LOG` takes precedence. Returns the log
/// file in use.
pub fn init_logging(level: &str, log_path: Option<PathBuf>) -> Result<PathBuf, InitError> {
    init_logging_for_service(DEFAULT_SERVICE_NAME, level, log_path)
}

/// Initialize logging with a custom service name.
pub fn init_logging_for_service(
    service_name: &str,
    level: &str,
    log_path: Option<PathBuf>,
) -> Result<PathBuf, InitError> {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path,
        also_stderr: true,
        mode: observability_mode_from_env(),
    })
}

/// Read the observability mode from the environment; dev unless told otherwise.
fn observability_mode_from_env() -> ObservabilityMode {
    mode_from_value(std::env::var(OBS_MODE_ENV).ok().as_deref())
}

fn mode_from_value(raw: Option<&str>) -> ObservabilityMode {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("prod") | Some("production") => ObservabilityMode::ProdMetadataOnly,
        _ => ObservabilityMode::DevVerbose,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_value_variants() {
        assert_eq!(mode_from_value(None), ObservabilityMode::DevVerbose);
        assert_eq!(mode_from_value(Some("dev")), ObservabilityMode::DevVerbose);
        assert_eq!(
            mode_from_value(Some("PROD")),
            ObservabilityMode::ProdMetadataOnly
        );
        assert_eq!(
            mode_from_value(Some(" production ")),
            ObservabilityMode::ProdMetadataOnly
        );
    }
}
