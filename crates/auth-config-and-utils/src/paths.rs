//! File system paths for the biometric session tools.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory under the home directory holding config and logs.
const BASE_DIR_NAME: &str = ".biometric-session";

#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.biometric-session)
    base_dir: PathBuf,
}

impl Paths {
    /// Paths rooted at `~/.biometric-session`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Paths rooted at a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// `--base-dir` if given, the home-relative default otherwise.
    pub fn resolve(base_dir: Option<PathBuf>) -> CoreResult<Self> {
        match base_dir {
            Some(dir) => Ok(Self::with_base_dir(dir)),
            None => Self::new(),
        }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Config file (~/.biometric-session/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Logs directory (~/.biometric-session/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Central JSONL log (~/.biometric-session/logs/session.jsonl).
    pub fn session_log_file(&self) -> PathBuf {
        self.logs_dir().join("session.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
