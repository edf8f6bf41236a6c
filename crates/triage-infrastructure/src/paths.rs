//! Unified path management for triage-chat files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/triage-chat/         # Config directory
//! └── config.toml                # Client configuration
//!
//! ~/.local/share/triage-chat/    # Data directory
//! ├── symptom_ledger.toml        # Cross-session symptom ledger
//! └── logs/                      # Application logs
//!     └── triage.log.YYYY-MM-DD
//! ```

use std::path::PathBuf;
use thiserror::Error;

const APP_DIR: &str = "triage-chat";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    /// The platform config or data directory could not be determined.
    #[error("Cannot find {0} directory")]
    DirNotFound(&'static str),
}

pub struct TriagePaths;

impl TriagePaths {
    /// Returns the configuration directory (e.g., `~/.config/triage-chat/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::DirNotFound("config"))
    }

    /// Returns the data directory (e.g., `~/.local/share/triage-chat/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::DirNotFound("data"))
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn ledger_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("symptom_ledger.toml"))
    }

    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_app_dir() {
        // Headless CI may lack a home directory; only check shape when resolvable.
        if let (Ok(config), Ok(ledger), Ok(logs)) = (
            TriagePaths::config_file(),
            TriagePaths::ledger_file(),
            TriagePaths::logs_dir(),
        ) {
            assert!(config.ends_with("triage-chat/config.toml"));
            assert!(ledger.ends_with("triage-chat/symptom_ledger.toml"));
            assert!(logs.ends_with("triage-chat/logs"));
        }
    }
}
