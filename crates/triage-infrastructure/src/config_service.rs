//! Configuration service implementation.
//!
//! Loads `TriageConfig` from `~/.config/triage-chat/config.toml` and layers
//! environment overrides on top. A missing file yields defaults.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use triage_core::config::TriageConfig;
use triage_core::error::{Result, TriageError};

use crate::paths::TriagePaths;

pub const ENV_API_BASE: &str = "TRIAGE_API_BASE";
pub const ENV_SOCKET_BASE: &str = "TRIAGE_SOCKET_BASE";
pub const ENV_TOKEN: &str = "TRIAGE_TOKEN";

/// Loads and caches the client configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<TriageConfig>>>,
}

impl ConfigService {
    /// Creates a service reading the default config file.
    pub fn new() -> Result<Self> {
        let path = TriagePaths::config_file().map_err(|e| TriageError::config(e.to_string()))?;
        Ok(Self::with_path(path))
    }

    /// Creates a service reading a custom config file.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the configuration, loading from file on first access.
    pub fn get_config(&self) -> Result<TriageConfig> {
        if let Ok(guard) = self.config.read()
            && let Some(cached) = guard.as_ref()
        {
            return Ok(cached.clone());
        }

        let mut loaded = Self::load_file(&self.path)?;
        apply_env_overrides(&mut loaded, |key| std::env::var(key).ok());

        if let Ok(mut guard) = self.config.write() {
            *guard = Some(loaded.clone());
        }
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        if let Ok(mut guard) = self.config.write() {
            *guard = None;
        }
    }

    /// The token supplied through the environment, if any.
    pub fn env_token() -> Option<String> {
        std::env::var(ENV_TOKEN)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    fn load_file(path: &Path) -> Result<TriageConfig> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "[ConfigService] No config at {}, using defaults",
                    path.display()
                );
                return Ok(TriageConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content)
            .map_err(|e| TriageError::config(format!("{}: {}", path.display(), e)))
    }
}

/// Applies `TRIAGE_*` overrides; blank values are ignored.
pub fn apply_env_overrides<F>(config: &mut TriageConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(api) = non_blank(ENV_API_BASE) {
        tracing::debug!("[ConfigService] {} overrides api_base_url", ENV_API_BASE);
        config.api_base_url = api;
    }
    if let Some(socket) = non_blank(ENV_SOCKET_BASE) {
        tracing::debug!("[ConfigService] {} overrides socket_base_url", ENV_SOCKET_BASE);
        config.socket_base_url = Some(socket);
    }
}
