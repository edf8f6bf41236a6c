//! Configuration model for the triage client.
//!
//! Loaded from TOML by the infrastructure layer; every field has a default
//! so an empty or missing file yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::assembler::DEFAULT_COMPLETION_PHRASE;

/// Where the bearer token is attached when opening the socket.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenPlacement {
    /// `?token=...` on the socket URL.
    #[default]
    QueryParam,
    /// `Cookie: access_token=...` on the upgrade request.
    Cookie,
}

/// Bounded linear reconnect policy.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): `attempt * base`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TriageConfig {
    /// Base URL of the portal REST API, e.g. `https://portal.example.org/api`.
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    /// Base URL for the socket. Absolute `ws(s)://`, absolute `http(s)://`
    /// or relative to `portal_origin`. Defaults to `api_base_url`.
    #[serde(default)]
    pub socket_base_url: Option<String>,
    /// Origin used to resolve relative bases.
    #[serde(default)]
    pub portal_origin: Option<String>,
    #[serde(default)]
    pub token_placement: TokenPlacement,
    /// IANA timezone deciding what "today" is for the session bootstrap.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    #[serde(default = "default_completion_phrase")]
    pub completion_phrase: String,
    #[serde(default = "default_emergency_number")]
    pub emergency_number: String,
    /// Overrides the default ledger location.
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

fn default_api_base() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_completion_phrase() -> String {
    DEFAULT_COMPLETION_PHRASE.to_string()
}

fn default_emergency_number() -> String {
    "911".to_string()
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base(),
            socket_base_url: None,
            portal_origin: None,
            token_placement: TokenPlacement::default(),
            timezone: default_timezone(),
            reconnect: ReconnectPolicy::default(),
            completion_phrase: default_completion_phrase(),
            emergency_number: default_emergency_number(),
            ledger_path: None,
        }
    }
}

impl TriageConfig {
    /// The base the socket URL is derived from.
    pub fn socket_base(&self) -> &str {
        self.socket_base_url.as_deref().unwrap_or(&self.api_base_url)
    }
}
