//! Infrastructure for the triage client: file storage, configuration,
//! platform paths and the portal REST client.

pub mod config_service;
pub mod credentials;
pub mod dto;
pub mod http_portal_client;
pub mod paths;
pub mod storage;
pub mod toml_symptom_ledger_repository;

pub use crate::config_service::ConfigService;
pub use crate::credentials::InMemoryCredentials;
pub use crate::http_portal_client::HttpPortalClient;
pub use crate::paths::TriagePaths;
pub use crate::toml_symptom_ledger_repository::TomlSymptomLedgerRepository;
