//! TOML-based SymptomLedgerRepository implementation.

use std::path::PathBuf;

use async_trait::async_trait;
use triage_core::error::{Result, TriageError};
use triage_core::ledger::{SymptomLedger, SymptomLedgerRepository};

use crate::dto::SymptomLedgerDto;
use crate::paths::TriagePaths;
use crate::storage::AtomicTomlFile;

/// Stores the symptom ledger in its own TOML file.
///
/// Responsibilities:
/// - Load/save the ledger through `AtomicTomlFile`
/// - Convert between `SymptomLedgerDto` and `SymptomLedger`
///
/// File I/O runs on the blocking pool so callers on the runtime never stall.
#[derive(Clone)]
pub struct TomlSymptomLedgerRepository {
    file: AtomicTomlFile<SymptomLedgerDto>,
}

impl TomlSymptomLedgerRepository {
    /// Creates a repository at the default location
    /// (`~/.local/share/triage-chat/symptom_ledger.toml`).
    pub fn new() -> Result<Self> {
        let path = TriagePaths::ledger_file().map_err(|e| TriageError::config(e.to_string()))?;
        Ok(Self::with_path(path))
    }

    /// Creates a repository with a custom path (config override, tests).
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }
}

#[async_trait]
impl SymptomLedgerRepository for TomlSymptomLedgerRepository {
    async fn load(&self) -> Result<SymptomLedger> {
        let file = self.file.clone();
        let loaded = tokio::task::spawn_blocking(move || file.load())
            .await
            .map_err(|e| TriageError::internal(format!("ledger load task failed: {}", e)))??;

        let ledger = loaded.map(SymptomLedger::from).unwrap_or_default();
        tracing::debug!("[LedgerRepository] Loaded {} symptom(s)", ledger.len());
        Ok(ledger)
    }

    async fn save(&self, ledger: &SymptomLedger) -> Result<()> {
        let file = self.file.clone();
        let dto = SymptomLedgerDto::from(ledger);
        let count = dto.names.len();
        tokio::task::spawn_blocking(move || file.save(&dto))
            .await
            .map_err(|e| TriageError::internal(format!("ledger save task failed: {}", e)))??;

        tracing::debug!("[LedgerRepository] Saved {} symptom(s)", count);
        Ok(())
    }
}
