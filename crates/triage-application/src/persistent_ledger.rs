//! Symptom ledger with write-through persistence.

use std::sync::Arc;

use triage_core::ledger::{SymptomLedger, SymptomLedgerRepository};

/// The in-memory ledger plus its repository.
///
/// Every mutation is saved immediately. Persistence failures are logged
/// and never surface to the conversation.
pub struct PersistentLedger {
    ledger: SymptomLedger,
    repository: Arc<dyn SymptomLedgerRepository>,
}

impl PersistentLedger {
    /// Loads the stored ledger, starting empty if it cannot be read.
    pub async fn load(repository: Arc<dyn SymptomLedgerRepository>) -> Self {
        let ledger = match repository.load().await {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::warn!("[SymptomLedger] Failed to load, starting empty: {}", e);
                SymptomLedger::new()
            }
        };
        Self { ledger, repository }
    }

    pub fn ledger(&self) -> &SymptomLedger {
        &self.ledger
    }

    pub fn names(&self) -> &[String] {
        self.ledger.names()
    }

    /// Adds new names and persists if anything changed.
    pub async fn merge<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added = self.ledger.merge(names);
        if added > 0 {
            tracing::info!("[SymptomLedger] Merged {} new symptom(s)", added);
            self.persist().await;
        }
        added
    }

    /// Takes the bootstrap's authoritative list.
    pub async fn replace<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.ledger.clone();
        self.ledger.replace(names);
        if self.ledger != before {
            self.persist().await;
        }
    }

    /// Clears the ledger for a forced new conversation.
    pub async fn reset(&mut self) {
        self.ledger.reset();
        tracing::info!("[SymptomLedger] Reset");
        self.persist().await;
    }

    async fn persist(&self) {
        if let Err(e) = self.repository.save(&self.ledger).await {
            tracing::warn!("[SymptomLedger] Failed to persist: {}", e);
        }
    }
}
