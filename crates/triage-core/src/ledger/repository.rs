//! Symptom ledger repository trait.

use super::model::SymptomLedger;
use crate::error::Result;

/// An abstract repository for the persisted symptom ledger.
///
/// The ledger outlives any single session, so it is stored apart from the
/// in-memory conversation and survives a reload.
#[async_trait::async_trait]
pub trait SymptomLedgerRepository: Send + Sync {
    /// Loads the stored ledger.
    ///
    /// # Returns
    ///
    /// - `Ok(SymptomLedger)`: The stored ledger, empty if nothing is stored yet
    /// - `Err(TriageError)`: Error if retrieval fails
    async fn load(&self) -> Result<SymptomLedger>;

    /// Saves the ledger, replacing the stored copy.
    ///
    /// # Arguments
    ///
    /// * `ledger` - The ledger to save
    async fn save(&self, ledger: &SymptomLedger) -> Result<()>;
}
