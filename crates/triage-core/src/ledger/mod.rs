//! Symptom ledger domain module.
//!
//! - `model`: The deduplicated set of reported symptom names (`SymptomLedger`)
//! - `repository`: Repository trait for ledger persistence

mod model;
mod repository;

pub use model::SymptomLedger;
pub use repository::SymptomLedgerRepository;
