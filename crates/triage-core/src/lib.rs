//! Domain layer of the daily symptom-triage conversation engine.
//!
//! Everything here is synchronous and I/O free: message reassembly, the
//! conversation state machine, the symptom ledger and escalation
//! classification. Collaborators (REST bootstrap, persistence, emergency
//! reporting) are expressed as traits implemented elsewhere.

pub mod assembler;
pub mod config;
pub mod conversation;
pub mod error;
pub mod escalation;
pub mod ledger;
pub mod message;
pub mod protocol;
pub mod session;

// Re-export common error type
pub use error::TriageError;
