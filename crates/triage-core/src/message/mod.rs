//! Conversation message domain module.
//!
//! # Module Structure
//!
//! - `model`: Core message types (`Message`, `MessageId`, `Sender`, `MessageKind`)
//! - `structured`: Optional structured payload (`StructuredData`, `TriageLevel`)
//! - `transcript`: The ordered message sequence of one conversation (`Transcript`)

mod model;
mod structured;
mod transcript;

pub use model::{Message, MessageId, MessageKind, Sender};
pub use structured::{ChoiceOption, StructuredData, SymptomGroup, TriageLevel};
pub use transcript::Transcript;
