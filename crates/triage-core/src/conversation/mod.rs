//! Conversation state machine module.
//!
//! - `state_machine`: Phase derivation, affordance rules and the user action protocol
//! - `action`: User actions and their outbound encoding (`UserAction`)
//! - `affordance`: The control a renderer should offer (`Affordance`)

mod action;
mod affordance;
mod state_machine;

pub use action::{EMPTY_SELECTION_CONTENT, UserAction};
pub use affordance::{Affordance, CHEMO_DATE_PHRASE, is_chemo_date_prompt};
pub use state_machine::{ConversationStateMachine, StepOutcome};
