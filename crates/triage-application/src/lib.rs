//! Application layer of the triage client.
//!
//! This crate provides the conversation use case that coordinates the
//! domain (state machine, ledger, escalation) with infrastructure (portal
//! REST client, ledger file) and the transport.

pub mod controller;
pub mod escalation_surface;
pub mod persistent_ledger;
pub mod view;
pub mod wiring;

pub use controller::{
    ConversationController, ConversationServices, ConversationUpdate, UNCONFIRMED_ANSWER_NOTICE,
};
pub use escalation_surface::EscalationSurface;
pub use persistent_ledger::PersistentLedger;
pub use view::{Banner, ConversationView, MessageView};
pub use wiring::build_controller;
