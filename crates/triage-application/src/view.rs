//! Render-ready snapshot of the conversation.
//!
//! Front ends draw from [`ConversationView`] only; every field is derived
//! from controller state at the moment the view is taken.

use std::time::Duration;

use triage_core::conversation::Affordance;
use triage_core::escalation::{EmergencyPanel, EscalationLevel};
use triage_core::message::Message;
use triage_core::session::Phase;
use triage_interaction::ConnectionState;

/// Connection and session notices shown above the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    /// First connection in progress; blocks input.
    Connecting,
    /// Dismissible; a reconnect is scheduled and a manual retry is offered.
    Reconnecting {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
    /// Reconnects exhausted; offer a manual retry.
    ConnectionLost,
    /// The portal rejected the token; the patient must sign in again.
    SignedOut,
}

impl Banner {
    pub fn is_dismissible(&self) -> bool {
        matches!(self, Banner::Reconnecting { .. })
    }

    pub fn offers_retry(&self) -> bool {
        matches!(self, Banner::Reconnecting { .. } | Banner::ConnectionLost)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    /// Position in the transcript, for `should_show_interactive_elements`.
    pub index: usize,
    pub message: Message,
    pub escalation: EscalationLevel,
    /// Whether the message's buttons, grid or scale are live.
    pub interactive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationView {
    pub session_id: String,
    pub phase: Phase,
    /// Renderable messages in order. Empty while the emergency panel is up.
    pub messages: Vec<MessageView>,
    pub affordance: Affordance,
    pub show_text_input: bool,
    pub composing: bool,
    pub connection: ConnectionState,
    pub banner: Option<Banner>,
    pub emergency: Option<EmergencyPanel>,
    /// Symptoms reported so far, across sessions.
    pub symptoms: Vec<String>,
    /// Last non-fatal notice from the server.
    pub notice: Option<String>,
}

impl ConversationView {
    /// Whether input must be blocked regardless of affordance.
    pub fn is_blocked(&self) -> bool {
        self.emergency.is_none()
            && matches!(self.banner, Some(Banner::Connecting) | Some(Banner::SignedOut))
    }
}
