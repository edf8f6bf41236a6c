//! Chat session domain model.

use super::phase::Phase;
use crate::message::Message;

/// One conversation instance as supplied by the session bootstrap.
///
/// There is one session per calendar day per patient unless the patient
/// forces a new conversation, which replaces this value wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    /// Server identifier of the conversation (`chat_uuid`).
    pub session_id: String,
    /// Phase reported by the server when the session was fetched.
    pub phase: Phase,
    /// History in arrival order.
    pub messages: Vec<Message>,
    /// Authoritative symptom list for today's session.
    pub symptom_list: Vec<String>,
    /// Whether the server created the session for this request.
    pub is_new_session: bool,
}
