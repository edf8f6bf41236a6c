//! Escalation classification and the emergency takeover model.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Message, TriageLevel};

/// How a message must be presented given its triage level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EscalationLevel {
    /// Normal rendering.
    Safe,
    /// Distinct inline styling; the conversation continues.
    Alert,
    /// Full-takeover emergency panel.
    Critical,
}

/// Maps a triage level to its presentation.
pub fn classify(level: TriageLevel) -> EscalationLevel {
    match level {
        TriageLevel::Call911 => EscalationLevel::Critical,
        TriageLevel::NotifyCareTeam | TriageLevel::Urgent => EscalationLevel::Alert,
        TriageLevel::None => EscalationLevel::Safe,
    }
}

/// The emergency panel that replaces the message stream.
///
/// It offers exactly two actions: call for help and acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyPanel {
    pub headline: String,
    /// Agent text explaining the emergency, when a message triggered it.
    pub body: String,
    /// Number dialed by the call action.
    pub call_number: String,
    pub call_label: String,
    pub acknowledge_label: String,
}

impl EmergencyPanel {
    pub fn new(call_number: impl Into<String>, message: Option<&Message>) -> Self {
        let call_number = call_number.into();
        let body = message
            .map(|m| m.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| {
                "Your answers suggest you may need emergency care right now.".to_string()
            });
        Self {
            headline: "Seek emergency help now".to_string(),
            body,
            call_label: format!("Call {}", call_number),
            call_number,
            acknowledge_label: "I understand".to_string(),
        }
    }
}

/// Records emergency events with the care team backend.
///
/// Calls are fire-and-forget from the conversation's point of view; a
/// failure here must never delay or hide the emergency panel.
#[async_trait]
pub trait EmergencyReporter: Send + Sync {
    async fn record_emergency(&self, session_id: &str, message: &Message) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageId, StructuredData};

    #[test]
    fn test_classify() {
        assert_eq!(classify(TriageLevel::Call911), EscalationLevel::Critical);
        assert_eq!(classify(TriageLevel::NotifyCareTeam), EscalationLevel::Alert);
        assert_eq!(classify(TriageLevel::Urgent), EscalationLevel::Alert);
        assert_eq!(classify(TriageLevel::None), EscalationLevel::Safe);
    }

    #[test]
    fn test_panel_uses_message_text() {
        let mut message = Message::streaming_assistant(MessageId::assigned("1"), "Call 911 now.");
        message.structured = Some(StructuredData {
            triage_level: Some(TriageLevel::Call911),
            ..Default::default()
        });
        let panel = EmergencyPanel::new("911", Some(&message));
        assert_eq!(panel.body, "Call 911 now.");
        assert_eq!(panel.call_label, "Call 911");

        let fallback = EmergencyPanel::new("112", None);
        assert!(!fallback.body.is_empty());
        assert_eq!(fallback.call_number, "112");
    }
}
