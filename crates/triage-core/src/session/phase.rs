//! Phases of the triage protocol.

use crate::message::{Message, MessageKind};

/// The conversation's current step in the fixed triage protocol.
///
/// `Completed` and `Emergency` are terminal; only a forced new conversation
/// leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Disclaimer,
    EmergencyCheck,
    SymptomSelect,
    /// Follow-up questions; `n` counts the dialog prompts asked so far.
    Dialog(u32),
    Summary,
    Completed,
    Emergency,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Emergency)
    }

    /// Parses the `conversation_state` reported by the session bootstrap.
    ///
    /// Returns `None` for values this client does not know.
    pub fn from_conversation_state(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "DISCLAIMER" => Some(Phase::Disclaimer),
            "EMERGENCY_CHECK" => Some(Phase::EmergencyCheck),
            "SYMPTOM_SELECT" | "SYMPTOM_SELECTION" => Some(Phase::SymptomSelect),
            "DIALOG" | "FOLLOW_UP" | "CONVERSATION" | "QUESTIONS" => Some(Phase::Dialog(0)),
            "SUMMARY" => Some(Phase::Summary),
            "COMPLETED" | "COMPLETE" | "DONE" => Some(Phase::Completed),
            "EMERGENCY" => Some(Phase::Emergency),
            _ => None,
        }
    }

    /// Maps a `structured.frontendType` override to a phase. Dialog phases
    /// come back with `n = 0`; the caller fills in the count.
    pub fn from_frontend_type(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "disclaimer" => Some(Phase::Disclaimer),
            "emergency_check" => Some(Phase::EmergencyCheck),
            "symptom_select" | "symptom_selector" => Some(Phase::SymptomSelect),
            "summary" | "triage_result" => Some(Phase::Summary),
            "text" | "dialog" | "question" | "single_choice" | "multi_choice" | "feeling"
            | "buttons" => Some(Phase::Dialog(0)),
            _ => None,
        }
    }

    /// Maps a message kind to the phase it belongs to.
    pub fn from_kind(kind: MessageKind) -> Self {
        match kind {
            MessageKind::DisclaimerScreen => Phase::Disclaimer,
            MessageKind::EmergencyCheckScreen | MessageKind::EmergencyResult => {
                Phase::EmergencyCheck
            }
            MessageKind::SymptomSelectPrompt => Phase::SymptomSelect,
            MessageKind::SummaryScreen | MessageKind::TriageResult => Phase::Summary,
            _ => Phase::Dialog(0),
        }
    }

    /// The phase an assistant message declares, preferring `frontendType`.
    pub fn declared_by(message: &Message) -> Self {
        message
            .frontend_type()
            .and_then(Phase::from_frontend_type)
            .unwrap_or_else(|| Phase::from_kind(message.kind))
    }

    /// Wire name, matching the bootstrap's `conversation_state`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Disclaimer => "DISCLAIMER",
            Phase::EmergencyCheck => "EMERGENCY_CHECK",
            Phase::SymptomSelect => "SYMPTOM_SELECT",
            Phase::Dialog(_) => "DIALOG",
            Phase::Summary => "SUMMARY",
            Phase::Completed => "COMPLETED",
            Phase::Emergency => "EMERGENCY",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Dialog(n) => write!(f, "DIALOG({})", n),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
