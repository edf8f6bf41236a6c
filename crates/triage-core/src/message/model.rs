//! Core message types.

use super::structured::{StructuredData, TriageLevel};

/// Identifier of a message in the conversation.
///
/// Server identifiers may be numeric or textual on the wire; both are
/// normalized to their string form so streamed fragments and complete
/// messages can be matched against each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// A locally-created message not yet acknowledged by the server.
    Pending,
    /// An identifier supplied by the server.
    Assigned(String),
}

impl MessageId {
    /// Creates a server-assigned identifier.
    pub fn assigned(id: impl Into<String>) -> Self {
        MessageId::Assigned(id.into())
    }

    /// Returns true for the optimistic placeholder.
    pub fn is_pending(&self) -> bool {
        matches!(self, MessageId::Pending)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageId::Pending => write!(f, "<pending>"),
            MessageId::Assigned(id) => write!(f, "{}", id),
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// Message from the patient.
    User,
    /// Message from the triage agent.
    Assistant,
    /// System-generated message.
    System,
}

impl Sender {
    /// Parses the wire representation. Unknown senders are treated as system.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "patient" => Sender::User,
            "assistant" | "ai" | "bot" | "agent" => Sender::Assistant,
            _ => Sender::System,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
            Sender::System => "system",
        }
    }
}

/// Declared interaction kind of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    PlainText,
    SingleChoicePrompt,
    MultiChoicePrompt,
    FeelingPrompt,
    SymptomSelectPrompt,
    TextResponse,
    ChoiceResponse,
    MultiChoiceResponse,
    FeelingResponse,
    TriageResult,
    DisclaimerScreen,
    EmergencyCheckScreen,
    EmergencyResult,
    SummaryScreen,
}

impl MessageKind {
    /// Parses a `message_type` value. Unrecognized kinds decode to plain text.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "text" | "plain_text" => MessageKind::PlainText,
            "single_choice" | "single_choice_prompt" | "buttons" => {
                MessageKind::SingleChoicePrompt
            }
            "multi_choice" | "multi_choice_prompt" | "multi_select" => {
                MessageKind::MultiChoicePrompt
            }
            "feeling" | "feeling_prompt" => MessageKind::FeelingPrompt,
            "symptom_select" | "symptom_select_prompt" => MessageKind::SymptomSelectPrompt,
            "text_response" => MessageKind::TextResponse,
            "choice_response" | "button_response" => MessageKind::ChoiceResponse,
            "multi_choice_response" | "multi_select_response" => MessageKind::MultiChoiceResponse,
            "feeling_response" => MessageKind::FeelingResponse,
            "triage_result" => MessageKind::TriageResult,
            "disclaimer" | "disclaimer_screen" => MessageKind::DisclaimerScreen,
            "emergency_check" | "emergency_check_screen" => MessageKind::EmergencyCheckScreen,
            "emergency_result" => MessageKind::EmergencyResult,
            "summary" | "summary_screen" => MessageKind::SummaryScreen,
            other => {
                tracing::debug!("Unknown message_type '{}', treating as plain text", other);
                MessageKind::PlainText
            }
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            MessageKind::PlainText => "text",
            MessageKind::SingleChoicePrompt => "single_choice",
            MessageKind::MultiChoicePrompt => "multi_choice",
            MessageKind::FeelingPrompt => "feeling",
            MessageKind::SymptomSelectPrompt => "symptom_select",
            MessageKind::TextResponse => "text_response",
            MessageKind::ChoiceResponse => "choice_response",
            MessageKind::MultiChoiceResponse => "multi_choice_response",
            MessageKind::FeelingResponse => "feeling_response",
            MessageKind::TriageResult => "triage_result",
            MessageKind::DisclaimerScreen => "disclaimer_screen",
            MessageKind::EmergencyCheckScreen => "emergency_check_screen",
            MessageKind::EmergencyResult => "emergency_result",
            MessageKind::SummaryScreen => "summary_screen",
        }
    }

    /// True for prompts answered through buttons, grids or scales
    /// rather than the free-text box.
    pub fn expects_structured_response(&self) -> bool {
        matches!(
            self,
            MessageKind::SingleChoicePrompt
                | MessageKind::MultiChoicePrompt
                | MessageKind::FeelingPrompt
                | MessageKind::SymptomSelectPrompt
        )
    }

    /// True for a plain free-text prompt.
    pub fn is_free_text(&self) -> bool {
        matches!(self, MessageKind::PlainText)
    }
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub kind: MessageKind,
    /// Display text, possibly with `**bold**`, line breaks and `---` rules.
    pub content: String,
    pub structured: Option<StructuredData>,
    /// Timestamp (ISO 8601). Server-assigned unless the message is pending.
    pub created_at: String,
    /// Set when the content was a symptom-extraction payload rather than
    /// display text. Such messages keep their place in the sequence but are
    /// not rendered.
    pub symptom_payload: bool,
}

impl Message {
    /// Creates the optimistic placeholder for something the user just did.
    pub fn pending_user(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::Pending,
            sender: Sender::User,
            kind,
            content: content.into(),
            structured: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            symptom_payload: false,
        }
    }

    /// Creates an assistant message from the first streamed fragment.
    pub fn streaming_assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::Assistant,
            kind: MessageKind::PlainText,
            content: content.into(),
            structured: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            symptom_payload: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_pending()
    }

    /// Triage level carried by the structured payload, `None` when absent.
    pub fn triage_level(&self) -> TriageLevel {
        self.structured
            .as_ref()
            .and_then(|s| s.triage_level)
            .unwrap_or_default()
    }

    /// Whether the agent flagged this message as the end of the protocol.
    pub fn declares_complete(&self) -> bool {
        self.structured.as_ref().is_some_and(|s| s.is_complete)
    }

    /// The `frontendType` override, if the agent supplied one.
    pub fn frontend_type(&self) -> Option<&str> {
        self.structured.as_ref().and_then(|s| s.frontend_type.as_deref())
    }

    /// The kind that decides which control answers this message:
    /// `frontendType` when present, otherwise `kind`.
    pub fn interaction_kind(&self) -> MessageKind {
        self.frontend_type()
            .map(MessageKind::from_wire)
            .unwrap_or(self.kind)
    }

    /// Whether this message should appear in the rendered stream.
    pub fn is_renderable(&self) -> bool {
        !self.symptom_payload
    }
}
