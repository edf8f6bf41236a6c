//! User actions and their outbound encoding.

use chrono::NaiveDate;

use crate::error::{Result, TriageError};
use crate::message::MessageKind;
use crate::protocol::{OutboundFrame, UserMessageType};

/// Content sent when the patient submits a multi-select with nothing ticked.
pub const EMPTY_SELECTION_CONTENT: &str = "None";

/// Something the patient did in the conversation view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Free text typed into the input box.
    Text(String),
    /// A single button tapped; carries the option value.
    Button(String),
    /// A multi-select or symptom-grid submission.
    MultiSelect(Vec<String>),
    /// A tap on the feeling scale.
    Feeling(String),
    /// A date chosen in the chemotherapy date picker.
    DatePick(NaiveDate),
}

impl UserAction {
    pub fn message_type(&self) -> UserMessageType {
        match self {
            UserAction::Text(_) | UserAction::DatePick(_) => UserMessageType::Text,
            UserAction::Button(_) => UserMessageType::ButtonResponse,
            UserAction::MultiSelect(_) => UserMessageType::MultiSelectResponse,
            UserAction::Feeling(_) => UserMessageType::FeelingResponse,
        }
    }

    /// Kind of the optimistic placeholder shown for this action.
    pub fn pending_kind(&self) -> MessageKind {
        match self {
            UserAction::Text(_) | UserAction::DatePick(_) => MessageKind::TextResponse,
            UserAction::Button(_) => MessageKind::ChoiceResponse,
            UserAction::MultiSelect(_) => MessageKind::MultiChoiceResponse,
            UserAction::Feeling(_) => MessageKind::FeelingResponse,
        }
    }

    /// The `content` string carried by the outbound frame.
    ///
    /// # Errors
    ///
    /// Returns `ActionRejected` for blank text, buttons or feelings.
    pub fn content(&self) -> Result<String> {
        match self {
            UserAction::Text(text) | UserAction::Button(text) | UserAction::Feeling(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(TriageError::rejected("cannot send an empty answer"));
                }
                Ok(trimmed.to_string())
            }
            UserAction::MultiSelect(selected) => {
                let names: Vec<&str> = selected
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect();
                if names.is_empty() {
                    Ok(EMPTY_SELECTION_CONTENT.to_string())
                } else {
                    Ok(names.join(", "))
                }
            }
            UserAction::DatePick(date) => Ok(date.format("%Y-%m-%d").to_string()),
        }
    }

    pub fn to_frame(&self) -> Result<OutboundFrame> {
        Ok(OutboundFrame::user_message(self.message_type(), self.content()?))
    }

    /// Symptom names to merge into the ledger for this action.
    pub fn selected_symptoms(&self) -> &[String] {
        match self {
            UserAction::MultiSelect(selected) => selected,
            _ => &[],
        }
    }
}
