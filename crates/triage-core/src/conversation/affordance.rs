//! The interactive control a renderer should offer.

use crate::message::{ChoiceOption, SymptomGroup};

/// Lowercased phrase identifying the "last chemotherapy" question.
///
/// The agent does not tag this prompt structurally, so it is recognized by
/// text. Only the latest assistant message is checked.
pub const CHEMO_DATE_PHRASE: &str = "when was your last chemotherapy";

/// Derived, never stored: recomputed from the transcript on every change.
#[derive(Debug, Clone, PartialEq)]
pub enum Affordance {
    /// Full-takeover emergency panel replaces the message stream.
    EmergencyPanel,
    /// The check-in is complete; nothing left to answer.
    Finished,
    /// The assistant is composing or the user's answer is in flight.
    Waiting,
    /// Free-text box.
    TextInput,
    /// Date picker for the chemotherapy question.
    DatePicker,
    /// One-tap buttons.
    Choices { options: Vec<ChoiceOption> },
    /// Checkbox list with a submit button.
    MultiSelect {
        options: Vec<ChoiceOption>,
        max_selections: Option<u32>,
    },
    /// Feeling scale (emoji buttons).
    FeelingScale { options: Vec<ChoiceOption> },
    /// Grouped symptom grid.
    SymptomGrid {
        options: Vec<ChoiceOption>,
        groups: Vec<SymptomGroup>,
        max_selections: Option<u32>,
    },
    /// Display-only message; nothing to interact with.
    None,
}

impl Affordance {
    /// Whether this affordance lets the patient act right now.
    pub fn is_actionable(&self) -> bool {
        !matches!(
            self,
            Affordance::Finished | Affordance::Waiting | Affordance::None
        )
    }
}

/// Whether an assistant message is the chemotherapy date question.
pub fn is_chemo_date_prompt(content: &str) -> bool {
    content.to_lowercase().contains(CHEMO_DATE_PHRASE)
}
