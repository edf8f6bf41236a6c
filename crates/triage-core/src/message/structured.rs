//! Structured payload attached to assistant messages.

use serde::{Deserialize, Serialize};

/// Server-assigned urgency classification of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum TriageLevel {
    /// No escalation.
    #[default]
    None,
    /// The care team should be notified.
    NotifyCareTeam,
    /// Urgent follow-up is required, same handling as `NotifyCareTeam`.
    Urgent,
    /// The patient must call emergency services.
    #[serde(rename = "call_911")]
    Call911,
}

impl TriageLevel {
    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriageLevel::None => "none",
            TriageLevel::NotifyCareTeam => "notify_care_team",
            TriageLevel::Urgent => "urgent",
            TriageLevel::Call911 => "call_911",
        }
    }
}

impl From<String> for TriageLevel {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "notify_care_team" => TriageLevel::NotifyCareTeam,
            "urgent" => TriageLevel::Urgent,
            "call_911" => TriageLevel::Call911,
            "none" | "" => TriageLevel::None,
            other => {
                tracing::warn!("Unknown triage level '{}', treating as none", other);
                TriageLevel::None
            }
        }
    }
}

/// A selectable option offered by a prompt.
///
/// The server sends either bare strings or `{label, value, category}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceOption {
    /// A bare label that doubles as its value.
    Plain(String),
    /// A labelled option with an explicit value and optional category.
    Detailed {
        label: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        category: Option<String>,
    },
}

impl ChoiceOption {
    /// Text shown to the patient.
    pub fn label(&self) -> &str {
        match self {
            ChoiceOption::Plain(label) => label,
            ChoiceOption::Detailed { label, .. } => label,
        }
    }

    /// Value sent back to the server when the option is chosen.
    pub fn value(&self) -> &str {
        match self {
            ChoiceOption::Plain(label) => label,
            ChoiceOption::Detailed { label, value, .. } => value.as_deref().unwrap_or(label),
        }
    }

    /// Category used to group symptom options, if any.
    pub fn category(&self) -> Option<&str> {
        match self {
            ChoiceOption::Plain(_) => None,
            ChoiceOption::Detailed { category, .. } => category.as_deref(),
        }
    }
}

/// A named group of symptoms for the symptom-select grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomGroup {
    pub name: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

/// Optional structured payload of a message.
///
/// Keys arrive camelCase from the agent; snake_case aliases are accepted
/// for history replayed through the REST bootstrap.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredData {
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    #[serde(default, alias = "max_selections")]
    pub max_selections: Option<u32>,
    #[serde(default, alias = "triage_level")]
    pub triage_level: Option<TriageLevel>,
    #[serde(default, alias = "is_complete")]
    pub is_complete: bool,
    #[serde(default, alias = "symptom_groups")]
    pub symptom_groups: Vec<SymptomGroup>,
    /// Interaction kind declared by the agent, overriding `message_type`.
    #[serde(default, alias = "frontend_type")]
    pub frontend_type: Option<String>,
}
