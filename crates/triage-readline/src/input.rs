//! Maps a line typed at the prompt to a command or a conversation action.

use chrono::NaiveDate;
use thiserror::Error;

use triage_core::conversation::{Affordance, UserAction};
use triage_core::message::{ChoiceOption, SymptomGroup};

/// Slash commands understood by the prompt.
pub const COMMANDS: &[&str] = &[
    "/ack", "/call", "/dismiss", "/help", "/new", "/quit", "/retry", "/symptoms",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Acknowledge the emergency panel and leave.
    Acknowledge,
    /// Show the number to call.
    Call,
    Dismiss,
    Help,
    New,
    Quit,
    Retry,
    Symptoms,
}

impl Command {
    fn parse(word: &str) -> Option<Self> {
        let command = match word {
            "/ack" => Command::Acknowledge,
            "/call" => Command::Call,
            "/dismiss" => Command::Dismiss,
            "/help" => Command::Help,
            "/new" => Command::New,
            "/quit" | "/exit" => Command::Quit,
            "/retry" => Command::Retry,
            "/symptoms" => Command::Symptoms,
            _ => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    Command(Command),
    Action(UserAction),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Unknown command: {0} (try /help)")]
    UnknownCommand(String),

    #[error("{0}")]
    NotAccepting(&'static str),

    #[error("Enter a number between 1 and {max}")]
    OutOfRange { max: usize },

    #[error("Choose at most {0}")]
    TooMany(u32),

    #[error("Enter the date as YYYY-MM-DD")]
    InvalidDate,
}

/// One numbered entry of a choice list: `(label, value)`.
pub type Choice = (String, String);

/// The numbered choices offered by an affordance, in display order.
///
/// For the symptom grid, explicit options win; otherwise the grouped
/// symptoms are flattened group by group.
pub fn choices(affordance: &Affordance) -> Vec<Choice> {
    match affordance {
        Affordance::Choices { options }
        | Affordance::FeelingScale { options }
        | Affordance::MultiSelect { options, .. } => from_options(options),
        Affordance::SymptomGrid {
            options, groups, ..
        } if options.is_empty() => from_groups(groups),
        Affordance::SymptomGrid { options, .. } => from_options(options),
        _ => Vec::new(),
    }
}

fn from_options(options: &[ChoiceOption]) -> Vec<Choice> {
    options
        .iter()
        .map(|o| (o.label().to_string(), o.value().to_string()))
        .collect()
}

fn from_groups(groups: &[SymptomGroup]) -> Vec<Choice> {
    groups
        .iter()
        .flat_map(|g| g.symptoms.iter())
        .map(|s| (s.clone(), s.clone()))
        .collect()
}

/// Interprets a line against the current affordance.
///
/// `allow_text` mirrors whether the free-text box would be shown; it lets
/// the patient type an answer instead of picking a numbered choice.
pub fn interpret(
    line: &str,
    affordance: &Affordance,
    allow_text: bool,
) -> Result<Input, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    if line.starts_with('/') {
        let word = line.split_whitespace().next().unwrap_or(line);
        return Command::parse(word)
            .map(Input::Command)
            .ok_or_else(|| InputError::UnknownCommand(word.to_string()));
    }

    let action = match affordance {
        Affordance::EmergencyPanel => {
            return Err(InputError::NotAccepting(
                "Emergency: use /call for the number or /ack to acknowledge",
            ));
        }
        Affordance::Finished => {
            return Err(InputError::NotAccepting(
                "Today's check-in is complete. Use /new to start another",
            ));
        }
        Affordance::Waiting => {
            return Err(InputError::NotAccepting("Waiting for the assistant"));
        }
        Affordance::None if !allow_text => {
            return Err(InputError::NotAccepting("Nothing to answer yet"));
        }
        Affordance::None | Affordance::TextInput => UserAction::Text(line.to_string()),
        Affordance::DatePicker => NaiveDate::parse_from_str(line, "%Y-%m-%d")
            .map(UserAction::DatePick)
            .map_err(|_| InputError::InvalidDate)?,
        Affordance::Choices { .. } => match pick_one(line, &choices(affordance))? {
            Some(value) => UserAction::Button(value),
            None if allow_text => UserAction::Text(line.to_string()),
            None => return Err(InputError::OutOfRange { max: choices(affordance).len() }),
        },
        Affordance::FeelingScale { .. } => match pick_one(line, &choices(affordance))? {
            Some(value) => UserAction::Feeling(value),
            None => return Err(InputError::OutOfRange { max: choices(affordance).len() }),
        },
        Affordance::MultiSelect { max_selections, .. }
        | Affordance::SymptomGrid { max_selections, .. } => {
            UserAction::MultiSelect(pick_many(line, &choices(affordance), *max_selections)?)
        }
    };
    Ok(Input::Action(action))
}

/// A single numbered pick or an exact label match; `None` when the line is
/// neither.
fn pick_one(line: &str, choices: &[Choice]) -> Result<Option<String>, InputError> {
    if let Ok(n) = line.parse::<usize>() {
        return choices
            .get(n.wrapping_sub(1))
            .map(|(_, value)| Some(value.clone()))
            .ok_or(InputError::OutOfRange { max: choices.len() });
    }
    Ok(choices
        .iter()
        .find(|(label, value)| label.eq_ignore_ascii_case(line) || value.eq_ignore_ascii_case(line))
        .map(|(_, value)| value.clone()))
}

/// Comma or space separated numbers. `0` or `none` submits an empty
/// selection.
fn pick_many(
    line: &str,
    choices: &[Choice],
    max_selections: Option<u32>,
) -> Result<Vec<String>, InputError> {
    if line == "0" || line.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }

    let mut picked: Vec<String> = Vec::new();
    for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let value = token
            .parse::<usize>()
            .ok()
            .and_then(|n| choices.get(n.wrapping_sub(1)))
            .map(|(_, value)| value.clone())
            .ok_or(InputError::OutOfRange { max: choices.len() })?;
        if !picked.contains(&value) {
            picked.push(value);
        }
    }

    if let Some(max) = max_selections
        && picked.len() > max as usize
    {
        return Err(InputError::TooMany(max));
    }
    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(values: &[&str]) -> Vec<ChoiceOption> {
        values.iter().map(|v| ChoiceOption::Plain(v.to_string())).collect()
    }

    #[test]
    fn test_commands_parse_anywhere() {
        let input = interpret("/retry now", &Affordance::Waiting, false).unwrap();
        assert_eq!(input, Input::Command(Command::Retry));
        assert_eq!(
            interpret("/bogus", &Affordance::Waiting, false),
            Err(InputError::UnknownCommand("/bogus".into()))
        );
    }

    #[test]
    fn test_choice_by_number_or_label() {
        let affordance = Affordance::Choices {
            options: plain(&["Yes", "No"]),
        };
        assert_eq!(
            interpret("2", &affordance, false).unwrap(),
            Input::Action(UserAction::Button("No".into()))
        );
        assert_eq!(
            interpret("yes", &affordance, false).unwrap(),
            Input::Action(UserAction::Button("Yes".into()))
        );
        assert_eq!(
            interpret("3", &affordance, false),
            Err(InputError::OutOfRange { max: 2 })
        );
    }

    #[test]
    fn test_choice_falls_back_to_text_when_allowed() {
        let affordance = Affordance::Choices {
            options: plain(&["Yes", "No"]),
        };
        assert_eq!(
            interpret("not sure", &affordance, true).unwrap(),
            Input::Action(UserAction::Text("not sure".into()))
        );
    }

    #[test]
    fn test_multi_select_dedups_and_respects_limit() {
        let affordance = Affordance::MultiSelect {
            options: plain(&["Nausea", "Fatigue", "Fever"]),
            max_selections: Some(2),
        };
        assert_eq!(
            interpret("1, 2 1", &affordance, false).unwrap(),
            Input::Action(UserAction::MultiSelect(vec!["Nausea".into(), "Fatigue".into()]))
        );
        assert_eq!(interpret("1,2,3", &affordance, false), Err(InputError::TooMany(2)));
        assert_eq!(
            interpret("none", &affordance, false).unwrap(),
            Input::Action(UserAction::MultiSelect(vec![]))
        );
    }

    #[test]
    fn test_symptom_grid_flattens_groups() {
        let affordance = Affordance::SymptomGrid {
            options: vec![],
            groups: vec![
                SymptomGroup {
                    name: "Stomach".into(),
                    symptoms: vec!["Nausea".into(), "Diarrhea".into()],
                },
                SymptomGroup {
                    name: "General".into(),
                    symptoms: vec!["Fatigue".into()],
                },
            ],
            max_selections: None,
        };
        assert_eq!(choices(&affordance).len(), 3);
        assert_eq!(
            interpret("3,1", &affordance, false).unwrap(),
            Input::Action(UserAction::MultiSelect(vec!["Fatigue".into(), "Nausea".into()]))
        );
    }

    #[test]
    fn test_date_picker_requires_iso_date() {
        assert_eq!(
            interpret("2026-10-01", &Affordance::DatePicker, true).unwrap(),
            Input::Action(UserAction::DatePick(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()))
        );
        assert_eq!(
            interpret("last week", &Affordance::DatePicker, true),
            Err(InputError::InvalidDate)
        );
    }

    #[test]
    fn test_input_blocked_while_waiting_or_in_emergency() {
        assert!(matches!(
            interpret("hello", &Affordance::Waiting, true),
            Err(InputError::NotAccepting(_))
        ));
        assert!(matches!(
            interpret("hello", &Affordance::EmergencyPanel, true),
            Err(InputError::NotAccepting(_))
        ));
    }
}
