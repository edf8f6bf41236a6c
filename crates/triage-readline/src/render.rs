//! Terminal rendering of the conversation view.

use std::collections::HashMap;

use colored::{ColoredString, Colorize};

use triage_application::{Banner, MessageView};
use triage_core::conversation::Affordance;
use triage_core::escalation::{EmergencyPanel, EscalationLevel};
use triage_core::message::{MessageId, Sender};

use crate::input::choices;
use crate::markup::{self, Line, Span};

const RULE_WIDTH: usize = 40;

/// What to print for one message after a view update.
#[derive(Debug, PartialEq)]
pub enum Output<'a> {
    /// First sighting: header plus the full content.
    Message(&'a MessageView),
    /// More streamed text for a message already on screen.
    Continue(&'a str),
}

/// Tracks how much of each message is already on screen so streamed
/// fragments print as they arrive and nothing prints twice.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: HashMap<MessageId, usize>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything printed; used when a new session starts.
    pub fn reset(&mut self) {
        self.printed.clear();
    }

    pub fn pending<'a>(&mut self, messages: &'a [MessageView]) -> Vec<Output<'a>> {
        let mut out = Vec::new();
        for view in messages {
            // Optimistic answers are already echoed by the prompt.
            if view.message.is_pending() {
                continue;
            }
            let content = view.message.content.as_str();
            match self.printed.get(&view.message.id).copied() {
                None => {
                    self.printed.insert(view.message.id.clone(), content.len());
                    out.push(Output::Message(view));
                }
                Some(shown) if content.len() > shown => {
                    if let Some(rest) = content.get(shown..) {
                        out.push(Output::Continue(rest));
                    }
                    self.printed.insert(view.message.id.clone(), content.len());
                }
                Some(_) => {}
            }
        }
        out
    }
}

pub fn print_outputs(outputs: &[Output<'_>]) {
    for output in outputs {
        match output {
            Output::Message(view) => print_message(view),
            Output::Continue(text) => println!("{}", text.bright_blue()),
        }
    }
}

pub fn print_message(view: &MessageView) {
    let message = &view.message;
    let header = match message.sender {
        Sender::User => "[You]".green(),
        Sender::Assistant => "[Care Assistant]".bright_magenta(),
        Sender::System => "[System]".bright_black(),
    };
    if view.escalation == EscalationLevel::Alert {
        println!("{} {}", header, "! Your care team will be notified".yellow().bold());
    } else {
        println!("{}", header);
    }

    for line in markup::parse(&message.content) {
        match line {
            Line::Rule => println!("{}", "─".repeat(RULE_WIDTH).bright_black()),
            Line::Text(spans) => {
                let rendered: Vec<String> = spans
                    .into_iter()
                    .map(|span| style_span(span, message.sender, view.escalation).to_string())
                    .collect();
                println!("{}", rendered.concat());
            }
        }
    }
    println!();
}

fn style_span(span: Span, sender: Sender, escalation: EscalationLevel) -> ColoredString {
    let (text, bold) = match span {
        Span::Plain(text) => (text, false),
        Span::Bold(text) => (text, true),
    };
    let styled = match (escalation, sender) {
        (EscalationLevel::Alert, _) => text.yellow(),
        (_, Sender::User) => text.green(),
        (_, Sender::Assistant) => text.bright_blue(),
        (_, Sender::System) => text.bright_black(),
    };
    if bold { styled.bold() } else { styled }
}

/// Describes the control the patient should use next.
pub fn print_affordance(affordance: &Affordance, show_text_input: bool) {
    match affordance {
        Affordance::Choices { .. } | Affordance::FeelingScale { .. } => {
            print_numbered(affordance);
            let hint = if show_text_input {
                "Enter a number, or type your answer."
            } else {
                "Enter a number."
            };
            println!("{}", hint.bright_black());
        }
        Affordance::MultiSelect { max_selections, .. }
        | Affordance::SymptomGrid { max_selections, .. } => {
            if let Affordance::SymptomGrid { options, groups, .. } = affordance
                && options.is_empty()
            {
                let mut n = 0;
                for group in groups {
                    println!("{}", group.name.bold());
                    for symptom in &group.symptoms {
                        n += 1;
                        println!("  {} {}", format!("{:>2}.", n).cyan(), symptom);
                    }
                }
            } else {
                print_numbered(affordance);
            }
            let limit = max_selections
                .map(|m| format!(" (up to {})", m))
                .unwrap_or_default();
            println!(
                "{}",
                format!("Enter numbers separated by commas{}, or 0 for none.", limit).bright_black()
            );
        }
        Affordance::DatePicker => {
            println!("{}", "Enter the date as YYYY-MM-DD.".bright_black());
        }
        Affordance::Finished => {
            println!(
                "{}",
                "Today's check-in is complete. Use /new to start another.".bright_green()
            );
        }
        Affordance::TextInput
        | Affordance::Waiting
        | Affordance::EmergencyPanel
        | Affordance::None => {}
    }
}

fn print_numbered(affordance: &Affordance) {
    for (i, (label, _)) in choices(affordance).iter().enumerate() {
        println!("  {} {}", format!("{:>2}.", i + 1).cyan(), label);
    }
}

pub fn print_banner(banner: &Banner) {
    let text = match banner {
        Banner::Connecting => "Connecting...".bright_black(),
        Banner::Reconnecting {
            attempt,
            max_attempts,
            delay,
        } => format!(
            "Connection interrupted. Reconnecting in {}s (attempt {} of {}). /retry now or /dismiss.",
            delay.as_secs(),
            attempt,
            max_attempts
        )
        .yellow(),
        Banner::ConnectionLost => "Connection lost. Type /retry to reconnect.".red(),
        Banner::SignedOut => "Your session has expired. Please sign in again.".red().bold(),
    };
    println!("{}", text);
}

pub fn print_emergency(panel: &EmergencyPanel) {
    let bar = "═".repeat(RULE_WIDTH).red().bold();
    println!();
    println!("{}", bar);
    println!("{}", panel.headline.to_uppercase().white().on_red().bold());
    println!();
    println!("{}", panel.body);
    println!();
    println!(
        "{}   {}",
        format!("/call  {}", panel.call_label).red().bold(),
        format!("/ack  {}", panel.acknowledge_label).bright_black()
    );
    println!("{}", bar);
    println!();
}

pub fn print_symptoms(symptoms: &[String]) {
    if symptoms.is_empty() {
        println!("{}", "No symptoms reported yet.".bright_black());
    } else {
        println!("{} {}", "Reported symptoms:".bold(), symptoms.join(", "));
    }
}

pub fn print_help() {
    println!("{}", "Commands:".bold());
    for (command, text) in [
        ("/retry", "reconnect after the connection was lost"),
        ("/dismiss", "hide the reconnecting notice"),
        ("/new", "start a new check-in"),
        ("/symptoms", "list symptoms reported so far"),
        ("/call", "show the emergency number"),
        ("/ack", "acknowledge the emergency notice and exit"),
        ("/quit", "exit"),
    ] {
        println!("  {} {}", format!("{:<10}", command).bright_cyan(), text.bright_black());
    }
}

pub fn print_notice(text: &str) {
    println!("{}", text.yellow());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red());
}
