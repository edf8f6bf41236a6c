use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use triage_application::{Banner, ConversationController, ConversationUpdate, build_controller};
use triage_core::conversation::Affordance;
use triage_infrastructure::{ConfigService, InMemoryCredentials, TriagePaths};

mod helper;
mod input;
mod markup;
mod render;

use helper::CliHelper;
use input::{Command, Input};
use render::TranscriptPrinter;

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Daily symptom check-in with your care team", long_about = None)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// IANA timezone reported to the portal (e.g. America/New_York)
    #[arg(long)]
    timezone: Option<String>,

    /// Portal access token; falls back to TRIAGE_TOKEN
    #[arg(long)]
    token: Option<String>,

    /// Start a fresh check-in instead of resuming today's
    #[arg(long)]
    new: bool,
}

/// Lines from the blocking readline thread.
enum ReadEvent {
    Line(String),
    Interrupted,
    Eof,
    Failed(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Writes logs to a daily file so they never interleave with the chat.
fn init_tracing() -> Result<WorkerGuard> {
    let logs_dir = TriagePaths::logs_dir()?;
    std::fs::create_dir_all(&logs_dir)?;
    let appender = tracing_appender::rolling::daily(&logs_dir, "triage.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(guard)
}

/// Runs rustyline on its own thread; it blocks on the terminal.
fn spawn_reader(tx: mpsc::UnboundedSender<ReadEvent>) {
    std::thread::spawn(move || {
        let mut rl = match Editor::<CliHelper, DefaultHistory>::new() {
            Ok(rl) => rl,
            Err(e) => {
                let _ = tx.send(ReadEvent::Failed(e.to_string()));
                return;
            }
        };
        rl.set_helper(Some(CliHelper::new()));

        loop {
            let event = match rl.readline("> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    ReadEvent::Line(line)
                }
                Err(ReadlineError::Interrupted) => ReadEvent::Interrupted,
                Err(ReadlineError::Eof) => ReadEvent::Eof,
                Err(e) => ReadEvent::Failed(e.to_string()),
            };
            let last = matches!(event, ReadEvent::Eof | ReadEvent::Failed(_));
            if tx.send(event).is_err() || last {
                break;
            }
        }
    });
}

/// Terminal session state: what has been printed and what to do with the
/// next line.
struct App {
    controller: ConversationController,
    printer: TranscriptPrinter,
    emergency_number: String,
    last_banner: Option<Banner>,
    last_affordance: Option<Affordance>,
    emergency_shown: bool,
}

impl App {
    fn new(controller: ConversationController, emergency_number: String) -> Self {
        Self {
            controller,
            printer: TranscriptPrinter::new(),
            emergency_number,
            last_banner: None,
            last_affordance: None,
            emergency_shown: false,
        }
    }

    fn forget_screen(&mut self) {
        self.printer.reset();
        self.last_banner = None;
        self.last_affordance = None;
        self.emergency_shown = false;
    }

    /// Prints whatever changed since the last refresh.
    fn refresh(&mut self) {
        let Some(view) = self.controller.view() else {
            return;
        };

        if let Some(panel) = &view.emergency {
            if !self.emergency_shown {
                render::print_emergency(panel);
                self.emergency_shown = true;
            }
            return;
        }

        if view.banner != self.last_banner {
            if let Some(banner) = &view.banner {
                render::print_banner(banner);
            }
            self.last_banner = view.banner.clone();
        }

        let outputs = self.printer.pending(&view.messages);
        render::print_outputs(&outputs);

        if self.last_affordance.as_ref() != Some(&view.affordance) {
            render::print_affordance(&view.affordance, view.show_text_input);
            self.last_affordance = Some(view.affordance.clone());
        }
    }

    fn on_update(&mut self, update: ConversationUpdate) {
        match update {
            ConversationUpdate::Stale => return,
            ConversationUpdate::Conversation {
                notice: Some(notice),
                ..
            } => render::print_notice(&notice),
            ConversationUpdate::Emergency(panel) => {
                tracing::warn!("[Cli] Emergency panel shown");
                render::print_emergency(&panel);
                self.emergency_shown = true;
            }
            ConversationUpdate::Connection(_)
            | ConversationUpdate::Conversation { .. }
            | ConversationUpdate::SignedOut => {}
        }
        self.refresh();
    }

    async fn on_line(&mut self, line: &str) -> Flow {
        let Some(view) = self.controller.view() else {
            return Flow::Continue;
        };

        match input::interpret(line, &view.affordance, view.show_text_input) {
            Ok(Input::Empty) => {}
            Ok(Input::Command(command)) => return self.run_command(command).await,
            Ok(Input::Action(_)) if view.is_blocked() => {
                render::print_notice("Not connected yet. Please wait.");
            }
            Ok(Input::Action(action)) => {
                if let Err(e) = self.controller.submit(action).await {
                    tracing::debug!("[Cli] Action not sent: {}", e);
                    render::print_error(&format!("Could not send: {}", e));
                }
            }
            Err(e) => render::print_notice(&e.to_string()),
        }
        self.refresh();
        Flow::Continue
    }

    async fn run_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Quit => return Flow::Quit,
            Command::Help => render::print_help(),
            Command::Symptoms => render::print_symptoms(self.controller.symptoms()),
            Command::Dismiss => self.controller.dismiss_banner(),
            Command::Retry => {
                if let Err(e) = self.controller.retry_connection() {
                    render::print_error(&format!("Retry failed: {}", e));
                }
            }
            Command::New => match self.controller.start_new_conversation().await {
                Ok(()) => {
                    println!("{}", "Starting a new check-in...".bright_green());
                    self.forget_screen();
                }
                Err(e) => render::print_error(&format!("Could not start a new check-in: {}", e)),
            },
            Command::Call => {
                println!(
                    "{}",
                    format!("Call {} now.", self.emergency_number).red().bold()
                );
            }
            Command::Acknowledge => {
                if self.emergency_shown {
                    println!("{}", "Please get help now. Closing the check-in.".red());
                    return Flow::Quit;
                }
                render::print_notice("Nothing to acknowledge.");
            }
        }
        self.refresh();
        Flow::Continue
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing()?;

    let config_service = match cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new()?,
    };
    let mut config = config_service.get_config()?;
    if let Some(timezone) = cli.timezone {
        config.timezone = timezone;
    }

    let token = cli.token.or_else(ConfigService::env_token);
    if token.is_none() {
        render::print_error("No access token. Pass --token or set TRIAGE_TOKEN.");
    }
    let credentials = Arc::new(InMemoryCredentials::new(token));

    println!("{}", "=== Daily Check-in ===".bright_magenta().bold());
    println!("{}", "Type /help for commands.".bright_black());
    println!();

    let mut controller = build_controller(&config, credentials).await?;
    let started = if cli.new {
        controller.start_new_conversation().await
    } else {
        controller.start().await
    };
    if let Err(e) = started {
        if e.is_unauthorized() {
            render::print_banner(&Banner::SignedOut);
        }
        return Err(e.into());
    }

    let mut app = App::new(controller, config.emergency_number.clone());
    app.refresh();

    let (line_tx, mut lines) = mpsc::unbounded_channel();
    spawn_reader(line_tx);

    loop {
        tokio::select! {
            update = app.controller.next_update() => match update {
                Some(update) => app.on_update(update),
                None => {
                    render::print_error("The conversation channel closed.");
                    break;
                }
            },
            event = lines.recv() => match event {
                Some(ReadEvent::Line(line)) => {
                    if app.on_line(&line).await == Flow::Quit {
                        break;
                    }
                }
                Some(ReadEvent::Interrupted) => {
                    println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
                }
                Some(ReadEvent::Failed(e)) => {
                    render::print_error(&format!("Input error: {}", e));
                    break;
                }
                Some(ReadEvent::Eof) | None => break,
            },
        }
    }

    app.controller.shutdown();
    println!("{}", "Goodbye!".bright_green());
    Ok(())
}
