//! Conversation use case.
//!
//! `ConversationController` wires session bootstrap, the transport, the
//! state machine, the symptom ledger and the escalation surface together.
//! It is owned by a single task: transport events and user actions are fed
//! to it one at a time, so conversation state needs no locking.

use std::sync::Arc;

use tokio::sync::mpsc;
use triage_core::assembler::{AssemblerEffect, MessageAssembler};
use triage_core::config::TriageConfig;
use triage_core::conversation::{ConversationStateMachine, UserAction};
use triage_core::error::{Result, TriageError};
use triage_core::escalation::{EmergencyPanel, EmergencyReporter, classify};
use triage_core::ledger::SymptomLedgerRepository;
use triage_core::session::{
    CareTeamGateway, ChatSession, CredentialProvider, Phase, SessionBootstrap,
};
use triage_interaction::{
    ConnectionHandle, ConnectionState, Transport, TransportError, TransportEvent,
    TransportEventKind,
};

use crate::escalation_surface::EscalationSurface;
use crate::persistent_ledger::PersistentLedger;
use crate::view::{Banner, ConversationView, MessageView};

/// Collaborators the controller talks to.
#[derive(Clone)]
pub struct ConversationServices {
    pub bootstrap: Arc<dyn SessionBootstrap>,
    pub gateway: Arc<dyn CareTeamGateway>,
    pub reporter: Arc<dyn EmergencyReporter>,
    pub ledger_repository: Arc<dyn SymptomLedgerRepository>,
    pub credentials: Arc<dyn CredentialProvider>,
}

/// What changed after handling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationUpdate {
    /// Event from an old connection generation; nothing changed.
    Stale,
    Connection(ConnectionState),
    /// A frame was applied to the conversation.
    Conversation {
        phase: Phase,
        phase_changed: bool,
        notice: Option<String>,
    },
    /// The emergency latch engaged on this frame.
    Emergency(EmergencyPanel),
    /// The portal rejected the token.
    SignedOut,
}

/// Shown when the channel dropped before the last answer was acknowledged.
pub const UNCONFIRMED_ANSWER_NOTICE: &str =
    "Your last answer may not have been received. Please answer again.";

enum Signal {
    AuthExpired,
}

/// Owned state of the running conversation.
pub struct ConversationController {
    services: ConversationServices,
    transport: Transport,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    signals_tx: mpsc::UnboundedSender<Signal>,
    signals: mpsc::UnboundedReceiver<Signal>,
    ledger: PersistentLedger,
    escalation: EscalationSurface,
    timezone: String,
    completion_phrase: String,
    max_attempts: u32,
    machine: Option<ConversationStateMachine>,
    handle: Option<ConnectionHandle>,
    banner: Option<Banner>,
    notice: Option<String>,
}

impl ConversationController {
    /// Creates a controller. Loads the persisted ledger; nothing is fetched
    /// or opened until [`start`](Self::start).
    pub async fn new(
        services: ConversationServices,
        transport: (Transport, mpsc::UnboundedReceiver<TransportEvent>),
        config: &TriageConfig,
    ) -> Self {
        let (transport, events) = transport;
        let (signals_tx, signals) = mpsc::unbounded_channel();
        let ledger = PersistentLedger::load(Arc::clone(&services.ledger_repository)).await;
        let escalation = EscalationSurface::new(
            Arc::clone(&services.reporter),
            config.emergency_number.clone(),
        );

        Self {
            services,
            transport,
            events,
            signals_tx,
            signals,
            ledger,
            escalation,
            timezone: config.timezone.clone(),
            completion_phrase: config.completion_phrase.clone(),
            max_attempts: config.reconnect.max_attempts,
            machine: None,
            handle: None,
            banner: None,
            notice: None,
        }
    }

    /// Fetches (or creates) today's session and opens the channel.
    pub async fn start(&mut self) -> Result<()> {
        let session = match self.services.bootstrap.fetch_today(&self.timezone).await {
            Ok(session) => session,
            Err(e) => return Err(self.on_failure(e)),
        };
        tracing::info!(
            "[Conversation] Started session {} at {}",
            session.session_id,
            session.phase
        );
        self.install(session).await
    }

    /// Abandons the current conversation and starts a fresh one. Also
    /// resets the symptom ledger.
    pub async fn start_new_conversation(&mut self) -> Result<()> {
        let session = match self.services.bootstrap.start_new(&self.timezone).await {
            Ok(session) => session,
            Err(e) => return Err(self.on_failure(e)),
        };
        tracing::info!("[Conversation] Forced new session {}", session.session_id);

        self.transport.shutdown();
        self.handle = None;
        self.ledger.reset().await;
        self.install(session).await
    }

    async fn install(&mut self, session: ChatSession) -> Result<()> {
        if !session.symptom_list.is_empty() {
            self.ledger.replace(&session.symptom_list).await;
        }
        let session_id = session.session_id.clone();
        let assembler = MessageAssembler::new(self.completion_phrase.clone());
        self.machine = Some(ConversationStateMachine::new(session, assembler));
        self.notice = None;
        self.open_channel(&session_id)
    }

    fn open_channel(&mut self, session_id: &str) -> Result<()> {
        let token = self.services.credentials.token();
        match self.transport.open(session_id, token.as_deref()) {
            Ok(handle) => {
                if self.transport.state() != ConnectionState::Open {
                    self.banner = Some(Banner::Connecting);
                }
                self.handle = Some(handle);
                Ok(())
            }
            Err(TransportError::MissingToken) => {
                tracing::warn!("[Conversation] No token, cannot open session {}", session_id);
                self.banner = Some(Banner::SignedOut);
                Err(TransportError::MissingToken.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Performs one user action: optimistic append, send, side effects.
    pub async fn submit(&mut self, action: UserAction) -> Result<()> {
        let Some(machine) = self.machine.as_mut() else {
            return Err(TriageError::internal("no conversation has been started"));
        };
        let transport_open = self.handle.as_ref().is_some_and(|h| self.transport.is_current(h))
            && self.transport.state() == ConnectionState::Open;

        let frame = machine.begin_user_action(&action, transport_open)?;
        let payload = match frame.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                machine.rollback_pending();
                return Err(e);
            }
        };

        let sent = match &self.handle {
            Some(handle) => self.transport.send(handle, payload).await,
            None => false,
        };
        if !sent {
            if let Some(machine) = self.machine.as_mut() {
                machine.rollback_pending();
            }
            return Err(TriageError::not_connected(
                "the answer could not be sent; check your connection and try again",
            ));
        }

        let session_id = self
            .machine
            .as_ref()
            .map(|m| m.session_id().to_string())
            .unwrap_or_default();
        match &action {
            UserAction::MultiSelect(selected) => {
                self.ledger.merge(selected).await;
            }
            UserAction::Feeling(feeling) => {
                let gateway = Arc::clone(&self.services.gateway);
                let feeling = feeling.trim().to_string();
                self.spawn_side_effect("record feeling", async move {
                    gateway.record_feeling(&session_id, &feeling).await
                });
            }
            UserAction::DatePick(date) => {
                let gateway = Arc::clone(&self.services.gateway);
                let date = *date;
                self.spawn_side_effect("log chemo date", async move {
                    gateway.log_chemo_date(&session_id, date).await
                });
            }
            UserAction::Text(_) | UserAction::Button(_) => {}
        }
        Ok(())
    }

    /// Runs a fire-and-forget REST call. Failures are logged; a 401 signs
    /// the patient out.
    fn spawn_side_effect<F>(&self, what: &'static str, call: F)
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let signals = self.signals_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = call.await {
                tracing::warn!("[Conversation] Failed to {}: {}", what, e);
                if e.is_unauthorized() {
                    let _ = signals.send(Signal::AuthExpired);
                }
            }
        });
    }

    /// Waits for the next transport event or signal and applies it.
    ///
    /// Returns `None` only if every event source has gone away.
    pub async fn next_update(&mut self) -> Option<ConversationUpdate> {
        tokio::select! {
            Some(signal) = self.signals.recv() => Some(self.handle_signal(signal)),
            event = self.events.recv() => match event {
                Some(event) => Some(self.handle_event(event).await),
                None => None,
            },
        }
    }

    fn handle_signal(&mut self, signal: Signal) -> ConversationUpdate {
        match signal {
            Signal::AuthExpired => {
                self.sign_out();
                ConversationUpdate::SignedOut
            }
        }
    }

    /// Applies one transport event. Events from stale generations are
    /// dropped.
    pub async fn handle_event(&mut self, event: TransportEvent) -> ConversationUpdate {
        if !self.handle.as_ref().is_some_and(|h| h == &event.handle)
            || !self.transport.is_current(&event.handle)
        {
            tracing::debug!(
                "[Conversation] Dropping event from stale generation {}",
                event.handle.generation
            );
            return ConversationUpdate::Stale;
        }

        match event.kind {
            TransportEventKind::Opened => {
                self.banner = None;
                ConversationUpdate::Connection(ConnectionState::Open)
            }
            TransportEventKind::Frame(raw) => self.apply_frame(&raw).await,
            TransportEventKind::Closed { code, reason } => {
                tracing::info!("[Conversation] Channel closed ({:?}): {}", code, reason);
                if let Some(machine) = self.machine.as_mut()
                    && machine.connection_lost()
                {
                    self.notice = Some(UNCONFIRMED_ANSWER_NOTICE.to_string());
                }
                ConversationUpdate::Connection(self.transport.state())
            }
            TransportEventKind::ReconnectScheduled { attempt, delay } => {
                self.banner = Some(Banner::Reconnecting {
                    attempt,
                    max_attempts: self.max_attempts,
                    delay,
                });
                ConversationUpdate::Connection(ConnectionState::Disconnected)
            }
            TransportEventKind::Failed { attempts } => {
                tracing::error!(
                    "[Conversation] Connection lost after {} reconnect attempt(s)",
                    attempts
                );
                self.banner = Some(Banner::ConnectionLost);
                ConversationUpdate::Connection(ConnectionState::Failed)
            }
        }
    }

    async fn apply_frame(&mut self, raw: &str) -> ConversationUpdate {
        let Some(machine) = self.machine.as_mut() else {
            return ConversationUpdate::Stale;
        };
        let outcome = machine.ingest(raw);
        let session_id = machine.session_id().to_string();

        let mut notice = None;
        match &outcome.effect {
            AssemblerEffect::Completed { new_symptoms, .. } if !new_symptoms.is_empty() => {
                self.ledger.merge(new_symptoms).await;
            }
            AssemblerEffect::ServerNotice { message } => {
                tracing::warn!("[Conversation] Server notice: {}", message);
                self.notice = Some(message.clone());
                notice = Some(message.clone());
            }
            AssemblerEffect::Ignored { reason } => {
                tracing::debug!("[Conversation] Ignored frame: {}", reason);
            }
            _ => {}
        }

        if let Some(message) = &outcome.emergency
            && let Some(panel) = self.escalation.on_emergency(&session_id, message)
        {
            return ConversationUpdate::Emergency(panel);
        }

        ConversationUpdate::Conversation {
            phase: outcome.phase,
            phase_changed: outcome.phase_changed,
            notice,
        }
    }

    /// Starts a fresh connection after reconnects were exhausted.
    pub fn retry_connection(&mut self) -> Result<()> {
        let Some(session_id) = self.machine.as_ref().map(|m| m.session_id().to_string()) else {
            return Err(TriageError::internal("no conversation has been started"));
        };
        match self.transport.retry() {
            Ok(handle) => {
                self.handle = Some(handle);
                self.banner = Some(Banner::Connecting);
                Ok(())
            }
            Err(TransportError::NothingToRetry) => self.open_channel(&session_id),
            Err(e) => Err(e.into()),
        }
    }

    /// Hides a dismissible banner.
    pub fn dismiss_banner(&mut self) {
        if self.banner.as_ref().is_some_and(Banner::is_dismissible) {
            self.banner = None;
        }
    }

    /// Closes the channel. The controller can be restarted with `start`.
    pub fn shutdown(&mut self) {
        self.transport.shutdown();
        self.handle = None;
        tracing::info!("[Conversation] Shut down");
    }

    fn on_failure(&mut self, error: TriageError) -> TriageError {
        if error.is_unauthorized() {
            self.sign_out();
        }
        error
    }

    fn sign_out(&mut self) {
        tracing::warn!("[Conversation] Access token rejected, signing out");
        self.services.credentials.clear();
        self.transport.shutdown();
        self.handle = None;
        self.banner = Some(Banner::SignedOut);
    }

    pub fn machine(&self) -> Option<&ConversationStateMachine> {
        self.machine.as_ref()
    }

    pub fn symptoms(&self) -> &[String] {
        self.ledger.names()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> Option<ConversationView> {
        let machine = self.machine.as_ref()?;

        let emergency = machine
            .is_emergency()
            .then(|| self.escalation.panel(machine.emergency_message()));

        let messages = if emergency.is_some() {
            Vec::new()
        } else {
            machine
                .transcript()
                .renderable()
                .map(|(index, message)| MessageView {
                    index,
                    message: message.clone(),
                    escalation: classify(message.triage_level()),
                    interactive: machine.should_show_interactive_elements(index),
                })
                .collect()
        };

        Some(ConversationView {
            session_id: machine.session_id().to_string(),
            phase: machine.phase(),
            messages,
            affordance: machine.affordance(),
            show_text_input: machine.should_show_text_input(),
            composing: machine.is_assistant_composing(),
            connection: self.transport.state(),
            banner: self.banner.clone(),
            emergency,
            symptoms: self.ledger.names().to_vec(),
            notice: self.notice.clone(),
        })
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        self.transport.shutdown();
    }
}
