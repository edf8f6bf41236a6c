#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::mpsc;
use triage_application::{ConversationController, ConversationServices, ConversationUpdate};
use triage_core::config::TriageConfig;
use triage_core::error::{Result, TriageError};
use triage_core::escalation::EmergencyReporter;
use triage_core::ledger::{SymptomLedger, SymptomLedgerRepository};
use triage_core::message::Message;
use triage_core::protocol::WireMessage;
use triage_core::session::{CareTeamGateway, ChatSession, CredentialProvider, Phase, SessionBootstrap};
use triage_infrastructure::InMemoryCredentials;
use triage_interaction::testing::{MemoryConnector, MemoryPeer};
use triage_interaction::{ConnectionState, Transport, TransportOptions};

pub fn wire(value: Value) -> Message {
    serde_json::from_value::<WireMessage>(value).unwrap().into()
}

pub fn session(id: &str, phase: Phase, messages: Vec<Message>, symptoms: &[&str]) -> ChatSession {
    ChatSession {
        session_id: id.to_string(),
        phase,
        messages,
        symptom_list: symptoms.iter().map(|s| s.to_string()).collect(),
        is_new_session: false,
    }
}

#[derive(Default)]
pub struct FakePortal {
    pub today: Mutex<Option<ChatSession>>,
    pub next_new: Mutex<Option<ChatSession>>,
    pub feelings: Mutex<Vec<(String, String)>>,
    pub chemo_dates: Mutex<Vec<(String, NaiveDate)>>,
    pub emergencies: Mutex<Vec<(String, String)>>,
    pub reject_feelings: Mutex<bool>,
}

#[async_trait]
impl SessionBootstrap for FakePortal {
    async fn fetch_today(&self, _timezone: &str) -> Result<ChatSession> {
        self.today
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TriageError::collaborator("no session"))
    }

    async fn start_new(&self, _timezone: &str) -> Result<ChatSession> {
        self.next_new
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TriageError::collaborator("no new session"))
    }
}

#[async_trait]
impl CareTeamGateway for FakePortal {
    async fn record_feeling(&self, session_id: &str, feeling: &str) -> Result<()> {
        if *self.reject_feelings.lock().unwrap() {
            return Err(TriageError::unauthorized("record feeling returned 401"));
        }
        self.feelings
            .lock()
            .unwrap()
            .push((session_id.to_string(), feeling.to_string()));
        Ok(())
    }

    async fn log_chemo_date(&self, session_id: &str, date: NaiveDate) -> Result<()> {
        self.chemo_dates
            .lock()
            .unwrap()
            .push((session_id.to_string(), date));
        Ok(())
    }
}

#[async_trait]
impl EmergencyReporter for FakePortal {
    async fn record_emergency(&self, session_id: &str, message: &Message) -> Result<()> {
        self.emergencies
            .lock()
            .unwrap()
            .push((session_id.to_string(), message.id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLedgerRepository {
    pub stored: Mutex<SymptomLedger>,
}

#[async_trait]
impl SymptomLedgerRepository for MemoryLedgerRepository {
    async fn load(&self) -> Result<SymptomLedger> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, ledger: &SymptomLedger) -> Result<()> {
        *self.stored.lock().unwrap() = ledger.clone();
        Ok(())
    }
}

pub struct Harness {
    pub controller: ConversationController,
    pub peers: mpsc::UnboundedReceiver<MemoryPeer>,
    pub connector: MemoryConnector,
    pub portal: Arc<FakePortal>,
    pub ledger: Arc<MemoryLedgerRepository>,
    pub credentials: Arc<InMemoryCredentials>,
}

pub async fn harness(today: ChatSession) -> Harness {
    let portal = Arc::new(FakePortal::default());
    *portal.today.lock().unwrap() = Some(today);
    let ledger = Arc::new(MemoryLedgerRepository::default());
    let credentials = Arc::new(InMemoryCredentials::new(Some("tok".to_string())));

    let config = TriageConfig {
        socket_base_url: Some("ws://portal.test/api".to_string()),
        ..TriageConfig::default()
    };
    let (connector, peers) = MemoryConnector::new();
    let transport = Transport::new(
        Arc::new(connector.clone()),
        TransportOptions::from_config(&config),
    );

    let credential_provider: Arc<dyn CredentialProvider> = credentials.clone();
    let services = ConversationServices {
        bootstrap: portal.clone(),
        gateway: portal.clone(),
        reporter: portal.clone(),
        ledger_repository: ledger.clone(),
        credentials: credential_provider,
    };
    let controller = ConversationController::new(services, transport, &config).await;

    Harness {
        controller,
        peers,
        connector,
        portal,
        ledger,
        credentials,
    }
}

impl Harness {
    /// Starts the conversation and waits for the channel to open.
    pub async fn start_open(&mut self) -> MemoryPeer {
        self.controller.start().await.unwrap();
        assert_eq!(
            self.controller.next_update().await,
            Some(ConversationUpdate::Connection(ConnectionState::Open))
        );
        self.peers.recv().await.unwrap()
    }

    pub async fn next_update(&mut self) -> ConversationUpdate {
        self.controller.next_update().await.unwrap()
    }
}
