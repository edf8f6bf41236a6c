//! Production wiring of the conversation controller.

use std::sync::Arc;

use triage_core::config::TriageConfig;
use triage_core::error::Result;
use triage_core::session::CredentialProvider;
use triage_infrastructure::{HttpPortalClient, TomlSymptomLedgerRepository};
use triage_interaction::{Transport, TransportOptions, TungsteniteConnector};

use crate::controller::{ConversationController, ConversationServices};

/// Builds a controller backed by the portal REST API, the TOML ledger file
/// and a WebSocket transport.
pub async fn build_controller(
    config: &TriageConfig,
    credentials: Arc<dyn CredentialProvider>,
) -> Result<ConversationController> {
    let portal = Arc::new(HttpPortalClient::new(
        config.api_base_url.clone(),
        Arc::clone(&credentials),
    ));
    let ledger_repository = match &config.ledger_path {
        Some(path) => TomlSymptomLedgerRepository::with_path(path.clone()),
        None => TomlSymptomLedgerRepository::new()?,
    };
    tracing::info!(
        "[Wiring] api={}, ledger={}",
        config.api_base_url,
        ledger_repository.path().display()
    );

    let services = ConversationServices {
        bootstrap: portal.clone(),
        gateway: portal.clone(),
        reporter: portal,
        ledger_repository: Arc::new(ledger_repository),
        credentials,
    };
    let transport = Transport::new(
        Arc::new(TungsteniteConnector::new()),
        TransportOptions::from_config(config),
    );

    Ok(ConversationController::new(services, transport, config).await)
}
