//! REST client for the care portal.
//!
//! Implements session bootstrap, the auxiliary care-team calls and
//! emergency reporting over `reqwest`. Every request carries the bearer
//! token from the `CredentialProvider`; a 401 clears it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use triage_core::error::{Result, TriageError};
use triage_core::escalation::EmergencyReporter;
use triage_core::message::Message;
use triage_core::session::{CareTeamGateway, ChatSession, CredentialProvider, SessionBootstrap};

use crate::dto::SessionBootstrapDto;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct FeelingRequest<'a> {
    feeling: &'a str,
}

#[derive(Debug, Serialize)]
struct ChemoLogRequest<'a> {
    date: String,
    chat_uuid: &'a str,
}

#[derive(Debug, Serialize)]
struct EmergencyRequest<'a> {
    message_id: String,
    triage_level: &'static str,
    content: &'a str,
}

/// HTTP client for the portal REST API.
#[derive(Clone)]
pub struct HttpPortalClient {
    client: Client,
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpPortalClient {
    pub fn new(api_base: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            api_base,
            credentials,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// Attaches the bearer token, failing early when signed out.
    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .credentials
            .token()
            .ok_or_else(|| TriageError::unauthorized("no access token available"))?;
        Ok(request.bearer_auth(token).timeout(REQUEST_TIMEOUT))
    }

    async fn execute(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|e| TriageError::collaborator(format!("{} failed: {}", what, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("[PortalClient] {} rejected with 401, clearing credentials", what);
            self.credentials.clear();
            return Err(TriageError::unauthorized(format!("{} returned 401", what)));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TriageError::collaborator(format!(
                "{} returned {}: {}",
                what, status, body
            )));
        }
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = self.execute(request, what).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TriageError::protocol(format!("{} returned invalid body: {}", what, e)))
    }

    async fn bootstrap(&self, request: RequestBuilder, what: &str) -> Result<ChatSession> {
        let dto: SessionBootstrapDto = self.execute_json(request, what).await?;
        tracing::info!(
            "[PortalClient] {}: session {} (state: {:?}, {} message(s), new: {})",
            what,
            dto.chat_uuid,
            dto.conversation_state,
            dto.messages.len(),
            dto.is_new_session
        );
        Ok(dto.into())
    }
}

#[async_trait]
impl SessionBootstrap for HttpPortalClient {
    async fn fetch_today(&self, timezone: &str) -> Result<ChatSession> {
        let request = self
            .client
            .get(self.endpoint("chat/session/today"))
            .query(&[("timezone", timezone)]);
        self.bootstrap(request, "fetch today's session").await
    }

    async fn start_new(&self, timezone: &str) -> Result<ChatSession> {
        let request = self
            .client
            .post(self.endpoint("chat/session/new"))
            .query(&[("timezone", timezone)]);
        self.bootstrap(request, "start new session").await
    }
}

#[async_trait]
impl CareTeamGateway for HttpPortalClient {
    async fn record_feeling(&self, session_id: &str, feeling: &str) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint(&format!("chat/{}/feeling", session_id)))
            .json(&FeelingRequest { feeling });
        self.execute(request, "record feeling").await?;
        tracing::debug!("[PortalClient] Recorded feeling for {}", session_id);
        Ok(())
    }

    async fn log_chemo_date(&self, session_id: &str, date: NaiveDate) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint("chemo/log"))
            .json(&ChemoLogRequest {
                date: date.format("%Y-%m-%d").to_string(),
                chat_uuid: session_id,
            });
        self.execute(request, "log chemo date").await?;
        tracing::debug!("[PortalClient] Logged chemo date {} for {}", date, session_id);
        Ok(())
    }
}

#[async_trait]
impl EmergencyReporter for HttpPortalClient {
    async fn record_emergency(&self, session_id: &str, message: &Message) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint(&format!("chat/{}/emergency", session_id)))
            .json(&EmergencyRequest {
                message_id: message.id.to_string(),
                triage_level: message.triage_level().as_str(),
                content: &message.content,
            });
        self.execute(request, "record emergency").await?;
        tracing::info!("[PortalClient] Emergency recorded for {}", session_id);
        Ok(())
    }
}
