//! Collaborator interfaces for session bootstrap and auxiliary REST calls.
//!
//! These are implemented over HTTP in the infrastructure crate; the
//! conversation engine only depends on the traits.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::ChatSession;
use crate::error::Result;

/// Supplies the initial history and phase of a conversation.
///
/// # Implementation Notes
///
/// Implementations must map an HTTP 401 to `TriageError::Unauthorized` so
/// the caller can clear credentials instead of retrying.
#[async_trait]
pub trait SessionBootstrap: Send + Sync {
    /// Fetches today's session, creating it if none exists yet.
    ///
    /// # Arguments
    ///
    /// * `timezone` - IANA timezone name used to decide what "today" is
    async fn fetch_today(&self, timezone: &str) -> Result<ChatSession>;

    /// Forces a fresh session for today, abandoning the current one.
    ///
    /// # Arguments
    ///
    /// * `timezone` - IANA timezone name used to decide what "today" is
    async fn start_new(&self, timezone: &str) -> Result<ChatSession>;
}

/// Auxiliary, fire-and-forget calls made while the patient answers.
#[async_trait]
pub trait CareTeamGateway: Send + Sync {
    /// Persists the feeling the patient tapped.
    async fn record_feeling(&self, session_id: &str, feeling: &str) -> Result<()>;

    /// Logs the date of the patient's last chemotherapy session.
    async fn log_chemo_date(&self, session_id: &str, date: NaiveDate) -> Result<()>;
}

/// Source of the patient's bearer token.
///
/// Token storage belongs to the surrounding portal; the engine only reads
/// the token and clears it when the portal rejects it.
pub trait CredentialProvider: Send + Sync {
    /// The current token, `None` when the patient is signed out.
    fn token(&self) -> Option<String>;

    /// Forgets the token after an authentication failure.
    fn clear(&self);
}
