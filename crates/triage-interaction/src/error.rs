//! Transport error type.

use thiserror::Error;
use triage_core::TriageError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No usable token; no connection attempt is made.
    #[error("cannot open the conversation channel without an access token")]
    MissingToken,

    #[error("invalid socket URL: {0}")]
    InvalidUrl(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("socket error: {0}")]
    Socket(String),

    /// `retry` was called with no connection to restart.
    #[error("no connection to retry")]
    NothingToRetry,
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        TransportError::InvalidUrl(err.to_string())
    }
}

impl From<TransportError> for TriageError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::MissingToken => TriageError::unauthorized(err.to_string()),
            TransportError::InvalidUrl(_) => TriageError::config(err.to_string()),
            TransportError::Connect(_)
            | TransportError::Socket(_)
            | TransportError::NothingToRetry => TriageError::transport(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
