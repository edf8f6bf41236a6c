//! Error types for the triage conversation engine.

use thiserror::Error;

/// A shared error type for the entire triage workspace.
///
/// Every crate maps its failures into one of these variants so callers can
/// branch on the taxonomy (transport, protocol, authentication, ...) without
/// knowing which layer produced the error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriageError {
    /// The persistent channel failed or could not be opened.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation required an open channel.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// A frame or payload did not match the wire protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Credentials are missing, expired or were rejected by the portal.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// A REST collaborator answered with an unexpected status.
    #[error("Collaborator request failed: {0}")]
    Collaborator(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A user action was refused by the conversation state machine.
    #[error("Action rejected: {0}")]
    ActionRejected(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TriageError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a NotConnected error
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected(message.into())
    }

    /// Creates a Protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Creates a Collaborator error
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an ActionRejected error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::ActionRejected(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this error must end the session and force re-authentication.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Check if this error is recoverable by reconnecting the channel.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NotConnected(_))
    }

    /// Check if this is a protocol error
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Check if this is a rejected user action
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::ActionRejected(_))
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for TriageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for TriageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for TriageError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for TriageError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for TriageError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid URL: {}", err))
    }
}

/// Conversion from anyhow::Error (used at the binary edge)
impl From<anyhow::Error> for TriageError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, TriageError>`.
pub type Result<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: TriageError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, TriageError::Serialization { ref format, .. } if format == "JSON"));
    }

    #[test]
    fn test_predicates() {
        assert!(TriageError::unauthorized("401").is_unauthorized());
        assert!(TriageError::transport("reset").is_transport());
        assert!(TriageError::not_connected("closed").is_transport());
        assert!(!TriageError::protocol("bad frame").is_transport());
        assert!(TriageError::rejected("pending").is_rejected());
    }
}
