//! In-process credential store.

use std::sync::{Arc, RwLock};

use triage_core::session::CredentialProvider;

/// Holds the bearer token for the lifetime of the process.
///
/// Seeded from the command line or `TRIAGE_TOKEN`; cleared when the
/// portal answers 401.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentials {
    token: Arc<RwLock<Option<String>>>,
}

impl InMemoryCredentials {
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|t| !t.trim().is_empty());
        Self {
            token: Arc::new(RwLock::new(token)),
        }
    }

    /// Replaces the token after the patient signs in again.
    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.into());
        }
    }
}

impl CredentialProvider for InMemoryCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.token.write() {
            if guard.take().is_some() {
                tracing::info!("[Credentials] Token cleared");
            }
        }
    }
}
