//! Emergency escalation side effects.

use std::collections::HashSet;
use std::sync::Arc;

use triage_core::escalation::{EmergencyPanel, EmergencyReporter};
use triage_core::message::Message;

/// Turns an emergency latch into a panel and a one-time care-team report.
pub struct EscalationSurface {
    reporter: Arc<dyn EmergencyReporter>,
    call_number: String,
    reported: HashSet<String>,
}

impl EscalationSurface {
    pub fn new(reporter: Arc<dyn EmergencyReporter>, call_number: impl Into<String>) -> Self {
        Self {
            reporter,
            call_number: call_number.into(),
            reported: HashSet::new(),
        }
    }

    pub fn call_number(&self) -> &str {
        &self.call_number
    }

    /// Builds the emergency panel; cheap and side-effect free.
    pub fn panel(&self, message: Option<&Message>) -> EmergencyPanel {
        EmergencyPanel::new(self.call_number.clone(), message)
    }

    /// Handles a freshly engaged emergency latch.
    ///
    /// Reporting runs on a spawned task and at most once per session; the
    /// returned panel never waits on it. Returns `None` if this session was
    /// already escalated.
    pub fn on_emergency(&mut self, session_id: &str, message: &Message) -> Option<EmergencyPanel> {
        if !self.reported.insert(session_id.to_string()) {
            tracing::debug!("[Escalation] Session {} already escalated", session_id);
            return None;
        }

        tracing::warn!(
            "[Escalation] Emergency in session {} (message {})",
            session_id,
            message.id
        );

        let reporter = Arc::clone(&self.reporter);
        let session_id_owned = session_id.to_string();
        let message_owned = message.clone();
        tokio::spawn(async move {
            if let Err(e) = reporter
                .record_emergency(&session_id_owned, &message_owned)
                .await
            {
                tracing::warn!(
                    "[Escalation] Failed to record emergency for {}: {}",
                    session_id_owned,
                    e
                );
            }
        });

        Some(self.panel(Some(message)))
    }
}
