//! Session bootstrap response DTO.

use serde::Deserialize;
use triage_core::protocol::WireMessage;
use triage_core::session::{ChatSession, Phase};

/// Body returned by `GET chat/session/today` and `POST chat/session/new`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionBootstrapDto {
    pub chat_uuid: String,
    #[serde(default)]
    pub conversation_state: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub is_new_session: bool,
    #[serde(default)]
    pub symptom_list: Vec<String>,
}

impl From<SessionBootstrapDto> for ChatSession {
    fn from(dto: SessionBootstrapDto) -> Self {
        let phase = match dto.conversation_state.as_deref() {
            Some(state) => Phase::from_conversation_state(state).unwrap_or_else(|| {
                tracing::warn!(
                    "[SessionBootstrap] Unknown conversation_state '{}', starting at disclaimer",
                    state
                );
                Phase::Disclaimer
            }),
            None => Phase::Disclaimer,
        };

        ChatSession {
            session_id: dto.chat_uuid,
            phase,
            messages: dto.messages.into_iter().map(Into::into).collect(),
            symptom_list: dto.symptom_list,
            is_new_session: dto.is_new_session,
        }
    }
}
