//! Wire protocol of the conversation channel.
//!
//! Frames are JSON objects. Streaming envelopes carry a `type` field
//! (`message_chunk`, `message_end`, `error`); a complete message has no
//! `type` and is recognized by its shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TriageError};
use crate::message::{Message, MessageId, MessageKind, Sender, StructuredData};

/// Identifier as it appears on the wire: a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(i64),
    Text(String),
}

impl From<WireId> for MessageId {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Number(n) => MessageId::Assigned(n.to_string()),
            WireId::Text(s) => MessageId::Assigned(s),
        }
    }
}

/// A complete message as sent by the server, on the socket and in REST
/// history.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: WireId,
    #[serde(default)]
    pub chat_uuid: Option<String>,
    pub sender: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub structured_data: Option<StructuredData>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Message {
            id: wire.id.into(),
            sender: Sender::from_wire(&wire.sender),
            kind: wire
                .message_type
                .as_deref()
                .map(MessageKind::from_wire)
                .unwrap_or(MessageKind::PlainText),
            content: wire.content,
            structured: wire.structured_data,
            created_at: wire
                .created_at
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            symptom_payload: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    message_id: WireId,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct EndEnvelope {
    #[serde(default)]
    message_id: Option<WireId>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: String,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A fragment of a streamed assistant message.
    Chunk { message_id: MessageId, content: String },
    /// The current chunk stream finished.
    End { message_id: Option<MessageId> },
    /// A fully-formed message with a real id.
    Complete(Message),
    /// The server reported a problem processing the last request.
    ServerError { message: String },
}

impl InboundFrame {
    /// Decodes one raw text frame.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| TriageError::protocol(format!("frame is not JSON: {}", e)))?;

        if !value.is_object() {
            return Err(TriageError::protocol("frame is not a JSON object"));
        }

        match value.get("type").and_then(Value::as_str) {
            Some("message_chunk") => {
                let chunk: ChunkEnvelope = serde_json::from_value(value)
                    .map_err(|e| TriageError::protocol(format!("bad message_chunk: {}", e)))?;
                Ok(InboundFrame::Chunk {
                    message_id: chunk.message_id.into(),
                    content: chunk.content,
                })
            }
            Some("message_end") => {
                let end: EndEnvelope = serde_json::from_value(value)
                    .map_err(|e| TriageError::protocol(format!("bad message_end: {}", e)))?;
                Ok(InboundFrame::End {
                    message_id: end.message_id.map(Into::into),
                })
            }
            Some("error") => {
                let error: ErrorEnvelope = serde_json::from_value(value)
                    .map_err(|e| TriageError::protocol(format!("bad error frame: {}", e)))?;
                Ok(InboundFrame::ServerError {
                    message: error.message,
                })
            }
            Some(other) => Err(TriageError::protocol(format!(
                "unknown frame type '{}'",
                other
            ))),
            None => {
                let wire: WireMessage = serde_json::from_value(value)
                    .map_err(|e| TriageError::protocol(format!("bad message: {}", e)))?;
                Ok(InboundFrame::Complete(wire.into()))
            }
        }
    }
}

/// How the user's reply should be interpreted by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMessageType {
    Text,
    ButtonResponse,
    MultiSelectResponse,
    FeelingResponse,
}

/// A frame sent from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    UserMessage {
        message_type: UserMessageType,
        content: String,
    },
}

impl OutboundFrame {
    pub fn user_message(message_type: UserMessageType, content: impl Into<String>) -> Self {
        OutboundFrame::UserMessage {
            message_type,
            content: content.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TriageLevel;

    #[test]
    fn test_parse_chunk_with_numeric_id() {
        let frame = InboundFrame::parse(r#"{"type":"message_chunk","message_id":42,"content":"Hel"}"#)
            .unwrap();
        assert_eq!(
            frame,
            InboundFrame::Chunk {
                message_id: MessageId::assigned("42"),
                content: "Hel".to_string()
            }
        );
    }

    #[test]
    fn test_parse_end_without_id() {
        let frame = InboundFrame::parse(r#"{"type":"message_end"}"#).unwrap();
        assert_eq!(frame, InboundFrame::End { message_id: None });
    }

    #[test]
    fn test_parse_complete_message() {
        let raw = r#"{
            "id": 7,
            "chat_uuid": "c-1",
            "sender": "assistant",
            "message_type": "symptom_select",
            "content": "Which symptoms?",
            "structured_data": {"options": ["Nausea", "Fatigue"], "triageLevel": "notify_care_team"},
            "created_at": "2026-10-18T09:00:00Z"
        }"#;
        let InboundFrame::Complete(message) = InboundFrame::parse(raw).unwrap() else {
            panic!("expected complete message");
        };
        assert_eq!(message.id, MessageId::assigned("7"));
        assert_eq!(message.sender, Sender::Assistant);
        assert_eq!(message.kind, MessageKind::SymptomSelectPrompt);
        assert_eq!(message.triage_level(), TriageLevel::NotifyCareTeam);
        assert_eq!(message.created_at, "2026-10-18T09:00:00Z");
    }

    #[test]
    fn test_malformed_frames_are_protocol_errors() {
        assert!(InboundFrame::parse("not json").unwrap_err().is_protocol());
        assert!(InboundFrame::parse("[1,2]").unwrap_err().is_protocol());
        assert!(InboundFrame::parse(r#"{"type":"typing"}"#).unwrap_err().is_protocol());
        assert!(InboundFrame::parse(r#"{"content":"no id or sender"}"#).unwrap_err().is_protocol());
    }

    #[test]
    fn test_outbound_wire_shape() {
        let frame = OutboundFrame::user_message(UserMessageType::MultiSelectResponse, "Nausea, Fatigue");
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "user_message");
        assert_eq!(value["message_type"], "multi_select_response");
        assert_eq!(value["content"], "Nausea, Fatigue");
    }
}
