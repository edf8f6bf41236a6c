//! Reassembly of raw wire frames into the canonical message sequence.
//!
//! The assembler merges streamed fragments, reconciles the optimistic
//! placeholder with confirmed messages, and reports completion and newly
//! detected symptoms to its caller. It never decides the conversation phase.

use serde::Deserialize;

use crate::message::{Message, MessageId, Sender, Transcript};
use crate::protocol::InboundFrame;

/// Phrase the agent uses to close out a check-in when it does not set
/// `isComplete`.
pub const DEFAULT_COMPLETION_PHRASE: &str = "completed your daily check-in";

/// What ingesting one frame did to the transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblerEffect {
    /// A new assistant message was created from the first fragment.
    StreamStarted { id: MessageId },
    /// A fragment was appended to an existing message.
    StreamExtended { id: MessageId },
    /// The chunk stream finished. No content changed.
    StreamEnded { id: Option<MessageId> },
    /// A complete message was appended (replacing any earlier copy).
    Completed {
        id: MessageId,
        /// The pending placeholder was retired by this message.
        replaced_pending: bool,
        /// The message signals the end of the triage protocol.
        completion: bool,
        /// Symptom names extracted from an embedded payload.
        new_symptoms: Vec<String>,
    },
    /// The server reported an error for the last request.
    ServerNotice { message: String },
    /// The frame could not be decoded and was dropped.
    Ignored { reason: String },
}

#[derive(Debug, Deserialize)]
struct SymptomPayload {
    new_symptoms: Vec<String>,
}

/// Parses an embedded `{"new_symptoms": [...]}` payload.
///
/// Returns `None` for anything that is not exactly such an object; the
/// content is then ordinary display text.
pub fn extract_new_symptoms(content: &str) -> Option<Vec<String>> {
    let trimmed = content.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<SymptomPayload>(trimmed) {
        Ok(payload) => Some(payload.new_symptoms),
        Err(e) => {
            tracing::debug!("Content looked like a symptom payload but did not parse: {}", e);
            None
        }
    }
}

/// Stateful frame reassembler for one conversation.
#[derive(Debug, Clone)]
pub struct MessageAssembler {
    completion_phrase: String,
    /// The assistant message currently receiving fragments.
    streaming: Option<MessageId>,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_PHRASE)
    }
}

impl MessageAssembler {
    pub fn new(completion_phrase: impl Into<String>) -> Self {
        Self {
            completion_phrase: completion_phrase.into().to_lowercase(),
            streaming: None,
        }
    }

    /// The id of the message currently being streamed, if any.
    pub fn streaming_id(&self) -> Option<&MessageId> {
        self.streaming.as_ref()
    }

    /// Forgets the stream in progress; its fragments so far stay in the
    /// transcript.
    pub fn abandon_stream(&mut self) -> Option<MessageId> {
        self.streaming.take()
    }

    /// Decodes and applies one raw frame.
    ///
    /// Malformed frames are logged and reported as `Ignored`; they never
    /// disturb the transcript or the handling of later frames.
    pub fn ingest(&mut self, raw: &str, transcript: &mut Transcript) -> AssemblerEffect {
        match InboundFrame::parse(raw) {
            Ok(frame) => self.apply(frame, transcript),
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {}", e);
                AssemblerEffect::Ignored {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Applies one decoded frame.
    pub fn apply(&mut self, frame: InboundFrame, transcript: &mut Transcript) -> AssemblerEffect {
        match frame {
            InboundFrame::Chunk {
                message_id,
                content,
            } => self.apply_chunk(message_id, content, transcript),
            InboundFrame::End { message_id } => {
                let id = message_id.or_else(|| self.streaming.clone());
                tracing::debug!("Stream ended for {:?}", id);
                self.streaming = None;
                AssemblerEffect::StreamEnded { id }
            }
            InboundFrame::Complete(message) => self.apply_complete(message, transcript),
            InboundFrame::ServerError { message } => {
                tracing::warn!("Server reported an error: {}", message);
                transcript.set_composing(false);
                AssemblerEffect::ServerNotice { message }
            }
        }
    }

    fn apply_chunk(
        &mut self,
        id: MessageId,
        content: String,
        transcript: &mut Transcript,
    ) -> AssemblerEffect {
        // Content has started arriving; retire the thinking indicator.
        transcript.set_composing(false);

        if let Some(current) = &self.streaming
            && current != &id
        {
            tracing::debug!(
                "Chunk for {} arrived while {} was streaming; closing the earlier stream",
                id,
                current
            );
        }
        self.streaming = Some(id.clone());

        match transcript.find_mut(&id) {
            Some(existing) => {
                existing.content.push_str(&content);
                AssemblerEffect::StreamExtended { id }
            }
            None => {
                // A reply stream acknowledges the answer that preceded it.
                if transcript.confirm_pending(MessageId::assigned(format!("local-{}", id))) {
                    tracing::debug!("Confirmed pending answer on reply stream {}", id);
                }
                transcript.push(Message::streaming_assistant(id.clone(), content));
                AssemblerEffect::StreamStarted { id }
            }
        }
    }

    fn apply_complete(&mut self, mut message: Message, transcript: &mut Transcript) -> AssemblerEffect {
        let replaced_pending = transcript.remove_pending();
        let duplicates = transcript.remove_id(&message.id);
        if duplicates > 0 {
            tracing::debug!("Replaced {} earlier copies of message {}", duplicates, message.id);
        }
        if self.streaming.as_ref() == Some(&message.id) {
            self.streaming = None;
        }

        let mut new_symptoms = Vec::new();
        if message.sender == Sender::Assistant {
            transcript.set_composing(false);
            if let Some(names) = extract_new_symptoms(&message.content) {
                tracing::info!("Detected {} new symptom(s) in message {}", names.len(), message.id);
                message.symptom_payload = true;
                new_symptoms = names;
            }
        }

        let completion = self.detects_completion(&message);
        let id = message.id.clone();
        transcript.push(message);

        AssemblerEffect::Completed {
            id,
            replaced_pending,
            completion,
            new_symptoms,
        }
    }

    /// Whether a message ends the triage protocol: the agent set
    /// `isComplete` or the content carries the terminal phrase.
    /// Patient messages never complete a session.
    pub fn detects_completion(&self, message: &Message) -> bool {
        if message.sender == Sender::User {
            return false;
        }
        if message.declares_complete() {
            return true;
        }
        !self.completion_phrase.is_empty()
            && message.content.to_lowercase().contains(&self.completion_phrase)
    }
}
