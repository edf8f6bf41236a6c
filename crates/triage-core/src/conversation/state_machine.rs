//! The client-side conversation state machine.
//!
//! Phase and affordance are derived from the transcript on demand. The only
//! stored state besides the transcript are the two terminal latches
//! (completion and emergency), which by definition cannot be recomputed
//! away by later messages.

use super::action::UserAction;
use super::affordance::{Affordance, is_chemo_date_prompt};
use crate::assembler::{AssemblerEffect, MessageAssembler};
use crate::error::{Result, TriageError};
use crate::message::{Message, MessageKind, Sender, TriageLevel, Transcript};
use crate::protocol::{InboundFrame, OutboundFrame};
use crate::session::{ChatSession, Phase};

/// Result of processing one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub effect: AssemblerEffect,
    pub phase: Phase,
    pub phase_changed: bool,
    /// Set only on the frame that engaged the emergency latch.
    pub emergency: Option<Message>,
}

/// Owned state of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationStateMachine {
    session_id: String,
    seeded_phase: Phase,
    is_new_session: bool,
    transcript: Transcript,
    assembler: MessageAssembler,
    completed: bool,
    emergency_latched: bool,
    emergency_message: Option<Message>,
}

impl ConversationStateMachine {
    /// Seeds the machine from a bootstrapped session.
    ///
    /// History is scanned for emergency and completion signals so a reload
    /// lands in the same terminal state the patient left.
    pub fn new(session: ChatSession, assembler: MessageAssembler) -> Self {
        let ChatSession {
            session_id,
            phase,
            messages,
            is_new_session,
            ..
        } = session;

        let transcript = Transcript::from_history(messages);

        let emergency_message = transcript
            .messages()
            .iter()
            .rev()
            .find(|m| m.triage_level() == TriageLevel::Call911)
            .cloned();
        let emergency_latched = phase == Phase::Emergency || emergency_message.is_some();
        let completed = phase == Phase::Completed
            || transcript
                .messages()
                .iter()
                .any(|m| assembler.detects_completion(m));

        let seeded_phase = if phase.is_terminal() {
            Phase::Summary
        } else {
            phase
        };

        tracing::debug!(
            "Conversation {} seeded: phase={}, messages={}, emergency={}, completed={}",
            session_id,
            phase,
            transcript.len(),
            emergency_latched,
            completed
        );

        Self {
            session_id,
            seeded_phase,
            is_new_session,
            transcript,
            assembler,
            completed,
            emergency_latched,
            emergency_message,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_new_session(&self) -> bool {
        self.is_new_session
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    /// Decodes and applies one raw frame, then recomputes derived state.
    pub fn ingest(&mut self, raw: &str) -> StepOutcome {
        let before = self.phase();
        let effect = self.assembler.ingest(raw, &mut self.transcript);
        self.finish_step(before, effect)
    }

    /// Applies an already-decoded frame, then recomputes derived state.
    pub fn apply_frame(&mut self, frame: InboundFrame) -> StepOutcome {
        let before = self.phase();
        let effect = self.assembler.apply(frame, &mut self.transcript);
        self.finish_step(before, effect)
    }

    fn finish_step(&mut self, before: Phase, effect: AssemblerEffect) -> StepOutcome {
        let emergency = self.observe(&effect);
        let phase = self.phase();
        if phase != before {
            tracing::info!(
                "Conversation {} phase {} -> {}",
                self.session_id,
                before,
                phase
            );
        }
        StepOutcome {
            effect,
            phase,
            phase_changed: phase != before,
            emergency,
        }
    }

    /// Updates the latches from an assembler effect. Returns the message
    /// that engaged the emergency latch, if this effect did.
    fn observe(&mut self, effect: &AssemblerEffect) -> Option<Message> {
        let AssemblerEffect::Completed { id, completion, .. } = effect else {
            return None;
        };

        if *completion && !self.completed {
            tracing::info!("Conversation {} reached completion", self.session_id);
            self.completed = true;
        }

        let message = self.transcript.find(id)?;
        if message.triage_level() != TriageLevel::Call911 {
            return None;
        }
        if self.emergency_latched {
            return None;
        }

        tracing::warn!(
            "Conversation {} escalated to emergency by message {}",
            self.session_id,
            id
        );
        self.emergency_latched = true;
        self.emergency_message = Some(message.clone());
        self.emergency_message.clone()
    }

    /// The current phase, derived from latches and the latest assistant
    /// message.
    pub fn phase(&self) -> Phase {
        if self.emergency_latched {
            return Phase::Emergency;
        }
        if self.completed {
            return Phase::Completed;
        }
        match self.transcript.last_assistant() {
            Some(message) => match Phase::declared_by(message) {
                Phase::Dialog(_) => Phase::Dialog(self.dialog_count()),
                declared => declared,
            },
            None => self.seeded_phase,
        }
    }

    fn dialog_count(&self) -> u32 {
        self.transcript
            .renderable()
            .filter(|(_, m)| m.sender == Sender::Assistant)
            .filter(|(_, m)| matches!(Phase::declared_by(m), Phase::Dialog(_)))
            .count() as u32
    }

    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency_latched
    }

    /// The message that triggered the emergency, when one is known.
    pub fn emergency_message(&self) -> Option<&Message> {
        self.emergency_message.as_ref()
    }

    /// Whether the assistant is composing: the thinking indicator is up or
    /// a streamed message has not finished.
    pub fn is_assistant_composing(&self) -> bool {
        self.transcript.is_composing() || self.assembler.streaming_id().is_some()
    }

    /// Whether the free-text box should be shown.
    pub fn should_show_text_input(&self) -> bool {
        if self.is_terminal() || self.is_assistant_composing() {
            return false;
        }
        match self.transcript.last_renderable() {
            None => return false,
            Some(last) if last.sender == Sender::User => return false,
            Some(_) => {}
        }
        match self.transcript.last_assistant() {
            Some(message) => {
                let kind = message.interaction_kind();
                kind.is_free_text() && !kind.expects_structured_response()
            }
            None => false,
        }
    }

    /// Whether the message at `index` should show its buttons, grid or
    /// scale. Only the newest assistant message qualifies, and only until
    /// the user has answered it.
    pub fn should_show_interactive_elements(&self, index: usize) -> bool {
        let Some(message) = self.transcript.get(index) else {
            return false;
        };
        message.sender == Sender::Assistant
            && message.is_renderable()
            && self.transcript.last_assistant_index() == Some(index)
            && !self.transcript.has_user_after(index)
    }

    /// The single control a renderer should offer right now.
    pub fn affordance(&self) -> Affordance {
        if self.emergency_latched {
            return Affordance::EmergencyPanel;
        }
        if self.completed {
            return Affordance::Finished;
        }
        if self.is_assistant_composing() {
            return Affordance::Waiting;
        }
        if self
            .transcript
            .last_renderable()
            .is_some_and(|m| m.sender == Sender::User)
        {
            return Affordance::Waiting;
        }
        let Some(index) = self.transcript.last_assistant_index() else {
            return Affordance::None;
        };
        if !self.should_show_interactive_elements(index) {
            return Affordance::None;
        }

        let message = &self.transcript.messages()[index];
        let structured = message.structured.clone().unwrap_or_default();
        match message.interaction_kind() {
            MessageKind::SingleChoicePrompt => Affordance::Choices {
                options: structured.options,
            },
            MessageKind::MultiChoicePrompt => Affordance::MultiSelect {
                options: structured.options,
                max_selections: structured.max_selections,
            },
            MessageKind::FeelingPrompt => Affordance::FeelingScale {
                options: structured.options,
            },
            MessageKind::SymptomSelectPrompt => Affordance::SymptomGrid {
                options: structured.options,
                groups: structured.symptom_groups,
                max_selections: structured.max_selections,
            },
            MessageKind::PlainText if is_chemo_date_prompt(&message.content) => {
                Affordance::DatePicker
            }
            MessageKind::PlainText if self.should_show_text_input() => Affordance::TextInput,
            MessageKind::DisclaimerScreen
            | MessageKind::EmergencyCheckScreen
            | MessageKind::EmergencyResult
            | MessageKind::SummaryScreen
            | MessageKind::TriageResult
                if !structured.options.is_empty() =>
            {
                Affordance::Choices {
                    options: structured.options,
                }
            }
            _ => Affordance::None,
        }
    }

    /// Records a user action optimistically and returns the frame to send.
    ///
    /// The pending message is appended before any network round-trip. If
    /// the caller then fails to send, it must call [`rollback_pending`].
    ///
    /// # Errors
    ///
    /// - `ActionRejected` in a terminal phase, while an earlier answer is
    ///   still pending, or for blank content
    /// - `NotConnected` when the transport is not open; nothing is appended
    ///
    /// [`rollback_pending`]: Self::rollback_pending
    pub fn begin_user_action(
        &mut self,
        action: &UserAction,
        transport_open: bool,
    ) -> Result<OutboundFrame> {
        if self.is_terminal() {
            return Err(TriageError::rejected(
                "the conversation has ended; start a new conversation to continue",
            ));
        }
        if self.transcript.has_pending() {
            return Err(TriageError::rejected(
                "the previous answer has not been acknowledged yet",
            ));
        }
        if !transport_open {
            return Err(TriageError::not_connected(
                "the conversation channel is not open; reconnect and try again",
            ));
        }

        let content = action.content()?;
        let frame = OutboundFrame::user_message(action.message_type(), content.clone());

        self.transcript
            .push_pending(Message::pending_user(action.pending_kind(), content));
        self.transcript.set_composing(true);
        Ok(frame)
    }

    /// Resets in-flight state after the channel dropped.
    ///
    /// An answer that was never acknowledged is rolled back so the patient
    /// can give it again, and the composing indicator is cleared. Returns
    /// whether an unacknowledged answer was dropped.
    pub fn connection_lost(&mut self) -> bool {
        if let Some(id) = self.assembler.abandon_stream() {
            tracing::debug!("Stream {} interrupted in {}", id, self.session_id);
        }
        let dropped = self.transcript.remove_pending();
        if dropped {
            tracing::info!("Dropped unacknowledged answer in {}", self.session_id);
        }
        self.transcript.set_composing(false);
        dropped
    }

    /// Drops the optimistic placeholder after a failed send.
    pub fn rollback_pending(&mut self) {
        if self.transcript.remove_pending() {
            tracing::debug!("Rolled back pending message in {}", self.session_id);
        }
        self.transcript.set_composing(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageId;
    use serde_json::json;

    fn session(phase: Phase, messages: Vec<Message>) -> ChatSession {
        ChatSession {
            session_id: "chat-1".to_string(),
            phase,
            messages,
            symptom_list: Vec::new(),
            is_new_session: false,
        }
    }

    fn machine(phase: Phase) -> ConversationStateMachine {
        ConversationStateMachine::new(session(phase, Vec::new()), MessageAssembler::default())
    }

    fn assistant_frame(id: u32, message_type: &str, content: &str) -> String {
        json!({
            "id": id, "chat_uuid": "chat-1", "sender": "assistant",
            "message_type": message_type, "content": content,
            "created_at": "2026-10-18T09:00:00Z"
        })
        .to_string()
    }

    fn assistant_with(id: u32, message_type: &str, structured: serde_json::Value) -> String {
        json!({
            "id": id, "chat_uuid": "chat-1", "sender": "assistant",
            "message_type": message_type, "content": "...",
            "structured_data": structured,
            "created_at": "2026-10-18T09:00:00Z"
        })
        .to_string()
    }

    fn user_frame(id: u32, content: &str) -> String {
        json!({
            "id": id, "chat_uuid": "chat-1", "sender": "user",
            "message_type": "text_response", "content": content,
            "created_at": "2026-10-18T09:00:01Z"
        })
        .to_string()
    }

    #[test]
    fn test_phase_falls_back_to_seed_without_assistant_messages() {
        assert_eq!(machine(Phase::SymptomSelect).phase(), Phase::SymptomSelect);
    }

    #[test]
    fn test_phase_tracks_latest_assistant_kind() {
        let mut sm = machine(Phase::Disclaimer);
        sm.ingest(&assistant_frame(1, "emergency_check_screen", "Any chest pain?"));
        assert_eq!(sm.phase(), Phase::EmergencyCheck);

        sm.ingest(&assistant_frame(2, "symptom_select", "Pick symptoms"));
        assert_eq!(sm.phase(), Phase::SymptomSelect);

        sm.ingest(&assistant_frame(3, "text", "Tell me more"));
        assert_eq!(sm.phase(), Phase::Dialog(1));
        sm.ingest(&assistant_frame(4, "feeling", "How do you feel?"));
        assert_eq!(sm.phase(), Phase::Dialog(2));

        let outcome = sm.ingest(&assistant_frame(5, "summary_screen", "Summary"));
        assert!(outcome.phase_changed);
        assert_eq!(outcome.phase, Phase::Summary);
    }

    #[test]
    fn test_emergency_latches() {
        let mut sm = machine(Phase::EmergencyCheck);
        let outcome = sm.ingest(&assistant_with(1, "emergency_result", json!({"triageLevel": "call_911"})));
        assert_eq!(outcome.phase, Phase::Emergency);
        assert!(outcome.emergency.is_some());

        let outcome = sm.ingest(&assistant_frame(2, "symptom_select", "Let's continue"));
        assert_eq!(outcome.phase, Phase::Emergency);
        assert!(outcome.emergency.is_none());

        let outcome = sm.ingest(&assistant_with(3, "summary_screen", json!({"isComplete": true})));
        assert_eq!(outcome.phase, Phase::Emergency);
        assert_eq!(sm.affordance(), Affordance::EmergencyPanel);
        assert!(!sm.should_show_text_input());
    }

    #[test]
    fn test_emergency_fires_once() {
        let mut sm = machine(Phase::EmergencyCheck);
        let frame = assistant_with(1, "emergency_result", json!({"triageLevel": "call_911"}));
        assert!(sm.ingest(&frame).emergency.is_some());
        assert!(sm.ingest(&frame).emergency.is_none());
        assert!(sm
            .ingest(&assistant_with(2, "text", json!({"triageLevel": "call_911"})))
            .emergency
            .is_none());
    }

    #[test]
    fn test_emergency_restored_from_history() {
        let history = vec![Message {
            id: MessageId::assigned("1"),
            sender: Sender::Assistant,
            kind: MessageKind::EmergencyResult,
            content: "Call 911".to_string(),
            structured: Some(crate::message::StructuredData {
                triage_level: Some(TriageLevel::Call911),
                ..Default::default()
            }),
            created_at: "2026-10-18T08:00:00Z".to_string(),
            symptom_payload: false,
        }];
        let sm = ConversationStateMachine::new(
            session(Phase::EmergencyCheck, history),
            MessageAssembler::default(),
        );
        assert_eq!(sm.phase(), Phase::Emergency);
        assert!(sm.emergency_message().is_some());
    }

    #[test]
    fn test_completion_signal_sets_completed() {
        let mut sm = machine(Phase::Summary);
        let outcome = sm.ingest(&assistant_frame(9, "text", "You have completed your daily check-in."));
        assert_eq!(outcome.phase, Phase::Completed);
        assert_eq!(sm.affordance(), Affordance::Finished);

        let err = sm.begin_user_action(&UserAction::Text("hi".into()), true).unwrap_err();
        assert!(err.is_rejected());
    }

    #[test]
    fn test_text_input_visibility() {
        let mut sm = machine(Phase::Dialog(0));
        assert!(!sm.should_show_text_input());

        sm.ingest(&assistant_frame(1, "text", "Describe your pain"));
        assert!(sm.should_show_text_input());

        sm.begin_user_action(&UserAction::Text("sharp".into()), true).unwrap();
        assert!(!sm.should_show_text_input());

        sm.ingest(&user_frame(2, "sharp"));
        assert!(!sm.should_show_text_input());

        sm.ingest(r#"{"type":"message_chunk","message_id":3,"content":"Thanks"}"#);
        assert!(!sm.should_show_text_input(), "hidden while streaming");
        sm.ingest(r#"{"type":"message_end"}"#);
        assert!(sm.should_show_text_input());

        sm.ingest(&assistant_frame(4, "single_choice", "Is it constant?"));
        assert!(!sm.should_show_text_input());
    }

    #[test]
    fn test_frontend_type_hides_text_input() {
        let mut sm = machine(Phase::Dialog(0));
        sm.ingest(&assistant_with(1, "text", json!({"frontendType": "multi_choice", "options": ["A", "B"]})));
        assert!(!sm.should_show_text_input());
        assert!(matches!(sm.affordance(), Affordance::MultiSelect { .. }));
    }

    #[test]
    fn test_interactive_elements_disappear_after_response() {
        let mut sm = machine(Phase::SymptomSelect);
        sm.ingest(&assistant_with(1, "multi_choice", json!({"options": ["Nausea", "Fatigue"]})));
        assert!(sm.should_show_interactive_elements(0));

        sm.begin_user_action(&UserAction::MultiSelect(vec!["Nausea".into()]), true)
            .unwrap();
        sm.ingest(&user_frame(2, "Nausea"));
        assert!(!sm.should_show_interactive_elements(0));

        sm.ingest(&assistant_frame(3, "feeling", "How do you feel?"));
        assert!(sm.should_show_interactive_elements(2));
        assert!(!sm.should_show_interactive_elements(0));
        assert!(!sm.should_show_interactive_elements(99));
    }

    #[test]
    fn test_pending_reconciliation() {
        let mut sm = machine(Phase::Dialog(0));
        sm.ingest(&assistant_frame(1, "text", "Anything else?"));

        let frame = sm.begin_user_action(&UserAction::Text("No".into()), true).unwrap();
        assert_eq!(
            frame,
            OutboundFrame::user_message(crate::protocol::UserMessageType::Text, "No")
        );
        assert!(sm.transcript().has_pending());
        assert!(sm.is_assistant_composing());

        sm.ingest(&user_frame(2, "No"));

        assert!(!sm.transcript().has_pending());
        let users: Vec<_> = sm.messages().iter().filter(|m| m.sender == Sender::User).collect();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].content, "No");
    }

    #[test]
    fn test_action_rejected_when_not_open() {
        let mut sm = machine(Phase::Dialog(0));
        sm.ingest(&assistant_frame(1, "text", "Anything else?"));

        let err = sm.begin_user_action(&UserAction::Text("No".into()), false).unwrap_err();
        assert!(matches!(err, TriageError::NotConnected(_)));
        assert!(!sm.transcript().has_pending());
        assert_eq!(sm.messages().len(), 1);
    }

    #[test]
    fn test_second_action_rejected_while_pending() {
        let mut sm = machine(Phase::Dialog(0));
        sm.ingest(&assistant_frame(1, "text", "Anything else?"));
        sm.begin_user_action(&UserAction::Text("No".into()), true).unwrap();

        let err = sm.begin_user_action(&UserAction::Text("Wait".into()), true).unwrap_err();
        assert!(err.is_rejected());

        sm.rollback_pending();
        assert!(!sm.transcript().has_pending());
        assert!(!sm.is_assistant_composing());
        assert!(sm.begin_user_action(&UserAction::Text("Wait".into()), true).is_ok());
    }

    #[test]
    fn test_streamed_reply_unblocks_next_answer() {
        let mut sm = machine(Phase::Dialog(0));
        sm.ingest(&assistant_frame(1, "text", "Where does it hurt?"));
        sm.begin_user_action(&UserAction::Text("sharp".into()), true).unwrap();

        sm.ingest(r#"{"type":"message_chunk","message_id":2,"content":"How long "}"#);
        sm.ingest(r#"{"type":"message_chunk","message_id":2,"content":"has it lasted?"}"#);
        sm.ingest(r#"{"type":"message_end","message_id":2}"#);

        assert!(!sm.transcript().has_pending());
        assert!(sm.should_show_text_input());
        assert_eq!(sm.affordance(), Affordance::TextInput);
        let users: Vec<_> = sm.messages().iter().filter(|m| m.sender == Sender::User).collect();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].content, "sharp");

        assert!(sm.begin_user_action(&UserAction::Text("two days".into()), true).is_ok());
    }

    #[test]
    fn test_connection_lost_releases_unacknowledged_answer() {
        let mut sm = machine(Phase::Dialog(0));
        sm.ingest(&assistant_frame(1, "text", "Anything else?"));
        sm.begin_user_action(&UserAction::Text("No".into()), true).unwrap();
        assert_eq!(sm.affordance(), Affordance::Waiting);

        assert!(sm.connection_lost());
        assert!(!sm.is_assistant_composing());
        assert!(!sm.transcript().has_pending());
        assert_eq!(sm.affordance(), Affordance::TextInput);
        assert!(sm.begin_user_action(&UserAction::Text("No".into()), true).is_ok());
    }

    #[test]
    fn test_connection_lost_mid_stream_clears_composing() {
        let mut sm = machine(Phase::Dialog(0));
        sm.ingest(r#"{"type":"message_chunk","message_id":5,"content":"Tell me"}"#);
        assert!(sm.is_assistant_composing());

        assert!(!sm.connection_lost());
        assert!(!sm.is_assistant_composing());
        assert_eq!(sm.messages().len(), 1);
    }

    #[test]
    fn test_chemo_question_offers_date_picker() {
        let mut sm = machine(Phase::Dialog(0));
        sm.ingest(&assistant_frame(1, "text", "When was your last chemotherapy treatment?"));
        assert_eq!(sm.affordance(), Affordance::DatePicker);
        assert!(sm.should_show_text_input());
    }
}
