mod common;

use chrono::NaiveDate;
use serde_json::{Value, json};
use triage_application::{Banner, ConversationUpdate, UNCONFIRMED_ANSWER_NOTICE};
use triage_core::conversation::{Affordance, UserAction};
use triage_core::escalation::EscalationLevel;
use triage_core::message::Sender;
use triage_core::session::{CredentialProvider, Phase};
use triage_interaction::testing::PeerMessage;
use triage_interaction::{ConnectionHandle, ConnectionState, TransportEvent, TransportEventKind};

use common::{harness, session, wire};

fn symptom_prompt() -> triage_core::message::Message {
    wire(json!({
        "id": 3,
        "chat_uuid": "c-1",
        "sender": "assistant",
        "message_type": "symptom_select",
        "content": "Which symptoms are bothering you today?",
        "structured_data": {"options": ["Nausea", "Fatigue", "Fever"], "maxSelections": 3},
        "created_at": "2026-10-18T09:00:00Z"
    }))
}

fn plain_prompt(id: u32, content: &str) -> triage_core::message::Message {
    wire(json!({
        "id": id,
        "chat_uuid": "c-1",
        "sender": "assistant",
        "message_type": "text",
        "content": content,
        "created_at": "2026-10-18T09:00:00Z"
    }))
}

#[tokio::test]
async fn test_symptom_select_round_trip() {
    let mut h = harness(session("c-1", Phase::SymptomSelect, vec![symptom_prompt()], &["Fatigue"])).await;
    let mut peer = h.start_open().await;
    assert_eq!(h.controller.symptoms(), &["Fatigue".to_string()]);
    assert_eq!(peer.request.url.path(), "/api/chat/ws/c-1");

    let view = h.controller.view().unwrap();
    assert_eq!(view.phase, Phase::SymptomSelect);
    assert!(matches!(view.affordance, Affordance::SymptomGrid { .. }));

    h.controller
        .submit(UserAction::MultiSelect(vec!["Nausea".into(), "Fatigue".into()]))
        .await
        .unwrap();

    let sent: Value = serde_json::from_str(&peer.next_text().await.unwrap()).unwrap();
    assert_eq!(
        sent,
        json!({
            "type": "user_message",
            "message_type": "multi_select_response",
            "content": "Nausea, Fatigue"
        })
    );
    assert_eq!(
        h.controller.symptoms(),
        &["Fatigue".to_string(), "Nausea".to_string()]
    );
    assert_eq!(h.ledger.stored.lock().unwrap().len(), 2);

    let view = h.controller.view().unwrap();
    assert!(view.composing);
    assert_eq!(view.affordance, Affordance::Waiting);
    assert!(view.messages.last().unwrap().message.is_pending());

    peer.push_text(
        json!({
            "id": 10, "chat_uuid": "c-1", "sender": "user",
            "message_type": "multi_select_response", "content": "Nausea, Fatigue",
            "created_at": "2026-10-18T09:01:00Z"
        })
        .to_string(),
    );
    h.next_update().await;

    peer.push_text(
        json!({
            "id": 11, "chat_uuid": "c-1", "sender": "assistant",
            "message_type": "single_choice",
            "content": "Your care team will be notified. Is the nausea constant?",
            "structured_data": {"options": ["Yes", "No"], "triageLevel": "notify_care_team"},
            "created_at": "2026-10-18T09:01:05Z"
        })
        .to_string(),
    );
    let update = h.next_update().await;
    assert_eq!(
        update,
        ConversationUpdate::Conversation {
            phase: Phase::Dialog(1),
            phase_changed: true,
            notice: None,
        }
    );

    let view = h.controller.view().unwrap();
    assert!(!view.show_text_input);
    assert!(!view.composing);
    assert!(view.emergency.is_none());
    assert_eq!(view.messages.len(), 3);
    assert!(view.messages.iter().all(|m| !m.message.is_pending()));

    let last = view.messages.last().unwrap();
    assert_eq!(last.message.sender, Sender::Assistant);
    assert_eq!(last.escalation, EscalationLevel::Alert);
    assert!(last.interactive);
    assert!(!view.messages[0].interactive);
    assert!(matches!(view.affordance, Affordance::Choices { .. }));
}

#[tokio::test]
async fn test_action_rejected_while_channel_not_open() {
    let mut h = harness(session("c-1", Phase::Dialog(0), vec![plain_prompt(4, "How are you?")], &[])).await;
    h.connector.refuse_all();
    h.controller.start().await.unwrap();

    let err = h
        .controller
        .submit(UserAction::Text("tired".into()))
        .await
        .unwrap_err();
    assert!(err.is_transport());

    let view = h.controller.view().unwrap();
    assert_eq!(view.messages.len(), 1);
    assert!(!view.composing);
    assert_eq!(view.banner, Some(Banner::Connecting));
}

#[tokio::test]
async fn test_second_action_rejected_while_pending() {
    let mut h = harness(session("c-1", Phase::Dialog(0), vec![plain_prompt(4, "How are you?")], &[])).await;
    let _peer = h.start_open().await;

    h.controller.submit(UserAction::Text("tired".into())).await.unwrap();
    let err = h
        .controller
        .submit(UserAction::Text("and sore".into()))
        .await
        .unwrap_err();
    assert!(err.is_rejected());
}

#[tokio::test]
async fn test_emergency_takes_over_once() {
    let mut h = harness(session("c-1", Phase::EmergencyCheck, vec![], &[])).await;
    let peer = h.start_open().await;

    let emergency = json!({
        "id": 20, "chat_uuid": "c-1", "sender": "assistant",
        "message_type": "emergency_result", "content": "Call 911 now.",
        "structured_data": {"triageLevel": "call_911"},
        "created_at": "2026-10-18T09:02:00Z"
    });
    peer.push_text(emergency.to_string());

    let ConversationUpdate::Emergency(panel) = h.next_update().await else {
        panic!("expected the emergency panel");
    };
    assert_eq!(panel.body, "Call 911 now.");
    assert_eq!(panel.call_number, "911");

    let view = h.controller.view().unwrap();
    assert_eq!(view.phase, Phase::Emergency);
    assert_eq!(view.affordance, Affordance::EmergencyPanel);
    assert!(view.messages.is_empty());
    assert!(view.emergency.is_some());

    let mut repeat = emergency.clone();
    repeat["id"] = json!(21);
    peer.push_text(repeat.to_string());
    assert!(matches!(
        h.next_update().await,
        ConversationUpdate::Conversation { phase: Phase::Emergency, .. }
    ));

    tokio::task::yield_now().await;
    assert_eq!(
        *h.portal.emergencies.lock().unwrap(),
        vec![("c-1".to_string(), "20".to_string())]
    );

    let err = h
        .controller
        .submit(UserAction::Text("hello".into()))
        .await
        .unwrap_err();
    assert!(err.is_rejected());
}

#[tokio::test]
async fn test_streamed_reply_and_symptom_payload() {
    let mut h = harness(session("c-1", Phase::Dialog(0), vec![plain_prompt(4, "Anything else?")], &[])).await;
    let peer = h.start_open().await;

    peer.push_text(r#"{"type":"message_chunk","message_id":30,"content":"Thanks, "}"#);
    peer.push_text(r#"{"type":"message_chunk","message_id":30,"content":"noted."}"#);
    h.next_update().await;
    h.next_update().await;
    assert!(h.controller.view().unwrap().composing);

    peer.push_text(r#"{"type":"message_end","message_id":30}"#);
    h.next_update().await;
    let view = h.controller.view().unwrap();
    assert!(!view.composing);
    assert_eq!(view.messages.last().unwrap().message.content, "Thanks, noted.");

    peer.push_text(
        json!({
            "id": 31, "chat_uuid": "c-1", "sender": "assistant", "message_type": "text",
            "content": "{\"new_symptoms\": [\"Headache\", \"headache \"]}",
            "created_at": "2026-10-18T09:03:00Z"
        })
        .to_string(),
    );
    h.next_update().await;

    assert_eq!(h.controller.symptoms(), &["Headache".to_string()]);
    let view = h.controller.view().unwrap();
    assert!(view.messages.iter().all(|m| !m.message.content.contains("new_symptoms")));

    peer.push_text("not json at all");
    h.next_update().await;
    peer.push_text(r#"{"type":"error","message":"agent unavailable"}"#);
    assert_eq!(
        h.next_update().await,
        ConversationUpdate::Conversation {
            phase: Phase::Dialog(2),
            phase_changed: false,
            notice: Some("agent unavailable".to_string()),
        }
    );
}

#[tokio::test]
async fn test_feeling_and_chemo_side_effects() {
    let feeling_prompt = wire(json!({
        "id": 5, "chat_uuid": "c-1", "sender": "assistant", "message_type": "feeling",
        "content": "How are you feeling today?",
        "structured_data": {"options": ["great", "okay", "bad"]},
        "created_at": "2026-10-18T09:00:00Z"
    }));
    let mut h = harness(session("c-1", Phase::Dialog(0), vec![feeling_prompt], &[])).await;
    let mut peer = h.start_open().await;

    assert!(matches!(
        h.controller.view().unwrap().affordance,
        Affordance::FeelingScale { .. }
    ));
    h.controller
        .submit(UserAction::Feeling("okay".into()))
        .await
        .unwrap();
    let sent: Value = serde_json::from_str(&peer.next_text().await.unwrap()).unwrap();
    assert_eq!(sent["message_type"], "feeling_response");

    peer.push_text(
        json!({
            "id": 6, "chat_uuid": "c-1", "sender": "user", "message_type": "feeling_response",
            "content": "okay", "created_at": "2026-10-18T09:00:30Z"
        })
        .to_string(),
    );
    h.next_update().await;
    peer.push_text(
        json!({
            "id": 7, "chat_uuid": "c-1", "sender": "assistant", "message_type": "text",
            "content": "When was your last chemotherapy session?",
            "created_at": "2026-10-18T09:00:40Z"
        })
        .to_string(),
    );
    h.next_update().await;
    assert_eq!(h.controller.view().unwrap().affordance, Affordance::DatePicker);

    let date = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
    h.controller.submit(UserAction::DatePick(date)).await.unwrap();
    let sent: Value = serde_json::from_str(&peer.next_text().await.unwrap()).unwrap();
    assert_eq!(sent["message_type"], "text");
    assert_eq!(sent["content"], "2026-10-01");

    tokio::task::yield_now().await;
    assert_eq!(
        *h.portal.feelings.lock().unwrap(),
        vec![("c-1".to_string(), "okay".to_string())]
    );
    assert_eq!(
        *h.portal.chemo_dates.lock().unwrap(),
        vec![("c-1".to_string(), date)]
    );
}

#[tokio::test]
async fn test_rejected_token_signs_out() {
    let feeling_prompt = wire(json!({
        "id": 5, "chat_uuid": "c-1", "sender": "assistant", "message_type": "feeling",
        "content": "How are you feeling today?",
        "created_at": "2026-10-18T09:00:00Z"
    }));
    let mut h = harness(session("c-1", Phase::Dialog(0), vec![feeling_prompt], &[])).await;
    let mut peer = h.start_open().await;
    *h.portal.reject_feelings.lock().unwrap() = true;

    h.controller
        .submit(UserAction::Feeling("bad".into()))
        .await
        .unwrap();
    assert_eq!(h.next_update().await, ConversationUpdate::SignedOut);

    assert_eq!(h.credentials.token(), None);
    assert_eq!(h.controller.banner(), Some(&Banner::SignedOut));

    assert!(peer.next_text().await.is_some());
    assert_eq!(peer.next_message().await, Some(PeerMessage::Closed(1000)));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_exhaustion_then_manual_retry() {
    let mut h = harness(session("c-1", Phase::Dialog(0), vec![plain_prompt(4, "Hi")], &[])).await;
    let peer = h.start_open().await;

    h.connector.refuse_all();
    peer.close_with(1006);

    let mut saw_reconnect_banner = false;
    loop {
        match h.next_update().await {
            ConversationUpdate::Connection(ConnectionState::Failed) => break,
            ConversationUpdate::Connection(_) => {
                if let Some(Banner::Reconnecting { max_attempts, .. }) = h.controller.banner() {
                    assert_eq!(*max_attempts, 3);
                    saw_reconnect_banner = true;
                }
            }
            other => panic!("unexpected update {:?}", other),
        }
    }
    assert!(saw_reconnect_banner);
    assert_eq!(h.connector.connect_count(), 4);

    let view = h.controller.view().unwrap();
    assert_eq!(view.banner, Some(Banner::ConnectionLost));
    assert!(view.banner.as_ref().unwrap().offers_retry());

    h.connector.accept_all();
    h.controller.retry_connection().unwrap();
    assert_eq!(
        h.next_update().await,
        ConversationUpdate::Connection(ConnectionState::Open)
    );
    assert_eq!(h.controller.banner(), None);
}

#[tokio::test(start_paused = true)]
async fn test_answer_lost_in_dropped_connection_can_be_given_again() {
    let mut h = harness(session("c-1", Phase::Dialog(0), vec![plain_prompt(4, "Where does it hurt?")], &[])).await;
    let peer = h.start_open().await;

    h.controller.submit(UserAction::Text("my back".into())).await.unwrap();
    assert_eq!(h.controller.view().unwrap().affordance, Affordance::Waiting);
    peer.close_with(1011);

    loop {
        match h.next_update().await {
            ConversationUpdate::Connection(ConnectionState::Open) => break,
            ConversationUpdate::Connection(_) => {}
            other => panic!("unexpected update {:?}", other),
        }
    }
    let mut peer = h.peers.recv().await.unwrap();

    let view = h.controller.view().unwrap();
    assert!(!view.composing);
    assert_eq!(view.affordance, Affordance::TextInput);
    assert!(view.show_text_input);
    assert!(view.messages.iter().all(|m| !m.message.is_pending()));
    assert_eq!(view.notice.as_deref(), Some(UNCONFIRMED_ANSWER_NOTICE));
    assert_eq!(view.banner, None);

    h.controller.submit(UserAction::Text("my back".into())).await.unwrap();
    let sent: Value = serde_json::from_str(&peer.next_text().await.unwrap()).unwrap();
    assert_eq!(sent["content"], "my back");
}

#[tokio::test]
async fn test_new_conversation_resets_ledger_and_drops_stale_events() {
    let mut h = harness(session("c-1", Phase::Dialog(0), vec![plain_prompt(4, "Hi")], &["Fatigue"])).await;
    let mut old_peer = h.start_open().await;

    *h.portal.next_new.lock().unwrap() = Some(session("c-2", Phase::Disclaimer, vec![], &[]));
    h.controller.start_new_conversation().await.unwrap();

    assert!(h.controller.symptoms().is_empty());
    assert!(h.ledger.stored.lock().unwrap().is_empty());
    assert_eq!(old_peer.next_message().await, Some(PeerMessage::Closed(1000)));

    let stale = TransportEvent {
        handle: ConnectionHandle {
            session_id: "c-1".to_string(),
            generation: 1,
        },
        kind: TransportEventKind::Frame(r#"{"type":"message_chunk","message_id":1,"content":"x"}"#.into()),
    };
    assert_eq!(h.controller.handle_event(stale).await, ConversationUpdate::Stale);

    assert_eq!(
        h.next_update().await,
        ConversationUpdate::Connection(ConnectionState::Open)
    );
    let new_peer = h.peers.recv().await.unwrap();
    assert_eq!(new_peer.request.url.path(), "/api/chat/ws/c-2");

    let view = h.controller.view().unwrap();
    assert_eq!(view.session_id, "c-2");
    assert_eq!(view.phase, Phase::Disclaimer);
    assert!(view.messages.is_empty());
}
