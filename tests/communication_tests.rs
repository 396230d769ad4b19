//! End-to-end tests for message delivery, expiry, and collaboration.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

use agent_coord::comms::{
    AgentMessage, CollaborationRecord, CommunicationEngine, MessagePriority, MessageType,
};
use agent_coord::config::{AgentProfile, CoordConfig};
use agent_coord::store::RecordStore;

fn config_with(agents: &[&str]) -> CoordConfig {
    let mut config = CoordConfig::default();
    for agent in agents {
        config
            .agents
            .insert(agent.to_string(), AgentProfile::default());
    }
    config
}

fn engine(dir: &TempDir, agents: &[&str]) -> CommunicationEngine {
    CommunicationEngine::with_dir(dir.path().to_path_buf(), &config_with(agents))
}

fn content(body: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("body".into(), json!(body));
    map
}

fn request(sender: &str, recipient: &str, subject: &str) -> AgentMessage {
    AgentMessage::new(
        sender,
        recipient,
        MessageType::Request,
        MessagePriority::Normal,
        subject,
        content("payload"),
    )
}

#[tokio::test]
async fn send_lands_in_outbox_inbox_and_thread() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &["planner", "coder"]);

    let receipt = engine
        .send(request("planner", "coder", "build the parser"))
        .await
        .unwrap();

    // Recipient inbox sees it.
    let inbox = engine.receive("coder", None).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].id, receipt.message_id);

    // Sender outbox holds an independent copy.
    let store = RecordStore::new(dir.path().to_path_buf());
    let outbox_copy: AgentMessage = store
        .get("queues/planner/outbox", &receipt.message_id)
        .await
        .unwrap();
    assert_eq!(outbox_copy.subject, "build the parser");

    // The thread carries the message too.
    let history = engine
        .conversation_history(&receipt.thread_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, receipt.message_id);
}

#[tokio::test]
async fn expired_messages_archive_exactly_once() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &["planner", "coder"]);

    let expired = request("planner", "coder", "stale")
        .with_expiry(Utc::now() - Duration::minutes(5));
    let receipt = engine.send(expired).await.unwrap();
    engine
        .send(request("planner", "coder", "fresh"))
        .await
        .unwrap();

    let first = engine.receive("coder", None).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].subject, "fresh");

    let second = engine.receive("coder", None).await.unwrap();
    assert_eq!(second.len(), 1);

    let store = RecordStore::new(dir.path().to_path_buf());
    let archived: Vec<AgentMessage> = store.list("archive/expired").await.unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].id, receipt.message_id);
}

#[tokio::test]
async fn receive_orders_critical_high_low_at_same_timestamp() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &["planner", "coder"]);

    let ts = Utc::now();
    for priority in [
        MessagePriority::Low,
        MessagePriority::High,
        MessagePriority::Critical,
    ] {
        let mut message = request("planner", "coder", "prioritized");
        message.priority = priority;
        message.timestamp = ts;
        engine.send(message).await.unwrap();
    }

    let inbox = engine.receive("coder", None).await.unwrap();
    let order: Vec<MessagePriority> = inbox.iter().map(|m| m.priority).collect();
    assert_eq!(
        order,
        vec![
            MessagePriority::Critical,
            MessagePriority::High,
            MessagePriority::Low
        ]
    );
}

#[tokio::test]
async fn newer_messages_rank_first_within_a_priority() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &["planner", "coder"]);

    let mut old = request("planner", "coder", "old news");
    old.timestamp = Utc::now() - Duration::hours(1);
    engine.send(old).await.unwrap();
    engine
        .send(request("planner", "coder", "latest"))
        .await
        .unwrap();

    let inbox = engine.receive("coder", None).await.unwrap();
    assert_eq!(inbox[0].subject, "latest");
    assert_eq!(inbox[1].subject, "old news");
}

#[tokio::test]
async fn process_twice_fails_the_second_time() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &["planner", "coder"]);

    let receipt = engine
        .send(request("planner", "coder", "one shot"))
        .await
        .unwrap();

    engine.process("coder", &receipt.message_id).await.unwrap();
    assert!(engine.receive("coder", None).await.unwrap().is_empty());
    assert!(engine.process("coder", &receipt.message_id).await.is_err());

    // The processed copy survives the move.
    let store = RecordStore::new(dir.path().to_path_buf());
    let processed: Vec<AgentMessage> = store.list("queues/coder/processed").await.unwrap();
    assert_eq!(processed.len(), 1);
}

#[tokio::test]
async fn collaboration_fans_out_and_tracks_once() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &["lead", "coder", "reviewer", "tester"]);

    let mut context = Map::new();
    context.insert("objective".into(), json!("Ship release"));

    let receipt = engine
        .request_collaboration(
            "lead",
            vec!["coder".into(), "reviewer".into(), "tester".into()],
            context,
        )
        .await
        .unwrap();

    assert_eq!(receipt.invitations.len(), 3);
    assert!(receipt.invitations.iter().all(|i| i.success));

    // One tracking record, status active, keyed by the shared thread id.
    let record: CollaborationRecord = engine
        .collaboration(&receipt.collaboration_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, "active");
    assert_eq!(record.collaborators.len(), 3);

    // Every invitation landed in the same conversation.
    let history = engine
        .conversation_history(&receipt.collaboration_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    for message in &history {
        assert_eq!(
            message.thread_id.as_deref(),
            Some(receipt.collaboration_id.as_str())
        );
        assert_eq!(message.message_type, MessageType::Coordination);
        assert!(message.requires_response);
    }
}

#[tokio::test]
async fn conversation_history_is_chronological() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &["planner", "coder"]);

    let receipt = engine
        .send(request("planner", "coder", "first"))
        .await
        .unwrap();

    let mut reply = request("coder", "planner", "second");
    reply.message_type = MessageType::Response;
    reply.priority = MessagePriority::Critical;
    reply = reply.with_thread(receipt.thread_id.clone());
    engine.send(reply).await.unwrap();

    // Chronological order ignores priority.
    let history = engine
        .conversation_history(&receipt.thread_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].subject, "first");
    assert_eq!(history[1].subject, "second");
}

#[tokio::test]
async fn unknown_thread_history_is_empty() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &["planner"]);
    let history = engine.conversation_history("thread_missing").await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn validation_failure_leaves_no_partial_state() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir, &["planner", "coder"]);

    let mut bad = request("planner", "coder", "no content");
    bad.content = Map::new();
    assert!(engine.send(bad).await.is_err());

    let store = RecordStore::new(dir.path().to_path_buf());
    let outbox: Vec<AgentMessage> = store.list("queues/planner/outbox").await.unwrap();
    assert!(outbox.is_empty());
    let threads: Vec<Value> = store.list("conversations").await.unwrap();
    assert!(threads.is_empty());
}
