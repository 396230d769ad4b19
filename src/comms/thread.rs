use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::AgentMessage;

fn schema_version_default() -> u32 {
    1
}

/// Ordered conversation grouping every message sharing a thread id.
/// Created lazily on the first message; participants keep insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    #[serde(default = "schema_version_default")]
    pub schema_version: u32,
    pub thread_id: String,
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<AgentMessage>,
}

impl ConversationThread {
    pub fn new(thread_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: schema_version_default(),
            thread_id: thread_id.into(),
            participants: Vec::new(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    pub fn append(&mut self, message: AgentMessage) {
        self.add_participant(message.sender.clone());
        self.add_participant(message.recipient.clone());
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    fn add_participant(&mut self, agent: String) {
        if !self.participants.contains(&agent) {
            self.participants.push(agent);
        }
    }

    /// Messages in chronological order, independent of inbox priority order.
    pub fn chronological(&self) -> Vec<AgentMessage> {
        let mut messages = self.messages.clone();
        messages.sort_by_key(|m| m.timestamp);
        messages
    }
}

/// Tracking record for a multi-party collaboration, keyed by the shared
/// thread id every invitation carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationRecord {
    #[serde(default = "schema_version_default")]
    pub schema_version: u32,
    pub collaboration_id: String,
    pub requester: String,
    pub collaborators: Vec<String>,
    pub context: Map<String, Value>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub progress: Map<String, Value>,
}

impl CollaborationRecord {
    pub fn active(
        collaboration_id: impl Into<String>,
        requester: impl Into<String>,
        collaborators: Vec<String>,
        context: Map<String, Value>,
    ) -> Self {
        Self {
            schema_version: schema_version_default(),
            collaboration_id: collaboration_id.into(),
            requester: requester.into(),
            collaborators,
            context,
            status: "active".to_string(),
            created_at: Utc::now(),
            progress: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::message::{MessagePriority, MessageType};
    use serde_json::json;

    fn message(sender: &str, recipient: &str) -> AgentMessage {
        let mut content = Map::new();
        content.insert("body".into(), json!("x"));
        AgentMessage::new(
            sender,
            recipient,
            MessageType::Request,
            MessagePriority::Normal,
            "subject",
            content,
        )
    }

    #[test]
    fn test_participants_dedup_insertion_order() {
        let mut thread = ConversationThread::new("thread_1");
        thread.append(message("a", "b"));
        thread.append(message("b", "a"));
        thread.append(message("a", "c"));

        assert_eq!(thread.participants, vec!["a", "b", "c"]);
        assert_eq!(thread.messages.len(), 3);
    }

    #[test]
    fn test_chronological_ordering() {
        let mut thread = ConversationThread::new("thread_1");
        let mut early = message("a", "b");
        early.timestamp = Utc::now() - chrono::Duration::minutes(5);
        let late = message("b", "a");

        thread.append(late.clone());
        thread.append(early.clone());

        let ordered = thread.chronological();
        assert_eq!(ordered[0].id, early.id);
        assert_eq!(ordered[1].id, late.id);
    }

    #[test]
    fn test_schema_version_defaults_on_old_documents() {
        let raw = json!({
            "thread_id": "thread_1",
            "participants": [],
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
            "messages": []
        });
        let thread: ConversationThread = serde_json::from_value(raw).unwrap();
        assert_eq!(thread.schema_version, 1);
    }

    #[test]
    fn test_collaboration_record_starts_active() {
        let record = CollaborationRecord::active(
            "thread_1",
            "planner",
            vec!["coder".into(), "reviewer".into()],
            Map::new(),
        );
        assert_eq!(record.status, "active");
        assert!(record.progress.is_empty());
    }
}
