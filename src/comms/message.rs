use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Request,
    Response,
    Broadcast,
    Handoff,
    StatusUpdate,
    ErrorReport,
    Coordination,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Broadcast => "broadcast",
            Self::Handoff => "handoff",
            Self::StatusUpdate => "status_update",
            Self::ErrorReport => "error_report",
            Self::Coordination => "coordination",
        }
    }
}

/// Delivery priority. Variant order defines the sort order used by
/// `receive`: `Critical` ranks above `High` ranks above `Normal` above `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Low,
    Normal,
    High,
    Critical,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default = "generate_message_id")]
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub message_type: MessageType,
    pub priority: MessagePriority,
    pub subject: String,
    pub content: Map<String, Value>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requires_response: bool,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl AgentMessage {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        message_type: MessageType,
        priority: MessagePriority,
        subject: impl Into<String>,
        content: Map<String, Value>,
    ) -> Self {
        Self {
            id: generate_message_id(),
            sender: sender.into(),
            recipient: recipient.into(),
            message_type,
            priority,
            subject: subject.into(),
            content,
            context: Map::new(),
            timestamp: Utc::now(),
            expires_at: None,
            requires_response: false,
            correlation_id: None,
            thread_id: None,
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn requires_response(mut self, required: bool) -> Self {
        self.requires_response = required;
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry < now)
    }
}

pub fn generate_message_id() -> String {
    prefixed_id("msg")
}

pub fn generate_thread_id() -> String {
    prefixed_id("thread")
}

fn prefixed_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().format("%Y%m%d_%H%M%S"),
        &Uuid::new_v4().simple().to_string()[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn content() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("body".into(), json!("hello"));
        map
    }

    #[test]
    fn test_priority_ordering() {
        assert!(MessagePriority::Critical > MessagePriority::High);
        assert!(MessagePriority::High > MessagePriority::Normal);
        assert!(MessagePriority::Normal > MessagePriority::Low);
    }

    #[test]
    fn test_message_builder() {
        let msg = AgentMessage::new(
            "planner",
            "coder",
            MessageType::Request,
            MessagePriority::Normal,
            "build it",
            content(),
        )
        .with_thread("thread_x")
        .requires_response(true);

        assert_eq!(msg.sender, "planner");
        assert_eq!(msg.thread_id.as_deref(), Some("thread_x"));
        assert!(msg.requires_response);
        assert!(msg.id.starts_with("msg_"));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let fresh = AgentMessage::new(
            "a",
            "b",
            MessageType::Request,
            MessagePriority::Low,
            "s",
            content(),
        );
        assert!(!fresh.is_expired(now));

        let expired = fresh.clone().with_expiry(now - Duration::minutes(1));
        assert!(expired.is_expired(now));

        let live = fresh.with_expiry(now + Duration::minutes(1));
        assert!(!live.is_expired(now));
    }

    #[test]
    fn test_serde_snake_case_tags() {
        let json = serde_json::to_value(MessageType::StatusUpdate).unwrap();
        assert_eq!(json, json!("status_update"));
        let json = serde_json::to_value(MessagePriority::Critical).unwrap();
        assert_eq!(json, json!("critical"));
    }

    #[test]
    fn test_id_formats() {
        assert!(generate_message_id().starts_with("msg_"));
        assert!(generate_thread_id().starts_with("thread_"));
        assert_ne!(generate_message_id(), generate_message_id());
    }
}
