//! Message delivery, inbox management, and conversation threading.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::message::{generate_thread_id, AgentMessage, MessagePriority, MessageType};
use super::thread::{CollaborationRecord, ConversationThread};
use crate::config::{AgentProfile, CoordConfig, CoordPaths};
use crate::error::{CoordError, Result};
use crate::store::{LogSink, RecordStore};

const AUDIT_LOG: &str = "communication.log";
const EVENTS_LOG: &str = "events.log";

const THREADS: &str = "conversations";
const COLLABORATIONS: &str = "collaborations";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub thread_id: String,
    pub routing_info: RoutingInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingInfo {
    pub agent: String,
    pub capabilities: Vec<String>,
    pub queue_path: String,
}

/// Outcome of one broadcast or collaboration delivery. Failures are
/// reported per target, never aborting the remaining deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastDelivery {
    pub agent: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationReceipt {
    pub collaboration_id: String,
    pub invitations: Vec<BroadcastDelivery>,
}

pub struct CommunicationEngine {
    store: RecordStore,
    logs: LogSink,
    agents: BTreeMap<String, AgentProfile>,
}

impl CommunicationEngine {
    pub fn new(paths: &CoordPaths, config: &CoordConfig) -> Self {
        Self::with_dir(paths.communication_dir(), config)
    }

    pub fn with_dir(dir: PathBuf, config: &CoordConfig) -> Self {
        Self {
            store: RecordStore::new(dir.clone()),
            logs: LogSink::new(dir, config.logging.retention_days),
            agents: config.agents.clone(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.store.init().await
    }

    /// Deliver a message: sender outbox copy, recipient inbox copy, thread
    /// append, audit log entry, strictly in that order. Validation happens
    /// before any write, so a rejected message leaves no partial state.
    pub async fn send(&self, mut message: AgentMessage) -> Result<SendReceipt> {
        self.validate(&message)?;

        let thread_id = match message.thread_id.clone() {
            Some(id) => id,
            None => {
                let id = generate_thread_id();
                message.thread_id = Some(id.clone());
                id
            }
        };

        self.store
            .put(&outbox(&message.sender), &message.id, &message)
            .await?;
        self.store
            .put(&inbox(&message.recipient), &message.id, &message)
            .await?;
        self.append_to_thread(&thread_id, message.clone()).await?;

        self.logs
            .append(
                AUDIT_LOG,
                &json!({
                    "action": "sent",
                    "message_id": message.id,
                    "sender": message.sender,
                    "recipient": message.recipient,
                    "message_type": message.message_type.as_str(),
                    "priority": message.priority.as_str(),
                    "subject": message.subject,
                }),
            )
            .await?;

        debug!(
            message_id = %message.id,
            sender = %message.sender,
            recipient = %message.recipient,
            "Message delivered"
        );

        Ok(SendReceipt {
            message_id: message.id,
            timestamp: message.timestamp,
            thread_id,
            routing_info: self.routing_info(&message.recipient),
        })
    }

    /// An agent's inbox, optionally filtered by type. Expired messages are
    /// archived (reason "expired") exactly once and never returned. The
    /// remainder is sorted by priority descending, then timestamp
    /// descending.
    pub async fn receive(
        &self,
        agent: &str,
        type_filter: Option<MessageType>,
    ) -> Result<Vec<AgentMessage>> {
        let now = Utc::now();
        let all: Vec<AgentMessage> = self.store.list(&inbox(agent)).await?;
        let mut messages = Vec::with_capacity(all.len());

        for message in all {
            if let Some(filter) = type_filter {
                if message.message_type != filter {
                    continue;
                }
            }
            if message.is_expired(now) {
                self.archive(agent, message, "expired").await?;
                continue;
            }
            messages.push(message);
        }

        messages.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.timestamp.cmp(&a.timestamp))
        });

        Ok(messages)
    }

    /// Move a message from inbox to the processed area. A second call for
    /// the same id fails with `NotFound`.
    pub async fn process(&self, agent: &str, message_id: &str) -> Result<()> {
        let message: AgentMessage = self
            .store
            .try_get(&inbox(agent), message_id)
            .await?
            .ok_or_else(|| CoordError::NotFound(format!("Message {} not found", message_id)))?;

        self.store
            .put(&processed(agent), message_id, &message)
            .await?;
        self.store.remove(&inbox(agent), message_id).await?;

        self.logs
            .append(
                EVENTS_LOG,
                &json!({"agent": agent, "message_id": message_id, "event": "processed"}),
            )
            .await?;

        Ok(())
    }

    /// Transfer a task to another agent: HANDOFF priority High, response
    /// required, fresh thread. Task context fields pass through verbatim.
    pub async fn handoff(
        &self,
        from_agent: &str,
        to_agent: &str,
        task_context: Map<String, Value>,
    ) -> Result<SendReceipt> {
        let task_name = task_context
            .get("task_name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Task");

        let mut content = Map::new();
        content.insert("handoff_type".into(), json!("task_transfer"));
        content.insert("task_context".into(), Value::Object(task_context.clone()));
        for key in ["completion_requirements", "expected_outputs", "constraints", "deadline"] {
            content.insert(
                key.into(),
                task_context.get(key).cloned().unwrap_or(Value::Null),
            );
        }
        content.insert(
            "priority_level".into(),
            task_context.get("priority").cloned().unwrap_or(json!("normal")),
        );

        let mut context = Map::new();
        context.insert("handoff_timestamp".into(), json!(Utc::now().to_rfc3339()));
        context.insert(
            "originating_request".into(),
            task_context.get("original_request").cloned().unwrap_or(Value::Null),
        );
        context.insert(
            "previous_work".into(),
            task_context.get("previous_work").cloned().unwrap_or(json!({})),
        );

        let message = AgentMessage::new(
            from_agent,
            to_agent,
            MessageType::Handoff,
            MessagePriority::High,
            format!("Task Handoff: {}", task_name),
            content,
        )
        .with_context(context)
        .with_thread(generate_thread_id())
        .requires_response(true);

        self.send(message).await
    }

    /// Independent BROADCAST/Normal message per target; defaults to every
    /// known agent except the sender. A failed delivery to one target does
    /// not abort the rest.
    pub async fn broadcast(
        &self,
        sender: &str,
        subject: &str,
        content: Map<String, Value>,
        target_agents: Option<Vec<String>>,
    ) -> Result<Vec<BroadcastDelivery>> {
        let targets = target_agents
            .unwrap_or_else(|| self.agents.keys().cloned().collect());

        let mut results = Vec::new();
        for target in &targets {
            if target == sender {
                continue;
            }

            let mut context = Map::new();
            context.insert("broadcast_group".into(), json!(targets));
            context.insert("broadcast_timestamp".into(), json!(Utc::now().to_rfc3339()));

            let message = AgentMessage::new(
                sender,
                target.clone(),
                MessageType::Broadcast,
                MessagePriority::Normal,
                subject,
                content.clone(),
            )
            .with_context(context);

            results.push(match self.send(message).await {
                Ok(receipt) => BroadcastDelivery {
                    agent: target.clone(),
                    success: true,
                    message_id: Some(receipt.message_id),
                    error: None,
                },
                Err(e) => BroadcastDelivery {
                    agent: target.clone(),
                    success: false,
                    message_id: None,
                    error: Some(e.to_string()),
                },
            });
        }

        Ok(results)
    }

    /// Invite several agents into one shared conversation. Every invitation
    /// carries the same thread id, and a tracking record (status "active")
    /// is stored under that id.
    pub async fn request_collaboration(
        &self,
        requester: &str,
        collaborators: Vec<String>,
        collaboration_context: Map<String, Value>,
    ) -> Result<CollaborationReceipt> {
        let collaboration_id = generate_thread_id();
        let objective = collaboration_context
            .get("objective")
            .and_then(Value::as_str)
            .unwrap_or("Multi-Agent Task")
            .to_string();

        let mut invitations = Vec::new();
        for collaborator in &collaborators {
            let mut content = Map::new();
            content.insert("collaboration_type".into(), json!("multi_agent_coordination"));
            content.insert(
                "objective".into(),
                collaboration_context.get("objective").cloned().unwrap_or(Value::Null),
            );
            for key in ["role_assignment", "coordination_plan", "timeline"] {
                content.insert(
                    key.into(),
                    collaboration_context.get(key).cloned().unwrap_or(json!({})),
                );
            }
            content.insert(
                "success_criteria".into(),
                collaboration_context
                    .get("success_criteria")
                    .cloned()
                    .unwrap_or(json!([])),
            );

            let mut context = Map::new();
            context.insert("collaboration_id".into(), json!(collaboration_id));
            context.insert("all_collaborators".into(), json!(collaborators));

            let message = AgentMessage::new(
                requester,
                collaborator.clone(),
                MessageType::Coordination,
                MessagePriority::High,
                format!("Collaboration Request: {}", objective),
                content,
            )
            .with_context(context)
            .with_thread(collaboration_id.clone())
            .requires_response(true);

            invitations.push(match self.send(message).await {
                Ok(receipt) => BroadcastDelivery {
                    agent: collaborator.clone(),
                    success: true,
                    message_id: Some(receipt.message_id),
                    error: None,
                },
                Err(e) => BroadcastDelivery {
                    agent: collaborator.clone(),
                    success: false,
                    message_id: None,
                    error: Some(e.to_string()),
                },
            });
        }

        let record = CollaborationRecord::active(
            collaboration_id.clone(),
            requester,
            collaborators,
            collaboration_context,
        );
        self.store
            .put(COLLABORATIONS, &collaboration_id, &record)
            .await?;

        Ok(CollaborationReceipt {
            collaboration_id,
            invitations,
        })
    }

    /// Thread messages in chronological order. Unknown thread is an empty
    /// history, not an error.
    pub async fn conversation_history(&self, thread_id: &str) -> Result<Vec<AgentMessage>> {
        match self
            .store
            .try_get::<ConversationThread>(THREADS, thread_id)
            .await?
        {
            Some(thread) => Ok(thread.chronological()),
            None => Ok(Vec::new()),
        }
    }

    pub async fn collaboration(&self, collaboration_id: &str) -> Result<Option<CollaborationRecord>> {
        self.store.try_get(COLLABORATIONS, collaboration_id).await
    }

    /// Retention sweep over the audit and event logs.
    pub async fn sweep_logs(&self) -> Result<usize> {
        let mut removed = self.logs.sweep(AUDIT_LOG).await?;
        removed += self.logs.sweep(EVENTS_LOG).await?;
        Ok(removed)
    }

    fn validate(&self, message: &AgentMessage) -> Result<()> {
        if message.sender.is_empty() || message.recipient.is_empty() {
            return Err(CoordError::Validation(
                "Message must have sender and recipient".into(),
            ));
        }
        if !self.agents.contains_key(&message.recipient) {
            return Err(CoordError::UnknownRecipient(message.recipient.clone()));
        }
        if message.subject.is_empty() || message.content.is_empty() {
            return Err(CoordError::Validation(
                "Message must have subject and content".into(),
            ));
        }
        Ok(())
    }

    async fn append_to_thread(&self, thread_id: &str, message: AgentMessage) -> Result<()> {
        let mut thread = self
            .store
            .try_get::<ConversationThread>(THREADS, thread_id)
            .await?
            .unwrap_or_else(|| ConversationThread::new(thread_id));
        thread.append(message);
        self.store.put(THREADS, thread_id, &thread).await
    }

    async fn archive(&self, agent: &str, message: AgentMessage, reason: &str) -> Result<()> {
        let category = format!("archive/{}", reason);
        self.store.put(&category, &message.id, &message).await?;
        self.store.remove(&inbox(agent), &message.id).await?;

        self.logs
            .append(
                EVENTS_LOG,
                &json!({
                    "agent": agent,
                    "message_id": message.id,
                    "event": format!("archived_{}", reason),
                }),
            )
            .await?;

        Ok(())
    }

    fn routing_info(&self, agent: &str) -> RoutingInfo {
        RoutingInfo {
            agent: agent.to_string(),
            capabilities: self
                .agents
                .get(agent)
                .map(|profile| profile.capabilities.clone())
                .unwrap_or_default(),
            queue_path: self
                .store
                .root()
                .join(inbox(agent))
                .display()
                .to_string(),
        }
    }
}

fn inbox(agent: &str) -> String {
    format!("queues/{}/inbox", agent)
}

fn outbox(agent: &str) -> String {
    format!("queues/{}/outbox", agent)
}

fn processed(agent: &str) -> String {
    format!("queues/{}/processed", agent)
}
