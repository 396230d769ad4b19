//! Operation surface of the agent-communication hook.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{
    body_of, envelope, error_response, operation_of, parse_input, unknown_operation,
    COMMUNICATION_HOOK,
};
use crate::comms::{AgentMessage, CommunicationEngine, MessageType};
use crate::config::{CoordConfig, CoordPaths};
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    message: AgentMessage,
}

#[derive(Debug, Deserialize)]
struct ReceiveMessagesRequest {
    agent_name: String,
    #[serde(default)]
    message_type: Option<MessageType>,
}

#[derive(Debug, Deserialize)]
struct SendHandoffRequest {
    from_agent: String,
    to_agent: String,
    #[serde(default)]
    task_context: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct BroadcastRequest {
    sender: String,
    subject: String,
    #[serde(default)]
    content: Map<String, Value>,
    #[serde(default)]
    target_agents: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CollaborationRequest {
    requester: String,
    collaborators: Vec<String>,
    #[serde(default)]
    collaboration_context: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ConversationRequest {
    thread_id: String,
}

/// Run one agent-communication invocation. Returns `None` for empty input.
pub async fn run_communication_hook(
    paths: &CoordPaths,
    config: &CoordConfig,
    input: &str,
) -> Option<Value> {
    let data = match parse_input(COMMUNICATION_HOOK, input) {
        Ok(Some(data)) => data,
        Ok(None) => return None,
        Err(response) => return Some(response),
    };

    let engine = CommunicationEngine::new(paths, config);
    if let Err(e) = engine.init().await {
        return Some(error_response(COMMUNICATION_HOOK, &e));
    }

    let operation = operation_of(&data, "").to_string();
    let result = dispatch(&engine, &operation, &data).await;

    Some(match result {
        Ok(Some(body)) => envelope(COMMUNICATION_HOOK, body),
        Ok(None) => unknown_operation(COMMUNICATION_HOOK, &operation),
        Err(e) => error_response(COMMUNICATION_HOOK, &e),
    })
}

/// Closed operation dispatch; `Ok(None)` marks an unrecognized operation.
async fn dispatch(
    engine: &CommunicationEngine,
    operation: &str,
    data: &Value,
) -> Result<Option<Map<String, Value>>> {
    let body = match operation {
        "send_message" => {
            let request: SendMessageRequest = serde_json::from_value(data.clone())?;
            let receipt = engine.send(request.message).await?;
            let mut body = body_of(&receipt)?;
            body.insert("success".into(), json!(true));
            body
        }
        "receive_messages" => {
            let request: ReceiveMessagesRequest = serde_json::from_value(data.clone())?;
            let messages = engine
                .receive(&request.agent_name, request.message_type)
                .await?;
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert("count".into(), json!(messages.len()));
            body.insert("messages".into(), serde_json::to_value(messages)?);
            body
        }
        "process_message" => {
            let agent = data
                .get("agent_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let message_id = data
                .get("message_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            engine.process(&agent, &message_id).await?;
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert("message".into(), json!("Message marked as processed"));
            body
        }
        "send_handoff" => {
            let request: SendHandoffRequest = serde_json::from_value(data.clone())?;
            let receipt = engine
                .handoff(&request.from_agent, &request.to_agent, request.task_context)
                .await?;
            let mut body = body_of(&receipt)?;
            body.insert("success".into(), json!(true));
            body
        }
        "broadcast" => {
            let request: BroadcastRequest = serde_json::from_value(data.clone())?;
            let results = engine
                .broadcast(
                    &request.sender,
                    &request.subject,
                    request.content,
                    request.target_agents,
                )
                .await?;
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert("broadcast_results".into(), serde_json::to_value(results)?);
            body
        }
        "request_collaboration" => {
            let request: CollaborationRequest = serde_json::from_value(data.clone())?;
            let receipt = engine
                .request_collaboration(
                    &request.requester,
                    request.collaborators,
                    request.collaboration_context,
                )
                .await?;
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert("collaboration_id".into(), json!(receipt.collaboration_id));
            body.insert(
                "invitation_results".into(),
                serde_json::to_value(receipt.invitations)?,
            );
            body
        }
        "get_conversation" => {
            let request: ConversationRequest = serde_json::from_value(data.clone())?;
            let messages = engine.conversation_history(&request.thread_id).await?;
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert("message_count".into(), json!(messages.len()));
            body.insert("conversation".into(), serde_json::to_value(messages)?);
            body
        }
        _ => return Ok(None),
    };

    Ok(Some(body))
}
