//! Inter-agent message routing and conversation threading.

mod engine;
mod message;
mod thread;

pub use engine::{BroadcastDelivery, CollaborationReceipt, CommunicationEngine, SendReceipt};
pub use message::{generate_message_id, generate_thread_id, AgentMessage, MessagePriority, MessageType};
pub use thread::{CollaborationRecord, ConversationThread};
