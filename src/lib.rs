pub mod comms;
pub mod config;
pub mod error;
pub mod hooks;
pub mod learning;
pub mod plan;
pub mod store;
pub mod utils;

pub use comms::{AgentMessage, CommunicationEngine, MessagePriority, MessageType};
pub use config::{AgentProfile, CoordConfig, CoordPaths};
pub use error::{CoordError, Result};
pub use learning::LearningEngine;
pub use plan::PlanTracker;
pub use store::{LogSink, RecordStore};
