//! The stdin/stdout hook protocol.
//!
//! Every hook reads one JSON object, dispatches on its `operation` field
//! through a closed match, and emits one JSON object. Empty input is a
//! silent no-op. Failures of any kind become structured JSON responses;
//! a hook invocation never crashes the caller's pipeline.

mod communication;
mod learning;
mod plan_tracker;

pub use communication::run_communication_hook;
pub use learning::run_learning_hook;
pub use plan_tracker::run_plan_tracker_hook;

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::error::CoordError;

pub const COMMUNICATION_HOOK: &str = "agent-communication";
pub const PLAN_TRACKER_HOOK: &str = "plan-tracker";
pub const LEARNING_HOOK: &str = "learning-engine";

/// Wrap an operation result body with the hook name and a timestamp.
pub(crate) fn envelope(hook: &str, body: Map<String, Value>) -> Value {
    let mut map = Map::new();
    map.insert("hook".into(), json!(hook));
    map.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
    for (key, value) in body {
        map.insert(key, value);
    }
    Value::Object(map)
}

/// Structured failure response. Hook invocations never crash the caller's
/// pipeline; even setup failures come back as parseable JSON.
pub fn error_response(hook: &str, error: &CoordError) -> Value {
    let mut body = Map::new();
    body.insert("success".into(), json!(false));
    body.insert("error".into(), json!(error.to_string()));
    envelope(hook, body)
}

pub(crate) fn unknown_operation(hook: &str, operation: &str) -> Value {
    let mut body = Map::new();
    body.insert("success".into(), json!(false));
    body.insert("error".into(), json!(format!("Unknown operation: {}", operation)));
    envelope(hook, body)
}

pub(crate) fn invalid_json(hook: &str) -> Value {
    json!({"error": "Invalid JSON input", "hook": hook})
}

/// Parse hook input. `Ok(None)` means empty input (no-op); `Err` carries
/// the malformed-input response to print as-is.
pub(crate) fn parse_input(hook: &str, input: &str) -> Result<Option<Value>, Value> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(input) {
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(invalid_json(hook)),
    }
}

pub(crate) fn operation_of<'a>(data: &'a Value, default: &'a str) -> &'a str {
    data.get("operation").and_then(Value::as_str).unwrap_or(default)
}

/// Convert a typed operation result into a response body map.
pub(crate) fn body_of<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>, CoordError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("result".into(), other);
            Ok(map)
        }
    }
}
