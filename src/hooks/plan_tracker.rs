//! Operation surface of the plan-tracker hook.

use serde_json::{json, Map, Value};

use super::{
    body_of, envelope, error_response, operation_of, parse_input, unknown_operation,
    PLAN_TRACKER_HOOK,
};
use crate::config::CoordPaths;
use crate::error::Result;
use crate::plan::PlanTracker;

/// Run one plan-tracker invocation. The operation defaults to `validate`
/// when the field is absent. Returns `None` for empty input.
pub async fn run_plan_tracker_hook(paths: &CoordPaths, input: &str) -> Option<Value> {
    let data = match parse_input(PLAN_TRACKER_HOOK, input) {
        Ok(Some(data)) => data,
        Ok(None) => return None,
        Err(response) => return Some(response),
    };

    let tracker = PlanTracker::new(paths);
    if let Err(e) = tracker.init().await {
        return Some(error_response(PLAN_TRACKER_HOOK, &e));
    }

    let operation = operation_of(&data, "validate").to_string();
    let result = dispatch(&tracker, &operation, &data).await;

    Some(match result {
        Ok(Some(body)) => envelope(PLAN_TRACKER_HOOK, body),
        Ok(None) => unknown_operation(PLAN_TRACKER_HOOK, &operation),
        Err(e) => error_response(PLAN_TRACKER_HOOK, &e),
    })
}

async fn dispatch(
    tracker: &PlanTracker,
    operation: &str,
    data: &Value,
) -> Result<Option<Map<String, Value>>> {
    let empty = json!({});

    let body = match operation {
        "validate" => {
            let request_data = data.get("request_data").unwrap_or(&empty);
            body_of(&tracker.validate(request_data).await?)?
        }
        "update_progress" => {
            let activity_data = data.get("activity_data").unwrap_or(&empty);
            body_of(&tracker.update_progress(activity_data).await?)?
        }
        "suggest_actions" => {
            let context = data.get("context").unwrap_or(&empty);
            body_of(&tracker.suggest_next_actions(context).await?)?
        }
        "enforce_sequence" => {
            let request_data = data.get("request_data").unwrap_or(&empty);
            body_of(&tracker.enforce_sequence(request_data).await?)?
        }
        _ => return Ok(None),
    };

    Ok(Some(body))
}
