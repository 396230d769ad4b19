//! Operation surface of the learning-engine hook.

use serde_json::{json, Map, Value};

use super::{
    body_of, envelope, error_response, operation_of, parse_input, unknown_operation, LEARNING_HOOK,
};
use crate::config::{CoordConfig, CoordPaths};
use crate::error::Result;
use crate::learning::LearningEngine;

/// Run one learning-engine invocation. Returns `None` for empty input.
pub async fn run_learning_hook(
    paths: &CoordPaths,
    config: &CoordConfig,
    input: &str,
) -> Option<Value> {
    let data = match parse_input(LEARNING_HOOK, input) {
        Ok(Some(data)) => data,
        Ok(None) => return None,
        Err(response) => return Some(response),
    };

    let mut engine = LearningEngine::new(paths, config);
    if let Err(e) = engine.init().await {
        return Some(error_response(LEARNING_HOOK, &e));
    }

    let operation = operation_of(&data, "").to_string();
    let result = dispatch(&mut engine, &operation, &data).await;

    Some(match result {
        Ok(Some(body)) => envelope(LEARNING_HOOK, body),
        Ok(None) => unknown_operation(LEARNING_HOOK, &operation),
        Err(e) => error_response(LEARNING_HOOK, &e),
    })
}

async fn dispatch(
    engine: &mut LearningEngine,
    operation: &str,
    data: &Value,
) -> Result<Option<Map<String, Value>>> {
    let empty = json!({});

    let body = match operation {
        "learn" => {
            let interaction = data.get("interaction_data").unwrap_or(&empty);
            let summary = engine.learn(interaction).await?;
            let mut body = body_of(&summary)?;
            body.insert("success".into(), json!(true));
            body
        }
        "get_recommendations" => {
            let context = data.get("context").unwrap_or(&empty);
            let recommendations = engine.get_recommendations(context).await?;
            let mut body = body_of(&recommendations)?;
            body.insert("success".into(), json!(true));
            body
        }
        "analyze_trends" => {
            let agent = data.get("agent_name").and_then(Value::as_str);
            let time_range = data
                .get("time_range")
                .and_then(Value::as_str)
                .unwrap_or("7d");
            let analysis = engine.analyze_trends(agent, time_range).await?;
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert("analysis".into(), serde_json::to_value(analysis)?);
            body
        }
        "adapt_behavior" => {
            let agent = data
                .get("agent_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let context = data.get("adaptation_context").unwrap_or(&empty);
            let outcome = engine.adapt_behavior(&agent, context).await?;
            let mut body = body_of(&outcome)?;
            body.insert("success".into(), json!(true));
            body
        }
        "generate_report" => {
            let report = engine.generate_report().await?;
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert("report".into(), serde_json::to_value(report)?);
            body
        }
        _ => return Ok(None),
    };

    Ok(Some(body))
}
