//! Feature extraction and pattern candidate identification from raw
//! interaction data.

use std::collections::BTreeMap;

use chrono::{Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::types::PatternType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityBucket {
    Low,
    Medium,
    High,
}

impl ComplexityBucket {
    /// Bucket by serialized input size: under 100 bytes low, under 1000
    /// medium, else high.
    pub fn from_size(size: usize) -> Self {
        if size < 100 {
            Self::Low
        } else if size < 1000 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceCategory {
    Fast,
    Normal,
    Slow,
}

impl PerformanceCategory {
    /// Bucket by response time: under 1s fast, under 5s normal, else slow.
    pub fn from_response_time(seconds: f64) -> Self {
        if seconds < 1.0 {
            Self::Fast
        } else if seconds < 5.0 {
            Self::Normal
        } else {
            Self::Slow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Normal => "normal",
            Self::Slow => "slow",
        }
    }
}

/// The learning-relevant projection of one interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub agent: String,
    pub task_type: String,
    pub input_complexity: ComplexityBucket,
    pub output_quality: f64,
    pub response_time: f64,
    pub success: bool,
    pub error_type: String,
    pub context_size: usize,
    pub extras: BTreeMap<String, Value>,
}

impl FeatureSnapshot {
    pub fn extract(interaction: &Value) -> Self {
        let get_str = |key: &str| {
            interaction
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let task_type = get_str("task_type");
        let input_size = interaction
            .get("input")
            .map(|v| v.to_string().len())
            .unwrap_or(0);
        let context_size = interaction
            .get("context")
            .map(|v| v.to_string().len())
            .unwrap_or(0);

        let mut extras = BTreeMap::new();
        if task_type.contains("optimization") {
            extras.insert(
                "optimization_algorithm".to_string(),
                interaction.get("algorithm_used").cloned().unwrap_or(json!("")),
            );
            extras.insert(
                "convergence_achieved".to_string(),
                interaction.get("converged").cloned().unwrap_or(json!(false)),
            );
        }
        if task_type.contains("data_analysis") {
            extras.insert(
                "data_size".to_string(),
                interaction.get("data_size").cloned().unwrap_or(json!(0)),
            );
            extras.insert(
                "analysis_depth".to_string(),
                interaction.get("analysis_depth").cloned().unwrap_or(json!("basic")),
            );
        }

        Self {
            agent: get_str("agent"),
            task_type,
            input_complexity: ComplexityBucket::from_size(input_size),
            output_quality: interaction
                .get("quality_score")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            response_time: interaction
                .get("response_time")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            success: interaction
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            error_type: get_str("error_type"),
            context_size,
            extras,
        }
    }
}

/// One pattern the current interaction is evidence for, before it is
/// merged into the store.
#[derive(Debug, Clone)]
pub struct PatternCandidate {
    pub pattern_type: PatternType,
    pub agent_name: String,
    pub context: BTreeMap<String, Value>,
    pub outcome: Map<String, Value>,
    /// Binary success indicator folded into the pattern's running mean.
    pub success_indicator: bool,
}

/// Derive pattern candidates: a success or failure pattern for every
/// interaction, plus a performance pattern when a response time was
/// recorded.
pub fn identify_candidates(features: &FeatureSnapshot) -> Vec<PatternCandidate> {
    let mut candidates = Vec::new();

    if features.success {
        let mut context = BTreeMap::new();
        context.insert("task_type".to_string(), json!(features.task_type));
        context.insert(
            "input_complexity".to_string(),
            json!(features.input_complexity.as_str()),
        );
        context.insert(
            "context_conditions".to_string(),
            json!({
                "complexity": features.input_complexity.as_str(),
                "context_size": features.context_size,
                "time_of_day": Utc::now().hour(),
            }),
        );

        let mut outcome = Map::new();
        outcome.insert("outcome".into(), json!("success"));
        outcome.insert("quality".into(), json!(features.output_quality));

        candidates.push(PatternCandidate {
            pattern_type: PatternType::SuccessPattern,
            agent_name: features.agent.clone(),
            context,
            outcome,
            success_indicator: true,
        });
    } else {
        let mut context = BTreeMap::new();
        context.insert("task_type".to_string(), json!(features.task_type));
        context.insert("error_type".to_string(), json!(features.error_type));
        context.insert(
            "conditions".to_string(),
            json!({
                "complexity": features.input_complexity.as_str(),
                "error_type": features.error_type,
                "response_time": features.response_time,
            }),
        );

        let mut outcome = Map::new();
        outcome.insert("outcome".into(), json!("failure"));
        outcome.insert("error_type".into(), json!(features.error_type));

        candidates.push(PatternCandidate {
            pattern_type: PatternType::FailurePattern,
            agent_name: features.agent.clone(),
            context,
            outcome,
            success_indicator: false,
        });
    }

    if features.response_time > 0.0 {
        let category = PerformanceCategory::from_response_time(features.response_time);

        let mut context = BTreeMap::new();
        context.insert("task_type".to_string(), json!(features.task_type));
        context.insert(
            "complexity".to_string(),
            json!(features.input_complexity.as_str()),
        );
        context.insert("context_size".to_string(), json!(features.context_size));

        let mut outcome = Map::new();
        outcome.insert("performance_category".into(), json!(category.as_str()));
        outcome.insert("response_time".into(), json!(features.response_time));

        candidates.push(PatternCandidate {
            pattern_type: PatternType::PerformancePattern,
            agent_name: features.agent.clone(),
            context,
            outcome,
            success_indicator: features.success,
        });
    }

    candidates
}

/// Deterministic pattern id: SHA-256 of type, agent, and the canonical
/// (key-sorted) JSON of the context.
pub fn pattern_id(
    pattern_type: PatternType,
    agent_name: &str,
    context: &BTreeMap<String, Value>,
) -> String {
    let type_tag = serde_json::to_value(pattern_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let canonical = serde_json::to_string(context).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(type_tag.as_bytes());
    hasher.update(b"_");
    hasher.update(agent_name.as_bytes());
    hasher.update(b"_");
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}
