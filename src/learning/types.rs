use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

fn schema_version_default() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    SuccessPattern,
    FailurePattern,
    PerformancePattern,
}

/// A recurring (context, outcome) observation with accumulated statistics.
/// The id is a deterministic hash of type + agent + context, so repeat
/// observations mutate the same record in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPattern {
    #[serde(default = "schema_version_default")]
    pub schema_version: u32,
    pub pattern_id: String,
    pub pattern_type: PatternType,
    pub agent_name: String,
    pub context: BTreeMap<String, Value>,
    pub outcome: Map<String, Value>,
    pub frequency: u32,
    pub success_rate: f64,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl LearningPattern {
    /// Fold one more observation into the running statistics:
    /// `success_rate` is the running mean of the binary success indicator,
    /// `confidence_score` saturates at ten observations.
    pub fn observe(&mut self, success: bool) {
        self.frequency += 1;
        let indicator = if success { 1.0 } else { 0.0 };
        self.success_rate =
            (self.success_rate * (self.frequency - 1) as f64 + indicator) / self.frequency as f64;
        self.confidence_score = (self.frequency as f64 / 10.0).min(1.0);
        self.last_seen = Utc::now();
    }

    pub fn ranking_score(&self) -> f64 {
        self.success_rate * self.confidence_score
    }
}

/// An actionable condition → action policy derived from an insight, with
/// its own application outcome tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationRule {
    #[serde(default = "schema_version_default")]
    pub schema_version: u32,
    pub rule_id: String,
    pub condition: Map<String, Value>,
    pub action: Map<String, Value>,
    pub agent_scope: Vec<String>,
    pub priority: i32,
    pub success_count: u32,
    pub failure_count: u32,
    pub effectiveness_score: f64,
    pub created_at: DateTime<Utc>,
}

impl AdaptationRule {
    /// Record an application outcome and recompute the effectiveness score.
    /// Until applications exist the score keeps its confidence seed.
    pub fn record_outcome(&mut self, success: bool) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        let total = self.success_count + self.failure_count;
        if total > 0 {
            self.effectiveness_score = self.success_count as f64 / total as f64;
        }
    }

    /// An empty agent filter matches every rule; "all" in the scope matches
    /// every agent.
    pub fn in_scope(&self, agent: &str) -> bool {
        agent.is_empty()
            || self.agent_scope.iter().any(|a| a == agent)
            || self.agent_scope.iter().any(|a| a == "all")
    }

    pub fn action_type(&self) -> Option<&str> {
        self.action.get("type").and_then(Value::as_str)
    }

    pub fn action_description(&self) -> Option<&str> {
        self.action.get("description").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    FailureAnalysis,
    PerformanceOptimization,
}

/// A derived claim synthesized from pattern aggregates. Read-only after
/// creation; actionable insights seed adaptation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningInsight {
    #[serde(default = "schema_version_default")]
    pub schema_version: u32,
    pub insight_id: String,
    pub insight_type: InsightType,
    pub description: String,
    pub evidence: Vec<Value>,
    pub confidence_level: f64,
    pub actionable: bool,
    pub impact_estimate: String,
    pub agents_affected: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn generate_rule_id() -> String {
    timestamped_id("rule")
}

pub(crate) fn generate_insight_id() -> String {
    timestamped_id("insight")
}

fn timestamped_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().format("%Y%m%d_%H%M%S"),
        &Uuid::new_v4().simple().to_string()[..8]
    )
}
