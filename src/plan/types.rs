use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn schema_version_default() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Archived,
    Complete,
}

/// One phased project plan. A task string lives in exactly one of the three
/// progress sets at a time; `recompute_percentage` maintains the invariant
/// `completed / (completed + active + pending) * 100`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default = "schema_version_default")]
    pub schema_version: u32,
    pub id: String,
    pub status: PlanStatus,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub problem_definition: Map<String, Value>,
    pub strategy: PlanStrategy,
    pub progress: PlanProgress,
    #[serde(default)]
    pub quality_gates: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanStrategy {
    #[serde(default)]
    pub phases: Vec<PlanPhase>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanPhase {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanProgress {
    #[serde(default)]
    pub current_phase: usize,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    #[serde(default)]
    pub active_tasks: Vec<String>,
    #[serde(default)]
    pub pending_tasks: Vec<String>,
    #[serde(default)]
    pub progress_percentage: f64,
}

impl Plan {
    pub fn new(id: impl Into<String>, phases: Vec<PlanPhase>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: schema_version_default(),
            id: id.into(),
            status: PlanStatus::Active,
            metadata: Map::new(),
            problem_definition: Map::new(),
            strategy: PlanStrategy { phases },
            progress: PlanProgress::default(),
            quality_gates: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move a task into the completed set, removing it from active and
    /// pending. Returns false when the task was already completed.
    pub fn complete_task(&mut self, task: &str) -> bool {
        if self.progress.completed_tasks.iter().any(|t| t == task) {
            return false;
        }
        self.progress.active_tasks.retain(|t| t != task);
        self.progress.pending_tasks.retain(|t| t != task);
        self.progress.completed_tasks.push(task.to_string());
        true
    }

    pub fn recompute_percentage(&mut self) {
        let completed = self.progress.completed_tasks.len();
        let total = completed + self.progress.active_tasks.len() + self.progress.pending_tasks.len();
        self.progress.progress_percentage = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
    }

    pub fn current_phase(&self) -> Option<&PlanPhase> {
        self.strategy.phases.get(self.progress.current_phase)
    }
}

/// Pointer record naming the one current plan per project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentPlanPointer {
    pub plan_id: String,
    pub updated_at: DateTime<Utc>,
}

impl CurrentPlanPointer {
    pub fn new(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    Requirement,
    Preference,
    Restriction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintScope {
    Global,
    PhaseSpecific,
    AgentSpecific,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementLevel {
    Strict,
    Flexible,
    Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintStatus {
    Active,
    Resolved,
    Retired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub scope: ConstraintScope,
    pub enforcement_level: EnforcementLevel,
    pub status: ConstraintStatus,
}

impl Default for ConstraintScope {
    fn default() -> Self {
        Self::Global
    }
}

impl Constraint {
    pub fn is_enforced(&self) -> bool {
        self.status == ConstraintStatus::Active && self.enforcement_level == EnforcementLevel::Strict
    }
}

/// All constraints owned by one plan, stored as a single document keyed by
/// the plan id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintSet {
    #[serde(default = "schema_version_default")]
    pub schema_version: u32,
    pub plan_id: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn empty(plan_id: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version_default(),
            plan_id: plan_id.into(),
            constraints: Vec::new(),
        }
    }
}
