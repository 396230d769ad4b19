//! Request validation, progress updates, and sequence enforcement against
//! the current plan.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::types::{
    Constraint, ConstraintSet, ConstraintType, CurrentPlanPointer, Plan, PlanStatus,
};
use crate::config::CoordPaths;
use crate::error::Result;
use crate::store::RecordStore;
use crate::utils::text::{containment_percentage, searchable_text, shares_word, significant_tokens};

const PLANS: &str = "plans";
const CONSTRAINTS: &str = "constraints";
const CURRENT_PLAN: &str = "current_plan";

/// Phase-keyword alignment bands.
const ALIGNED_THRESHOLD: f64 = 70.0;
const PARTIAL_THRESHOLD: f64 = 30.0;
/// Neutral score when a phase declares no keywords.
const NEUTRAL_ALIGNMENT: f64 = 50.0;
/// Completed share of a phase's declared tasks before advancing is suggested.
const PHASE_ADVANCE_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
    pub plan_adherence: String,
}

impl ValidationReport {
    fn permissive() -> Self {
        Self {
            valid: true,
            warnings: Vec::new(),
            errors: Vec::new(),
            suggestions: Vec::new(),
            plan_adherence: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub success: bool,
    pub message: String,
    pub completed_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSuggestions {
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub allowed: bool,
    pub message: String,
}

impl CheckResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceEnforcement {
    pub allowed: bool,
    pub phase_check: CheckResult,
    pub dependency_check: CheckResult,
    pub prerequisite_check: CheckResult,
    pub recommendations: Vec<String>,
}

pub struct PlanTracker {
    store: RecordStore,
}

impl PlanTracker {
    pub fn new(paths: &CoordPaths) -> Self {
        Self::with_dir(paths.memory_dir())
    }

    pub fn with_dir(dir: PathBuf) -> Self {
        Self {
            store: RecordStore::new(dir),
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.store.init().await
    }

    /// The current plan: pointer record first, falling back to the most
    /// recently updated active plan when the pointer is missing or
    /// dangling. Absence of any plan is not an error.
    pub async fn current_plan(&self) -> Result<Option<Plan>> {
        if let Some(pointer) = self
            .store
            .try_get::<CurrentPlanPointer>("", CURRENT_PLAN)
            .await?
        {
            if let Some(plan) = self.store.try_get::<Plan>(PLANS, &pointer.plan_id).await? {
                return Ok(Some(plan));
            }
        }

        let mut active: Vec<Plan> = self
            .store
            .list::<Plan>(PLANS)
            .await?
            .into_iter()
            .filter(|p| p.status == PlanStatus::Active)
            .collect();
        active.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(active.into_iter().next())
    }

    /// Persist a plan and point the current-plan record at it.
    pub async fn save_plan(&self, plan: &Plan) -> Result<()> {
        self.store.put(PLANS, &plan.id, plan).await?;
        self.store
            .put("", CURRENT_PLAN, &CurrentPlanPointer::new(plan.id.clone()))
            .await
    }

    pub async fn constraints_for(&self, plan_id: &str) -> Result<ConstraintSet> {
        let id = format!("{}_constraints", plan_id);
        Ok(self
            .store
            .try_get(CONSTRAINTS, &id)
            .await?
            .unwrap_or_else(|| ConstraintSet::empty(plan_id)))
    }

    pub async fn save_constraints(&self, set: &ConstraintSet) -> Result<()> {
        let id = format!("{}_constraints", set.plan_id);
        self.store.put(CONSTRAINTS, &id, set).await
    }

    /// Validate a request against the current plan and its strict
    /// constraints. No active plan degrades to valid-with-warning.
    pub async fn validate(&self, request_data: &Value) -> Result<ValidationReport> {
        let mut report = ValidationReport::permissive();

        let Some(plan) = self.current_plan().await? else {
            report
                .warnings
                .push("No active plan found - proceeding without plan validation".to_string());
            return Ok(report);
        };

        let request_text = searchable_text(request_data);

        let constraints = self.constraints_for(&plan.id).await?;
        for violation in check_constraints(&request_text, &constraints.constraints) {
            report.valid = false;
            report.errors.push(violation);
        }

        let alignment = check_phase_alignment(&request_text, &plan);
        report.plan_adherence = alignment.status;
        report.suggestions.extend(alignment.suggestions);

        let (warnings, suggestions) = check_priority_alignment(&request_text, &plan);
        report.warnings.extend(warnings);
        report.suggestions.extend(suggestions);

        Ok(report)
    }

    /// Mark plan tasks matched by the activity text as completed and
    /// recompute the progress percentage. Matching nothing is a success.
    pub async fn update_progress(&self, activity_data: &Value) -> Result<ProgressUpdate> {
        let Some(mut plan) = self.current_plan().await? else {
            return Ok(ProgressUpdate {
                success: false,
                message: "No active plan to update".to_string(),
                completed_items: Vec::new(),
                progress_percentage: None,
            });
        };

        let activity_text = searchable_text(activity_data);
        let candidates: Vec<String> = plan
            .progress
            .active_tasks
            .iter()
            .chain(plan.progress.pending_tasks.iter())
            .filter(|task| shares_word(task, &activity_text))
            .cloned()
            .collect();

        if candidates.is_empty() {
            return Ok(ProgressUpdate {
                success: true,
                message: "No plan items matched this activity".to_string(),
                completed_items: Vec::new(),
                progress_percentage: Some(plan.progress.progress_percentage),
            });
        }

        for task in &candidates {
            plan.complete_task(task);
        }
        plan.recompute_percentage();
        plan.updated_at = Utc::now();
        self.save_plan(&plan).await?;

        debug!(
            plan_id = %plan.id,
            completed = candidates.len(),
            percentage = plan.progress.progress_percentage,
            "Plan progress updated"
        );

        Ok(ProgressUpdate {
            success: true,
            message: format!("Updated progress - completed {} items", candidates.len()),
            completed_items: candidates,
            progress_percentage: Some(plan.progress.progress_percentage),
        })
    }

    /// Next-action suggestions from the current plan state: continue active
    /// tasks, else start pending ones; flag phase-advance readiness.
    pub async fn suggest_next_actions(&self, _context: &Value) -> Result<ActionSuggestions> {
        let Some(plan) = self.current_plan().await? else {
            return Ok(ActionSuggestions {
                suggestions: vec![
                    "Create a project plan to guide systematic development".to_string()
                ],
                current_phase: None,
                phase_name: None,
                progress: None,
            });
        };

        let mut suggestions = Vec::new();
        let phase_index = plan.progress.current_phase;
        let phases = &plan.strategy.phases;

        let phase_name = if let Some(phase) = plan.current_phase() {
            let active = &plan.progress.active_tasks;
            let pending = &plan.progress.pending_tasks;

            if active.is_empty() && !pending.is_empty() {
                suggestions.push(format!("Start working on next tasks for {}", phase.name));
                suggestions.extend(pending.iter().take(3).cloned());
            } else if !active.is_empty() {
                suggestions.push("Continue working on active tasks:".to_string());
                suggestions.extend(active.iter().cloned());
            }

            if self.has_unresolved_blockers(&plan) {
                suggestions.insert(
                    0,
                    "Address unresolved blockers before proceeding".to_string(),
                );
            }

            if phase_completion_percentage(&plan, phase_index) >= PHASE_ADVANCE_THRESHOLD {
                let next = phases
                    .get(phase_index + 1)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "Project completion".to_string());
                suggestions.push(format!("Ready to advance to next phase: {}", next));
            }

            phase.name.clone()
        } else {
            suggestions.push("All phases complete - consider project review and reflection".to_string());
            "Complete".to_string()
        };

        Ok(ActionSuggestions {
            suggestions,
            current_phase: Some(phase_index),
            phase_name: Some(phase_name),
            progress: Some(plan.progress.progress_percentage),
        })
    }

    /// Conjunction of the phase, dependency, and prerequisite checks. The
    /// sub-checks are extension points that currently always allow; the
    /// plumbing around them is real so a concrete plan model can fill them
    /// in without touching callers.
    pub async fn enforce_sequence(&self, request_data: &Value) -> Result<SequenceEnforcement> {
        let plan = self.current_plan().await?;

        let (phase_check, dependency_check, prerequisite_check) = match &plan {
            Some(plan) => (
                self.check_phase_appropriateness(request_data, plan),
                self.check_dependencies(request_data, plan),
                self.check_prerequisites(request_data, plan),
            ),
            None => (
                CheckResult::pass("No plan constraints"),
                CheckResult::pass("No plan constraints"),
                CheckResult::pass("No plan constraints"),
            ),
        };

        let allowed = phase_check.allowed && dependency_check.allowed && prerequisite_check.allowed;
        let mut recommendations = Vec::new();
        if !allowed {
            recommendations.extend([
                "Consider following the planned sequence for better outcomes".to_string(),
                "If this is intentional, update the plan to reflect new priorities".to_string(),
                "Ensure prerequisites are met before proceeding".to_string(),
            ]);
        }

        Ok(SequenceEnforcement {
            allowed,
            phase_check,
            dependency_check,
            prerequisite_check,
            recommendations,
        })
    }

    // Extension point: no blocker source is wired up yet.
    fn has_unresolved_blockers(&self, _plan: &Plan) -> bool {
        false
    }

    // Extension point: phase gating needs richer phase metadata.
    fn check_phase_appropriateness(&self, _request: &Value, _plan: &Plan) -> CheckResult {
        CheckResult::pass("Phase check passed")
    }

    // Extension point: task dependency graphs are not modeled yet.
    fn check_dependencies(&self, _request: &Value, _plan: &Plan) -> CheckResult {
        CheckResult::pass("Dependencies satisfied")
    }

    // Extension point: prerequisite tracking is not modeled yet.
    fn check_prerequisites(&self, _request: &Value, _plan: &Plan) -> CheckResult {
        CheckResult::pass("Prerequisites met")
    }
}

struct PhaseAlignment {
    status: String,
    suggestions: Vec<String>,
}

/// Violations of active strict constraints, by keyword containment between
/// the constraint description's significant tokens and the request text.
/// Restrictions fail when any token matches; requirements fail when none
/// does. Matching is substring-naive on the serialized request by design.
fn check_constraints(request_text: &str, constraints: &[Constraint]) -> Vec<String> {
    let mut violations = Vec::new();

    for constraint in constraints.iter().filter(|c| c.is_enforced()) {
        let tokens = significant_tokens(&constraint.description);
        match constraint.constraint_type {
            ConstraintType::Restriction => {
                if tokens.iter().any(|t| request_text.contains(t.as_str())) {
                    violations.push(format!(
                        "Constraint violation: {} - Request contains restricted elements: {}",
                        constraint.title, constraint.title
                    ));
                }
            }
            ConstraintType::Requirement => {
                if !tokens.is_empty() && !tokens.iter().any(|t| request_text.contains(t.as_str())) {
                    violations.push(format!(
                        "Constraint violation: {} - Request missing required elements: {}",
                        constraint.title, constraint.title
                    ));
                }
            }
            ConstraintType::Preference => {}
        }
    }

    violations
}

fn check_phase_alignment(request_text: &str, plan: &Plan) -> PhaseAlignment {
    let Some(phase) = plan.current_phase() else {
        return PhaseAlignment {
            status: "complete".to_string(),
            suggestions: vec!["Project phases are complete".to_string()],
        };
    };

    let score =
        containment_percentage(&phase.keywords, request_text).unwrap_or(NEUTRAL_ALIGNMENT);

    let (status, suggestion) = if score >= ALIGNED_THRESHOLD {
        (
            "aligned",
            format!("Good alignment with current phase: {}", phase.name),
        )
    } else if score >= PARTIAL_THRESHOLD {
        (
            "partially_aligned",
            format!(
                "Partial alignment with {} - consider focusing on phase objectives",
                phase.name
            ),
        )
    } else {
        (
            "misaligned",
            format!(
                "Low alignment with current phase {} - consider if this fits the plan",
                phase.name
            ),
        )
    };

    PhaseAlignment {
        status: status.to_string(),
        suggestions: vec![suggestion],
    }
}

fn check_priority_alignment(request_text: &str, plan: &Plan) -> (Vec<String>, Vec<String>) {
    let active = &plan.progress.active_tasks;
    if active.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let relevant = active.iter().any(|task| shares_word(task, request_text));
    if relevant {
        return (Vec::new(), Vec::new());
    }

    (
        vec!["Request doesn't seem to relate to current active tasks".to_string()],
        vec![format!(
            "Consider focusing on active tasks: {}",
            active.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        )],
    )
}

/// Share of the current phase's declared task list already completed.
/// A phase declaring no tasks counts as fully complete.
fn phase_completion_percentage(plan: &Plan, phase_index: usize) -> f64 {
    let Some(phase) = plan.strategy.phases.get(phase_index) else {
        return 100.0;
    };
    if phase.tasks.is_empty() {
        return 100.0;
    }
    let completed = phase
        .tasks
        .iter()
        .filter(|task| plan.progress.completed_tasks.contains(task))
        .count();
    completed as f64 / phase.tasks.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::{ConstraintScope, ConstraintStatus, EnforcementLevel, PlanPhase};
    use serde_json::json;
    use tempfile::TempDir;

    fn tracker(dir: &TempDir) -> PlanTracker {
        PlanTracker::with_dir(dir.path().to_path_buf())
    }

    fn design_build_plan() -> Plan {
        Plan::new(
            "plan-1",
            vec![
                PlanPhase {
                    name: "Design".into(),
                    keywords: vec!["schema".into(), "api".into()],
                    tasks: vec!["draft schema".into()],
                },
                PlanPhase {
                    name: "Build".into(),
                    keywords: vec!["implement".into(), "code".into()],
                    tasks: vec![],
                },
            ],
        )
    }

    fn restriction(description: &str) -> Constraint {
        Constraint {
            id: "c1".into(),
            title: "No gambling".into(),
            description: description.into(),
            constraint_type: ConstraintType::Restriction,
            priority: 1,
            scope: ConstraintScope::Global,
            enforcement_level: EnforcementLevel::Strict,
            status: ConstraintStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_validate_without_plan_is_permissive() {
        let dir = TempDir::new().unwrap();
        let report = tracker(&dir).validate(&json!({"action": "anything"})).await.unwrap();

        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.plan_adherence, "unknown");
    }

    #[tokio::test]
    async fn test_restriction_constraint_flags_match() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        tracker.save_plan(&design_build_plan()).await.unwrap();

        let mut set = ConstraintSet::empty("plan-1");
        set.constraints.push(restriction("gambling content is banned"));
        tracker.save_constraints(&set).await.unwrap();

        let report = tracker
            .validate(&json!({"request": "add a gambling feature"}))
            .await
            .unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);

        let clean = tracker
            .validate(&json!({"request": "design the api schema"}))
            .await
            .unwrap();
        assert!(clean.valid);
    }

    #[tokio::test]
    async fn test_requirement_constraint_flags_missing_tokens() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        tracker.save_plan(&design_build_plan()).await.unwrap();

        let mut set = ConstraintSet::empty("plan-1");
        set.constraints.push(Constraint {
            constraint_type: ConstraintType::Requirement,
            title: "Disclaimer required".into(),
            description: "must include disclaimer".into(),
            ..restriction("")
        });
        tracker.save_constraints(&set).await.unwrap();

        let missing = tracker
            .validate(&json!({"request": "ship it now"}))
            .await
            .unwrap();
        assert!(!missing.valid);

        let present = tracker
            .validate(&json!({"request": "include the disclaimer text"}))
            .await
            .unwrap();
        assert!(present.valid);
    }

    #[tokio::test]
    async fn test_phase_alignment_bands() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        tracker.save_plan(&design_build_plan()).await.unwrap();

        let aligned = tracker
            .validate(&json!({"request": "design the api schema"}))
            .await
            .unwrap();
        assert_eq!(aligned.plan_adherence, "aligned");

        let misaligned = tracker
            .validate(&json!({"request": "write some rust"}))
            .await
            .unwrap();
        assert_eq!(misaligned.plan_adherence, "misaligned");
    }

    #[tokio::test]
    async fn test_update_progress_moves_and_recomputes() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let mut plan = design_build_plan();
        plan.progress.active_tasks = vec!["draft schema".into()];
        plan.progress.pending_tasks = vec!["review api".into()];
        tracker.save_plan(&plan).await.unwrap();

        let update = tracker
            .update_progress(&json!({"activity": "finished the schema draft"}))
            .await
            .unwrap();

        assert!(update.success);
        assert_eq!(update.completed_items, vec!["draft schema"]);
        assert_eq!(update.progress_percentage, Some(50.0));

        // Completed tasks never move back.
        let reloaded = tracker.current_plan().await.unwrap().unwrap();
        assert_eq!(reloaded.progress.completed_tasks, vec!["draft schema"]);
        assert!(reloaded.progress.active_tasks.is_empty());
    }

    #[tokio::test]
    async fn test_update_progress_no_match_is_success() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let mut plan = design_build_plan();
        plan.progress.pending_tasks = vec!["draft schema".into()];
        tracker.save_plan(&plan).await.unwrap();

        let update = tracker
            .update_progress(&json!({"activity": "unrelated chores"}))
            .await
            .unwrap();
        assert!(update.success);
        assert!(update.completed_items.is_empty());
    }

    #[tokio::test]
    async fn test_suggest_actions_prefers_active_tasks() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let mut plan = design_build_plan();
        plan.progress.active_tasks = vec!["draft schema".into()];
        tracker.save_plan(&plan).await.unwrap();

        let actions = tracker.suggest_next_actions(&json!({})).await.unwrap();
        assert!(actions.suggestions[0].contains("Continue working"));
        assert_eq!(actions.phase_name.as_deref(), Some("Design"));
    }

    #[tokio::test]
    async fn test_suggest_actions_flags_phase_advance() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let mut plan = design_build_plan();
        plan.progress.completed_tasks = vec!["draft schema".into()];
        tracker.save_plan(&plan).await.unwrap();

        let actions = tracker.suggest_next_actions(&json!({})).await.unwrap();
        assert!(actions
            .suggestions
            .iter()
            .any(|s| s.contains("Ready to advance to next phase: Build")));
    }

    #[tokio::test]
    async fn test_enforce_sequence_passes_through() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        tracker.save_plan(&design_build_plan()).await.unwrap();

        let enforcement = tracker
            .enforce_sequence(&json!({"request": "anything"}))
            .await
            .unwrap();
        assert!(enforcement.allowed);
        assert!(enforcement.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_current_plan_falls_back_to_most_recent_active() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        // Write plans directly, bypassing the pointer.
        let store = RecordStore::new(dir.path().to_path_buf());
        let mut older = design_build_plan();
        older.id = "plan-old".into();
        older.updated_at = Utc::now() - chrono::Duration::hours(2);
        store.put("plans", "plan-old", &older).await.unwrap();

        let mut newer = design_build_plan();
        newer.id = "plan-new".into();
        store.put("plans", "plan-new", &newer).await.unwrap();

        let current = tracker.current_plan().await.unwrap().unwrap();
        assert_eq!(current.id, "plan-new");
    }
}
