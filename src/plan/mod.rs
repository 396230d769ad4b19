//! Plan state, constraints, and adherence tracking.

mod tracker;
mod types;

pub use tracker::{
    ActionSuggestions, CheckResult, PlanTracker, ProgressUpdate, SequenceEnforcement,
    ValidationReport,
};
pub use types::{
    Constraint, ConstraintScope, ConstraintSet, ConstraintStatus, ConstraintType, CurrentPlanPointer,
    EnforcementLevel, Plan, PlanPhase, PlanProgress, PlanStatus, PlanStrategy,
};
