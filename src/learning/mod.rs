//! Pattern recognition, insight generation, and behavioral adaptation from
//! agent interaction outcomes.

mod engine;
mod features;
mod history;
mod types;

pub use engine::{
    AdaptationOutcome, AppliedAdaptation, LearnSummary, LearningEngine, LearningReport,
    Recommendation, Recommendations, TrendAnalysis,
};
pub use features::{
    identify_candidates, pattern_id, ComplexityBucket, FeatureSnapshot, PatternCandidate,
    PerformanceCategory,
};
pub use history::{LearningEvent, LearningHistory};
pub use types::{AdaptationRule, InsightType, LearningInsight, LearningPattern, PatternType};
