//! The learning pipeline: observe interactions, accumulate patterns, raise
//! insights, derive adaptation rules, and score their effectiveness.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::features::{identify_candidates, pattern_id, FeatureSnapshot, PatternCandidate};
use super::history::{LearningEvent, LearningHistory};
use super::types::{
    generate_insight_id, generate_rule_id, AdaptationRule, InsightType, LearningInsight,
    LearningPattern, PatternType,
};
use crate::config::{CoordConfig, CoordPaths, LearningConfig};
use crate::error::{CoordError, Result};
use crate::store::RecordStore;

const PATTERNS: &str = "patterns";
const RULES: &str = "rules";
const INSIGHTS: &str = "insights";
const EVENTS_FILE: &str = "learning_events.jsonl";

/// Thresholds shared by recommendations: patterns need a strong track
/// record, rules a positive effectiveness history.
const RECOMMENDATION_SUCCESS_RATE: f64 = 0.8;
const RECOMMENDATION_CONFIDENCE: f64 = 0.7;
const RECOMMENDATION_EFFECTIVENESS: f64 = 0.6;
const MAX_RECOMMENDATIONS: usize = 10;
const REPORT_TOP_N: usize = 10;
/// Events needed before the improvement split is meaningful.
const MIN_TREND_EVENTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnSummary {
    pub patterns_identified: usize,
    pub insights_generated: usize,
    pub rules_created: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub recommendation: String,
    pub confidence: f64,
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    pub recommendations: Vec<Recommendation>,
    pub patterns_considered: usize,
    pub rules_considered: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEffectiveness {
    pub effectiveness: f64,
    pub patterns_evaluated: usize,
    pub high_confidence_patterns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEffectiveness {
    pub effectiveness: f64,
    pub rules_evaluated: usize,
    pub successful_applications: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementIndicators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insufficient_data: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_identification_trend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight_generation_trend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_acceleration: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub time_range: String,
    pub agent: String,
    pub learning_events: usize,
    pub patterns_identified: usize,
    pub insights_generated: usize,
    pub rules_created: usize,
    pub learning_velocity: f64,
    pub pattern_effectiveness: PatternEffectiveness,
    pub rule_effectiveness: RuleEffectiveness,
    pub improvement_indicators: ImprovementIndicators,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedAdaptation {
    pub rule_id: String,
    pub action_type: String,
    pub description: String,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationOutcome {
    pub adaptations_applied: usize,
    pub adaptation_details: Vec<AppliedAdaptation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatistics {
    pub total_patterns: usize,
    pub total_rules: usize,
    pub total_insights: usize,
    pub learning_events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDigest {
    pub id: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub agent: String,
    pub success_rate: f64,
    pub confidence: f64,
    pub frequency: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDigest {
    pub id: String,
    pub effectiveness: f64,
    pub success_count: u32,
    pub failure_count: u32,
    pub agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightDigest {
    pub id: String,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub description: String,
    pub confidence: f64,
    pub actionable: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStats {
    pub patterns: usize,
    pub success_rate: f64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningReport {
    pub system_statistics: SystemStatistics,
    pub top_patterns: Vec<PatternDigest>,
    pub top_rules: Vec<RuleDigest>,
    pub recent_insights: Vec<InsightDigest>,
    pub agent_learning_stats: BTreeMap<String, AgentStats>,
}

pub struct LearningEngine {
    store: RecordStore,
    config: LearningConfig,
    history: LearningHistory,
    patterns_cache: HashMap<String, LearningPattern>,
    patterns_loaded: bool,
    rules_cache: HashMap<String, AdaptationRule>,
    rules_loaded: bool,
}

impl LearningEngine {
    pub fn new(paths: &CoordPaths, config: &CoordConfig) -> Self {
        Self::with_dir(paths.learning_dir(), config.learning.clone())
    }

    pub fn with_dir(dir: PathBuf, config: LearningConfig) -> Self {
        let history = LearningHistory::new(dir.join(EVENTS_FILE), config.history_capacity);
        Self {
            store: RecordStore::new(dir),
            config,
            history,
            patterns_cache: HashMap::new(),
            patterns_loaded: false,
            rules_cache: HashMap::new(),
            rules_loaded: false,
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.store.init().await
    }

    /// Full learning pass over one interaction: extract features, merge
    /// pattern candidates, raise insights, derive rules, record the event.
    pub async fn learn(&mut self, interaction: &Value) -> Result<LearnSummary> {
        let features = FeatureSnapshot::extract(interaction);
        let candidates = identify_candidates(&features);

        let mut updated = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            updated.push(self.update_or_create_pattern(candidate).await?);
        }

        let insights = self.generate_insights(&updated).await?;
        let rules = self.create_rules(&insights).await?;

        let event = LearningEvent {
            timestamp: Utc::now(),
            interaction_id: interaction
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            agent: features.agent.clone(),
            patterns_found: updated.len(),
            insights_generated: insights.len(),
            rules_created: rules.len(),
        };
        self.history.append(event).await?;

        debug!(
            agent = %features.agent,
            patterns = updated.len(),
            insights = insights.len(),
            rules = rules.len(),
            "Learning pass complete"
        );

        Ok(LearnSummary {
            patterns_identified: updated.len(),
            insights_generated: insights.len(),
            rules_created: rules.len(),
        })
    }

    /// Ranked recommendations from proven patterns and effective rules,
    /// capped at ten. An absent agent or task_type filter matches anything.
    pub async fn get_recommendations(&mut self, context: &Value) -> Result<Recommendations> {
        let agent = context
            .get("agent")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let task_type = context
            .get("task_type")
            .and_then(Value::as_str)
            .unwrap_or_default();

        self.load_patterns().await?;
        self.load_rules().await?;

        let relevant_patterns: Vec<&LearningPattern> = self
            .patterns_cache
            .values()
            .filter(|p| agent.is_empty() || p.agent_name == agent)
            .filter(|p| {
                task_type.is_empty()
                    || p.context.get("task_type").and_then(Value::as_str) == Some(task_type)
            })
            .collect();

        let applicable_rules: Vec<&AdaptationRule> = self
            .rules_cache
            .values()
            .filter(|r| r.in_scope(agent))
            .collect();

        let mut recommendations = Vec::new();

        for pattern in &relevant_patterns {
            if pattern.success_rate > RECOMMENDATION_SUCCESS_RATE
                && pattern.confidence_score > RECOMMENDATION_CONFIDENCE
            {
                let type_tag = serde_json::to_value(pattern.pattern_type)?
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                recommendations.push(Recommendation {
                    kind: "pattern_based".to_string(),
                    recommendation: format!("Apply successful pattern: {}", type_tag),
                    confidence: pattern.confidence_score,
                    evidence: format!(
                        "Seen {} times with {:.1}% success rate",
                        pattern.frequency,
                        pattern.success_rate * 100.0
                    ),
                    pattern_id: Some(pattern.pattern_id.clone()),
                    rule_id: None,
                });
            }
        }

        for rule in &applicable_rules {
            if rule.effectiveness_score > RECOMMENDATION_EFFECTIVENESS {
                recommendations.push(Recommendation {
                    kind: "rule_based".to_string(),
                    recommendation: format!(
                        "Apply adaptation rule: {}",
                        rule.action_description().unwrap_or("Apply rule")
                    ),
                    confidence: rule.effectiveness_score,
                    evidence: format!(
                        "Rule succeeded {} times, failed {} times",
                        rule.success_count, rule.failure_count
                    ),
                    pattern_id: None,
                    rule_id: Some(rule.rule_id.clone()),
                });
            }
        }

        recommendations.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recommendations.truncate(MAX_RECOMMENDATIONS);

        Ok(Recommendations {
            recommendations,
            patterns_considered: relevant_patterns.len(),
            rules_considered: applicable_rules.len(),
        })
    }

    /// Aggregate statistics and trend labels over the bounded event
    /// history, windowed to 1h/24h/7d. No events in range is a structured
    /// not-found, never a crash.
    pub async fn analyze_trends(
        &mut self,
        agent: Option<&str>,
        time_range: &str,
    ) -> Result<TrendAnalysis> {
        let hours: i64 = match time_range {
            "1h" => 1,
            "24h" => 24,
            _ => 24 * 7,
        };
        let end = Utc::now();
        let start = end - Duration::hours(hours);

        let filtered: Vec<LearningEvent> = self
            .history
            .events()
            .await?
            .iter()
            .filter(|e| e.timestamp >= start)
            .filter(|e| agent.is_none_or(|a| e.agent == a))
            .cloned()
            .collect();

        if filtered.is_empty() {
            return Err(CoordError::NotFound(
                "No learning events found for the specified criteria".into(),
            ));
        }

        let patterns_identified: usize = filtered.iter().map(|e| e.patterns_found).sum();
        let insights_generated: usize = filtered.iter().map(|e| e.insights_generated).sum();
        let rules_created: usize = filtered.iter().map(|e| e.rules_created).sum();
        let learning_velocity = filtered.len() as f64 / hours as f64;

        self.load_patterns().await?;
        self.load_rules().await?;

        Ok(TrendAnalysis {
            time_range: format!("{} to {}", start.to_rfc3339(), end.to_rfc3339()),
            agent: agent.unwrap_or("all_agents").to_string(),
            learning_events: filtered.len(),
            patterns_identified,
            insights_generated,
            rules_created,
            learning_velocity,
            pattern_effectiveness: self.pattern_effectiveness(agent),
            rule_effectiveness: self.rule_effectiveness(agent),
            improvement_indicators: improvement_indicators(&filtered),
        })
    }

    /// Apply every sufficiently effective rule in scope for the agent,
    /// folding the reported outcome back into each rule's counters.
    pub async fn adapt_behavior(
        &mut self,
        agent: &str,
        adaptation_context: &Value,
    ) -> Result<AdaptationOutcome> {
        self.load_rules().await?;

        let eligible: Vec<String> = self
            .rules_cache
            .values()
            .filter(|r| r.in_scope(agent))
            .filter(|r| r.effectiveness_score > self.config.min_confidence_threshold)
            .map(|r| r.rule_id.clone())
            .collect();

        let outcome_success = adaptation_context
            .get("outcome")
            .and_then(|o| o.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let mut details = Vec::new();
        for rule_id in eligible {
            let rule = match self.rules_cache.get_mut(&rule_id) {
                Some(rule) => rule,
                None => continue,
            };
            rule.record_outcome(outcome_success);
            let snapshot = rule.clone();
            self.store.put(RULES, &snapshot.rule_id, &snapshot).await?;

            details.push(AppliedAdaptation {
                rule_id: snapshot.rule_id.clone(),
                action_type: snapshot.action_type().unwrap_or_default().to_string(),
                description: snapshot.action_description().unwrap_or_default().to_string(),
                timestamp: Utc::now(),
            });
        }

        Ok(AdaptationOutcome {
            adaptations_applied: details.len(),
            adaptation_details: details,
        })
    }

    /// Snapshot of the learning system: strongest patterns and rules,
    /// newest insights, per-agent aggregates.
    pub async fn generate_report(&mut self) -> Result<LearningReport> {
        self.load_patterns().await?;
        self.load_rules().await?;
        let mut insights: Vec<LearningInsight> = self.store.list(INSIGHTS).await?;
        let learning_events = self.history.events().await?.len();

        let mut patterns: Vec<&LearningPattern> = self.patterns_cache.values().collect();
        patterns.sort_by(|a, b| {
            b.ranking_score()
                .partial_cmp(&a.ranking_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut rules: Vec<&AdaptationRule> = self.rules_cache.values().collect();
        rules.sort_by(|a, b| {
            b.effectiveness_score
                .partial_cmp(&a.effectiveness_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        insights.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut agent_stats: BTreeMap<String, AgentStats> = BTreeMap::new();
        for pattern in self.patterns_cache.values() {
            let stats = agent_stats.entry(pattern.agent_name.clone()).or_default();
            let n = stats.patterns as f64;
            stats.success_rate = (stats.success_rate * n + pattern.success_rate) / (n + 1.0);
            stats.avg_confidence =
                (stats.avg_confidence * n + pattern.confidence_score) / (n + 1.0);
            stats.patterns += 1;
        }

        Ok(LearningReport {
            system_statistics: SystemStatistics {
                total_patterns: self.patterns_cache.len(),
                total_rules: self.rules_cache.len(),
                total_insights: insights.len(),
                learning_events,
            },
            top_patterns: patterns
                .iter()
                .take(REPORT_TOP_N)
                .map(|p| PatternDigest {
                    id: p.pattern_id.clone(),
                    pattern_type: p.pattern_type,
                    agent: p.agent_name.clone(),
                    success_rate: p.success_rate,
                    confidence: p.confidence_score,
                    frequency: p.frequency,
                })
                .collect(),
            top_rules: rules
                .iter()
                .take(REPORT_TOP_N)
                .map(|r| RuleDigest {
                    id: r.rule_id.clone(),
                    effectiveness: r.effectiveness_score,
                    success_count: r.success_count,
                    failure_count: r.failure_count,
                    agents: r.agent_scope.clone(),
                })
                .collect(),
            recent_insights: insights
                .iter()
                .take(REPORT_TOP_N)
                .map(|i| InsightDigest {
                    id: i.insight_id.clone(),
                    insight_type: i.insight_type,
                    description: i.description.clone(),
                    confidence: i.confidence_level,
                    actionable: i.actionable,
                })
                .collect(),
            agent_learning_stats: agent_stats,
        })
    }

    /// Trim the on-disk event history to the ring capacity.
    pub async fn compact_history(&mut self) -> Result<usize> {
        self.history.compact().await
    }

    async fn update_or_create_pattern(
        &mut self,
        candidate: PatternCandidate,
    ) -> Result<LearningPattern> {
        let id = pattern_id(candidate.pattern_type, &candidate.agent_name, &candidate.context);
        self.load_patterns().await?;

        let pattern = match self.patterns_cache.get_mut(&id) {
            Some(existing) => {
                existing.observe(candidate.success_indicator);
                existing.clone()
            }
            None => {
                let now = Utc::now();
                let pattern = LearningPattern {
                    schema_version: 1,
                    pattern_id: id.clone(),
                    pattern_type: candidate.pattern_type,
                    agent_name: candidate.agent_name,
                    context: candidate.context,
                    outcome: candidate.outcome,
                    frequency: 1,
                    success_rate: if candidate.success_indicator { 1.0 } else { 0.0 },
                    confidence_score: 0.5,
                    created_at: now,
                    last_seen: now,
                };
                self.patterns_cache.insert(id.clone(), pattern.clone());
                pattern
            }
        };

        self.store.put(PATTERNS, &id, &pattern).await?;
        Ok(pattern)
    }

    async fn generate_insights(
        &mut self,
        patterns: &[LearningPattern],
    ) -> Result<Vec<LearningInsight>> {
        let mut insights = Vec::new();
        let now = Utc::now();

        for pattern in patterns.iter().filter(|p| {
            p.pattern_type == PatternType::FailurePattern
                && p.frequency >= self.config.min_pattern_frequency
        }) {
            let task_type = pattern
                .context
                .get("task_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            insights.push(LearningInsight {
                schema_version: 1,
                insight_id: generate_insight_id(),
                insight_type: InsightType::FailureAnalysis,
                description: format!(
                    "Agent {} frequently fails on {} tasks",
                    pattern.agent_name, task_type
                ),
                evidence: vec![json!({
                    "pattern_id": pattern.pattern_id,
                    "frequency": pattern.frequency,
                })],
                confidence_level: pattern.confidence_score,
                actionable: true,
                impact_estimate: "medium".to_string(),
                agents_affected: vec![pattern.agent_name.clone()],
                created_at: now,
            });
        }

        let slow: Vec<&LearningPattern> = patterns
            .iter()
            .filter(|p| {
                p.pattern_type == PatternType::PerformancePattern
                    && p.outcome.get("performance_category").and_then(Value::as_str)
                        == Some("slow")
            })
            .collect();
        if !slow.is_empty() {
            let mean_confidence =
                slow.iter().map(|p| p.confidence_score).sum::<f64>() / slow.len() as f64;
            let mut agents: Vec<String> = slow.iter().map(|p| p.agent_name.clone()).collect();
            agents.sort();
            agents.dedup();

            insights.push(LearningInsight {
                schema_version: 1,
                insight_id: generate_insight_id(),
                insight_type: InsightType::PerformanceOptimization,
                description: "Performance optimization opportunity identified".to_string(),
                evidence: slow
                    .iter()
                    .map(|p| json!({"pattern_id": p.pattern_id}))
                    .collect(),
                confidence_level: mean_confidence,
                actionable: true,
                impact_estimate: "high".to_string(),
                agents_affected: agents,
                created_at: now,
            });
        }

        for insight in &insights {
            self.store.put(INSIGHTS, &insight.insight_id, insight).await?;
        }

        Ok(insights)
    }

    async fn create_rules(&mut self, insights: &[LearningInsight]) -> Result<Vec<AdaptationRule>> {
        self.load_rules().await?;
        let mut rules = Vec::new();
        let now = Utc::now();

        for insight in insights.iter().filter(|i| i.actionable) {
            let (condition_key, action_type, description, priority) = match insight.insight_type {
                InsightType::FailureAnalysis => (
                    "failure_pattern_detected",
                    "fallback_strategy",
                    "Apply alternative approach when failure pattern detected",
                    3,
                ),
                InsightType::PerformanceOptimization => (
                    "performance_issue_detected",
                    "optimization_strategy",
                    "Apply performance optimization when slow patterns detected",
                    2,
                ),
            };

            let mut condition = Map::new();
            condition.insert("agents".into(), json!(insight.agents_affected));
            condition.insert(condition_key.into(), json!(true));

            let mut action = Map::new();
            action.insert("type".into(), json!(action_type));
            action.insert("description".into(), json!(description));

            let rule = AdaptationRule {
                schema_version: 1,
                rule_id: generate_rule_id(),
                condition,
                action,
                agent_scope: insight.agents_affected.clone(),
                priority,
                success_count: 0,
                failure_count: 0,
                effectiveness_score: insight.confidence_level,
                created_at: now,
            };

            self.store.put(RULES, &rule.rule_id, &rule).await?;
            self.rules_cache.insert(rule.rule_id.clone(), rule.clone());
            rules.push(rule);
        }

        Ok(rules)
    }

    fn pattern_effectiveness(&self, agent: Option<&str>) -> PatternEffectiveness {
        let patterns: Vec<&LearningPattern> = self
            .patterns_cache
            .values()
            .filter(|p| agent.is_none_or(|a| p.agent_name == a))
            .collect();

        if patterns.is_empty() {
            return PatternEffectiveness {
                effectiveness: 0.0,
                patterns_evaluated: 0,
                high_confidence_patterns: 0,
            };
        }

        PatternEffectiveness {
            effectiveness: patterns.iter().map(|p| p.ranking_score()).sum::<f64>()
                / patterns.len() as f64,
            patterns_evaluated: patterns.len(),
            high_confidence_patterns: patterns
                .iter()
                .filter(|p| p.confidence_score > 0.8)
                .count(),
        }
    }

    fn rule_effectiveness(&self, agent: Option<&str>) -> RuleEffectiveness {
        let rules: Vec<&AdaptationRule> = self
            .rules_cache
            .values()
            .filter(|r| agent.is_none_or(|a| r.agent_scope.iter().any(|s| s == a)))
            .collect();

        if rules.is_empty() {
            return RuleEffectiveness {
                effectiveness: 0.0,
                rules_evaluated: 0,
                successful_applications: 0,
            };
        }

        RuleEffectiveness {
            effectiveness: rules.iter().map(|r| r.effectiveness_score).sum::<f64>()
                / rules.len() as f64,
            rules_evaluated: rules.len(),
            successful_applications: rules.iter().map(|r| r.success_count).sum(),
        }
    }

    async fn load_patterns(&mut self) -> Result<()> {
        if self.patterns_loaded {
            return Ok(());
        }
        for pattern in self.store.list::<LearningPattern>(PATTERNS).await? {
            self.patterns_cache.insert(pattern.pattern_id.clone(), pattern);
        }
        self.patterns_loaded = true;
        Ok(())
    }

    async fn load_rules(&mut self) -> Result<()> {
        if self.rules_loaded {
            return Ok(());
        }
        for rule in self.store.list::<AdaptationRule>(RULES).await? {
            self.rules_cache.insert(rule.rule_id.clone(), rule);
        }
        self.rules_loaded = true;
        Ok(())
    }
}

/// Compare the first and second halves of the filtered events; a higher
/// recent mean reads as "improving".
fn improvement_indicators(events: &[LearningEvent]) -> ImprovementIndicators {
    if events.len() < MIN_TREND_EVENTS {
        return ImprovementIndicators {
            insufficient_data: Some(true),
            pattern_identification_trend: None,
            insight_generation_trend: None,
            learning_acceleration: None,
        };
    }

    let mid = events.len() / 2;
    let (early, recent) = events.split_at(mid);

    let mean = |slice: &[LearningEvent], f: fn(&LearningEvent) -> usize| {
        slice.iter().map(f).sum::<usize>() as f64 / slice.len() as f64
    };

    let early_patterns = mean(early, |e| e.patterns_found);
    let recent_patterns = mean(recent, |e| e.patterns_found);
    let early_insights = mean(early, |e| e.insights_generated);
    let recent_insights = mean(recent, |e| e.insights_generated);

    let label = |recent: f64, early: f64| {
        if recent > early { "improving" } else { "stable" }.to_string()
    };

    ImprovementIndicators {
        insufficient_data: None,
        pattern_identification_trend: Some(label(recent_patterns, early_patterns)),
        insight_generation_trend: Some(label(recent_insights, early_insights)),
        learning_acceleration: Some(
            recent_patterns + recent_insights > early_patterns + early_insights,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> LearningEngine {
        LearningEngine::with_dir(dir.path().to_path_buf(), LearningConfig::default())
    }

    fn interaction(agent: &str, success: bool, response_time: f64) -> Value {
        json!({
            "agent": agent,
            "task_type": "refactor",
            "input": "fixed payload",
            "context": {"repo": "demo"},
            "success": success,
            "response_time": response_time,
        })
    }

    #[tokio::test]
    async fn test_learn_identifies_patterns() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        let summary = engine
            .learn(&interaction("coder", true, 0.5))
            .await
            .unwrap();
        assert_eq!(summary.patterns_identified, 2);
        assert_eq!(summary.insights_generated, 0);
        assert_eq!(summary.rules_created, 0);
    }

    #[tokio::test]
    async fn test_repeat_observations_accumulate() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        // Same agent/context performance pattern: success, failure, success.
        engine.learn(&interaction("coder", true, 2.0)).await.unwrap();
        engine.learn(&interaction("coder", false, 2.0)).await.unwrap();
        engine.learn(&interaction("coder", true, 2.0)).await.unwrap();

        let perf = engine
            .patterns_cache
            .values()
            .find(|p| p.pattern_type == PatternType::PerformancePattern)
            .unwrap();
        assert_eq!(perf.frequency, 3);
        assert!((perf.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((perf.confidence_score - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failure_insight_after_three_occurrences() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        let failing = json!({
            "agent": "coder",
            "task_type": "refactor",
            "success": false,
            "error_type": "timeout",
        });

        let first = engine.learn(&failing).await.unwrap();
        assert_eq!(first.insights_generated, 0);
        engine.learn(&failing).await.unwrap();
        let third = engine.learn(&failing).await.unwrap();

        assert_eq!(third.insights_generated, 1);
        assert_eq!(third.rules_created, 1);

        let insights: Vec<LearningInsight> = engine.store.list(INSIGHTS).await.unwrap();
        assert!(!insights.is_empty());
        assert!(insights
            .iter()
            .any(|i| i.insight_type == InsightType::FailureAnalysis));
    }

    #[tokio::test]
    async fn test_slow_interaction_yields_performance_insight() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        let summary = engine
            .learn(&interaction("coder", true, 9.0))
            .await
            .unwrap();
        assert_eq!(summary.insights_generated, 1);
        assert_eq!(summary.rules_created, 1);

        let rules: Vec<AdaptationRule> = engine.store.list(RULES).await.unwrap();
        assert_eq!(rules[0].priority, 2);
        assert_eq!(rules[0].action_type(), Some("optimization_strategy"));
    }

    #[tokio::test]
    async fn test_trends_require_events() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        let result = engine.analyze_trends(None, "24h").await;
        assert!(matches!(result, Err(CoordError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_trends_aggregate_and_flag_insufficient_data() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        for _ in 0..3 {
            engine.learn(&interaction("coder", true, 0.5)).await.unwrap();
        }

        let analysis = engine.analyze_trends(Some("coder"), "1h").await.unwrap();
        assert_eq!(analysis.learning_events, 3);
        assert_eq!(analysis.patterns_identified, 6);
        assert_eq!(analysis.improvement_indicators.insufficient_data, Some(true));
        assert!(analysis.learning_velocity > 0.0);
    }

    #[tokio::test]
    async fn test_trends_improvement_split() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        for _ in 0..10 {
            engine.learn(&interaction("coder", true, 0.5)).await.unwrap();
        }

        let analysis = engine.analyze_trends(None, "24h").await.unwrap();
        assert_eq!(analysis.improvement_indicators.insufficient_data, None);
        assert_eq!(
            analysis.improvement_indicators.pattern_identification_trend.as_deref(),
            Some("stable")
        );
    }

    #[tokio::test]
    async fn test_adapt_behavior_applies_effective_rules() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        // Build up an effective rule via repeated slow interactions.
        for _ in 0..10 {
            engine.learn(&interaction("coder", true, 9.0)).await.unwrap();
        }

        let outcome = engine
            .adapt_behavior("coder", &json!({"outcome": {"success": true}}))
            .await
            .unwrap();
        assert!(outcome.adaptations_applied > 0);

        let rules: Vec<AdaptationRule> = engine.store.list(RULES).await.unwrap();
        assert!(rules.iter().any(|r| r.success_count > 0));
    }

    #[tokio::test]
    async fn test_recommendations_rank_and_cap() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        // Ten successes make the performance pattern proven.
        for _ in 0..10 {
            engine.learn(&interaction("coder", true, 2.0)).await.unwrap();
        }

        let recs = engine
            .get_recommendations(&json!({"agent": "coder", "task_type": "refactor"}))
            .await
            .unwrap();
        assert!(!recs.recommendations.is_empty());
        assert!(recs.recommendations.len() <= MAX_RECOMMENDATIONS);
        for pair in recs.recommendations.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[tokio::test]
    async fn test_report_shape() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);

        engine.learn(&interaction("coder", true, 9.0)).await.unwrap();
        engine.learn(&interaction("reviewer", false, 0.0)).await.unwrap();

        let report = engine.generate_report().await.unwrap();
        assert!(report.system_statistics.total_patterns >= 2);
        assert_eq!(report.system_statistics.learning_events, 2);
        assert!(report.agent_learning_stats.contains_key("coder"));
        assert!(report.agent_learning_stats.contains_key("reviewer"));
    }
}
