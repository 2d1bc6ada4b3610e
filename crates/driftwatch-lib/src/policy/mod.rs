//! Policy engine
//!
//! Turns health scores into prioritized remediation recommendations.
//! A fixed rule set covers the common failure modes, each toggleable
//! through a feature flag; user-defined rules layer custom thresholds
//! on top and run for every score, PASS included.

mod rules;

pub use rules::{evaluate, MetricRef, MetricRefParseError, PolicyRule, RuleOp, Threshold};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{ActionRecommendation, ActionType, HealthScore, HealthStatus};

pub const FLAG_ACTION_REROUTE: &str = "action_reroute";
pub const FLAG_ACTION_RATE_LIMIT: &str = "action_rate_limit";
pub const FLAG_ACTION_QOS: &str = "action_qos";
pub const FLAG_ACTION_THERMAL: &str = "action_thermal";
/// Consumed by the reporting layer, not the policy engine
pub const FLAG_EXPLAINABILITY: &str = "explainability";

/// Boolean feature toggles; anything not explicitly set is enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlags(BTreeMap<String, bool>);

impl FeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(true)
    }

    pub fn set(&mut self, name: impl Into<String>, value: bool) {
        self.0.insert(name.into(), value);
    }
}

impl From<BTreeMap<String, bool>> for FeatureFlags {
    fn from(map: BTreeMap<String, bool>) -> Self {
        Self(map)
    }
}

/// Produce remediation recommendations for a batch of scores.
///
/// Per score, fixed-rule actions are appended before policy-rule
/// actions; scores are processed in input order. FAIL can emit both a
/// reroute and a rate limit; the thermal constraint fires on any
/// temperature driver independent of status.
pub fn recommend_actions(
    scores: &[HealthScore],
    flags: &FeatureFlags,
    policy_rules: &[PolicyRule],
) -> Vec<ActionRecommendation> {
    let mut actions = Vec::new();
    for score in scores {
        match score.status {
            HealthStatus::Fail => {
                if flags.enabled(FLAG_ACTION_REROUTE) {
                    actions.push(fixed_action(
                        score,
                        ActionType::Reroute,
                        "Link health is FAIL; recommend reroute.",
                        [("priority".to_string(), json!("high"))].into(),
                    ));
                }
                if flags.enabled(FLAG_ACTION_RATE_LIMIT) {
                    actions.push(fixed_action(
                        score,
                        ActionType::RateLimit,
                        "Degraded link; reduce load to stabilize.",
                        [("limit_pct".to_string(), json!(60))].into(),
                    ));
                }
            }
            HealthStatus::Warn => {
                if flags.enabled(FLAG_ACTION_QOS) {
                    actions.push(fixed_action(
                        score,
                        ActionType::QosPrioritization,
                        "Moderate drift detected; prioritize critical traffic.",
                        [("class".to_string(), json!("gold"))].into(),
                    ));
                }
            }
            HealthStatus::Pass => {}
        }

        let temperature_driver = score.drivers.iter().any(|d| d.contains("temperature"));
        if temperature_driver && flags.enabled(FLAG_ACTION_THERMAL) {
            actions.push(fixed_action(
                score,
                ActionType::PowerThermalConstraint,
                "Temperature drift detected; apply thermal constraints.",
                [("max_temp_c".to_string(), json!(75))].into(),
            ));
        }

        for rule in policy_rules {
            if let Some(action) = rules::evaluate(rule, score) {
                actions.push(action);
            }
        }
    }
    actions
}

fn fixed_action(
    score: &HealthScore,
    action: ActionType,
    rationale: &str,
    parameters: BTreeMap<String, serde_json::Value>,
) -> ActionRecommendation {
    ActionRecommendation {
        action,
        entity_type: score.entity_type.clone(),
        entity_id: score.entity_id.clone(),
        rationale: rationale.to_string(),
        parameters,
    }
}
