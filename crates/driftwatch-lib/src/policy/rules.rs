//! User-configurable policy rules
//!
//! Rules are parsed into typed form at config load, so a misspelled
//! metric reference or operator is rejected up front instead of being
//! silently ignored on every evaluation. A `meta.<key>` reference that
//! does not resolve against a particular score is still a silent skip
//! at evaluation time, because that depends on the data, not the
//! configuration.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::models::{ActionRecommendation, ActionType, DetailValue, HealthScore};

/// What a rule measures: the score itself, the status string, or a
/// named supporting value from the score details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricRef {
    Score,
    Status,
    Meta(String),
}

#[derive(Debug, Error)]
#[error("unknown metric reference `{0}`; expected `score`, `status`, or `meta.<key>`")]
pub struct MetricRefParseError(String);

impl FromStr for MetricRef {
    type Err = MetricRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score" => Ok(MetricRef::Score),
            "status" => Ok(MetricRef::Status),
            other => match other.strip_prefix("meta.") {
                Some(key) if !key.is_empty() => Ok(MetricRef::Meta(key.to_string())),
                _ => Err(MetricRefParseError(other.to_string())),
            },
        }
    }
}

impl std::fmt::Display for MetricRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricRef::Score => write!(f, "score"),
            MetricRef::Status => write!(f, "status"),
            MetricRef::Meta(key) => write!(f, "meta.{key}"),
        }
    }
}

impl Serialize for MetricRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MetricRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Comparison operator applied between the resolved metric value and
/// the rule threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOp {
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not_contains")]
    NotContains,
}

/// Rule threshold; numeric and string forms are both accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Number(f64),
    Text(String),
}

/// One user-defined policy rule, validated when configuration loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub metric: MetricRef,
    pub operator: RuleOp,
    pub threshold: Threshold,
    /// Action name; unrecognised or absent falls back to RATE_LIMIT
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl PolicyRule {
    pub fn action_type(&self) -> ActionType {
        self.action
            .as_deref()
            .map(ActionType::parse_lenient)
            .unwrap_or(ActionType::RateLimit)
    }

    fn rationale(&self) -> String {
        if self.message.is_empty() {
            format!("Policy rule {} {:?} matched.", self.metric, self.threshold)
        } else {
            self.message.clone()
        }
    }
}

/// Evaluate one rule against one score, emitting the configured action
/// when the comparison holds. A metric that cannot be resolved for
/// this score skips the rule.
pub fn evaluate(rule: &PolicyRule, score: &HealthScore) -> Option<ActionRecommendation> {
    let value = match &rule.metric {
        MetricRef::Score => DetailValue::Number(score.score),
        MetricRef::Status => DetailValue::Text(score.status.to_string()),
        MetricRef::Meta(key) => match score.details.detail(key) {
            Some(value) => value,
            None => {
                debug!(metric = %rule.metric, entity_id = %score.entity_id, "Rule metric unresolved, skipping");
                return None;
            }
        },
    };

    if !compare(&value, rule.operator, &rule.threshold) {
        return None;
    }

    Some(ActionRecommendation {
        action: rule.action_type(),
        entity_type: score.entity_type.clone(),
        entity_id: score.entity_id.clone(),
        rationale: rule.rationale(),
        parameters: rule.parameters.clone(),
    })
}

fn value_number(value: &DetailValue) -> Option<f64> {
    match value {
        DetailValue::Number(n) => Some(*n),
        DetailValue::Text(s) => s.parse().ok(),
    }
}

fn value_text(value: &DetailValue) -> String {
    match value {
        DetailValue::Number(n) => n.to_string(),
        DetailValue::Text(s) => s.clone(),
    }
}

fn threshold_number(threshold: &Threshold) -> Option<f64> {
    match threshold {
        Threshold::Number(n) => Some(*n),
        Threshold::Text(s) => s.parse().ok(),
    }
}

fn threshold_text(threshold: &Threshold) -> String {
    match threshold {
        Threshold::Number(n) => n.to_string(),
        Threshold::Text(s) => s.clone(),
    }
}

fn compare(value: &DetailValue, op: RuleOp, threshold: &Threshold) -> bool {
    match op {
        RuleOp::Le | RuleOp::Lt | RuleOp::Ge | RuleOp::Gt => {
            match (value_number(value), threshold_number(threshold)) {
                (Some(v), Some(t)) => match op {
                    RuleOp::Le => v <= t,
                    RuleOp::Lt => v < t,
                    RuleOp::Ge => v >= t,
                    RuleOp::Gt => v > t,
                    _ => unreachable!(),
                },
                // ordering comparisons need two numbers
                _ => false,
            }
        }
        RuleOp::Eq | RuleOp::Ne => {
            let equal = match (value_number(value), threshold_number(threshold)) {
                (Some(v), Some(t)) => v == t,
                _ => value_text(value) == threshold_text(threshold),
            };
            (op == RuleOp::Eq) == equal
        }
        RuleOp::Contains | RuleOp::NotContains => {
            let contains = value_text(value).contains(&threshold_text(threshold));
            (op == RuleOp::Contains) == contains
        }
    }
}
