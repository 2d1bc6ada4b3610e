//! Core data models for the drift pipeline

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current telemetry schema version; older records are migrated on ingest.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Health classification for a scored entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Pass,
    Warn,
    Fail,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Pass => write!(f, "PASS"),
            HealthStatus::Warn => write!(f, "WARN"),
            HealthStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Event severity for the reporting layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// Remediation action kinds emitted by the policy engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    QosPrioritization,
    RateLimit,
    Reroute,
    PowerThermalConstraint,
}

impl ActionType {
    /// Parse an action name from a policy rule, falling back to
    /// `RateLimit` for unrecognised names so one malformed rule cannot
    /// block the rest of the recommendations.
    pub fn parse_lenient(name: &str) -> Self {
        match name {
            "REROUTE" => ActionType::Reroute,
            "RATE_LIMIT" => ActionType::RateLimit,
            "QOS_PRIORITIZATION" => ActionType::QosPrioritization,
            "POWER_THERMAL_CONSTRAINT" => ActionType::PowerThermalConstraint,
            other => {
                tracing::warn!(action = %other, "Unknown policy action, falling back to RATE_LIMIT");
                ActionType::RateLimit
            }
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::QosPrioritization => write!(f, "QOS_PRIORITIZATION"),
            ActionType::RateLimit => write!(f, "RATE_LIMIT"),
            ActionType::Reroute => write!(f, "REROUTE"),
            ActionType::PowerThermalConstraint => write!(f, "POWER_THERMAL_CONSTRAINT"),
        }
    }
}

/// One normalized telemetry observation for a link (or charger-style
/// entity). Immutable once constructed; validation happens in the
/// normalizer, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub link_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub drops: u64,
    #[serde(default)]
    pub retries: u64,
    #[serde(default)]
    pub fec_corrected: u64,
    #[serde(default)]
    pub fec_uncorrected: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ber: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_power_dbm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_power_dbm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congestion_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_kw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_v: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_soc_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charger_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charger_fault_code: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, serde_json::Value>,
    #[serde(default = "default_schema_version")]
    pub schema_version: i64,
}

fn default_schema_version() -> i64 {
    CURRENT_SCHEMA_VERSION
}

/// Which window a [`WindowStats`] record describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsKind {
    #[default]
    Baseline,
    Run,
}

/// Per-entity average metrics over one aggregation window.
///
/// The baseline and run views share this shape; `kind` tags which role
/// a record plays. Metrics are arithmetic means keyed by metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub entity_type: String,
    pub entity_id: String,
    pub metrics: BTreeMap<String, f64>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    #[serde(default)]
    pub kind: StatsKind,
}

/// Supporting raw values carried on every [`HealthScore`] for policy
/// `meta.*` lookups and explainability reporting. Populated from the
/// run window whether or not the related drivers fired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_kw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_v: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_soc_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charger_faults: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charger_status: Option<String>,
}

/// A value resolved from [`ScoreDetails`] for rule evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum DetailValue {
    Number(f64),
    Text(String),
}

impl ScoreDetails {
    /// Look up a supporting value by its field name, as addressed by
    /// `meta.<key>` policy rules. Unknown names resolve to `None`.
    pub fn detail(&self, name: &str) -> Option<DetailValue> {
        match name {
            "current_a" => self.current_a.map(DetailValue::Number),
            "power_kw" => self.power_kw.map(DetailValue::Number),
            "voltage_v" => self.voltage_v.map(DetailValue::Number),
            "battery_soc_pct" => self.battery_soc_pct.map(DetailValue::Number),
            "charger_faults" => self.charger_faults.map(DetailValue::Number),
            "charger_status" => self.charger_status.clone().map(DetailValue::Text),
            _ => None,
        }
    }
}

/// Health verdict for one entity over one run window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScore {
    pub entity_type: String,
    pub entity_id: String,
    pub score: f64,
    pub status: HealthStatus,
    pub drivers: Vec<String>,
    #[serde(default)]
    pub details: ScoreDetails,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// A prioritized remediation recommendation derived from a health score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecommendation {
    pub action: ActionType,
    pub entity_type: String,
    pub entity_id: String,
    pub rationale: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Reporting event emitted by the orchestration layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub level: EventLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}
