//! Drift-based health scoring
//!
//! Compares per-entity run averages against baseline averages and turns
//! the deviations into a severity-weighted health score with named
//! drivers. Entities without a baseline are skipped, not failed: no
//! baseline, no judgment.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use crate::models::{HealthScore, HealthStatus, ScoreDetails, WindowStats};
use crate::observability::PipelineMetrics;
use crate::stats::METRIC_CHARGER_FAULTS;

/// Score at or above which an entity passes
pub const PASS_THRESHOLD: f64 = 85.0;
/// Score at or above which an entity warns instead of failing
pub const WARN_THRESHOLD: f64 = 60.0;

/// Guards ratio arithmetic against both-zero baselines. The exact value
/// is load-bearing for regression tests; severity outputs must match
/// bit for bit.
const RATIO_EPSILON: f64 = 1e-6;

const TEMP_DRIFT_DELTA: f64 = 10.0;
const TEMP_WARNING_DELTA: f64 = 5.0;
const SPIKE_RATIO: f64 = 3.0;
const INCREASE_RATIO: f64 = 1.5;
const OVERCURRENT_RATIO: f64 = 1.5;

const SEVERITY_TEMP_DRIFT: f64 = 40.0;
const SEVERITY_TEMP_WARNING: f64 = 20.0;
const SEVERITY_CHARGER_FAULT: f64 = 40.0;
const SEVERITY_OVERCURRENT: f64 = 30.0;
const SEVERITY_SPIKE: f64 = 35.0;
const SEVERITY_INCREASE: f64 = 15.0;

/// Contract violation scoped to a single entity's scoring
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("metric `{metric}` for entity `{entity_id}` is not a finite number")]
    NonFiniteMetric { entity_id: String, metric: String },
}

/// Classify a clamped score into a health status
pub fn classify(score: f64) -> HealthStatus {
    if score >= PASS_THRESHOLD {
        HealthStatus::Pass
    } else if score >= WARN_THRESHOLD {
        HealthStatus::Warn
    } else {
        HealthStatus::Fail
    }
}

/// Score every run entity that has a baseline counterpart.
///
/// Entities missing from the baseline map are skipped with a warning.
/// An entity whose metrics violate the numeric contract is skipped too;
/// one bad entity never takes down the rest of the batch. Iteration is
/// in entity-id order, and the severity accumulation per entity walks
/// the run metrics in name order, so the output is deterministic for a
/// given pair of input maps.
pub fn score_entities(
    baseline: &BTreeMap<String, WindowStats>,
    run: &BTreeMap<String, WindowStats>,
    metrics: &PipelineMetrics,
) -> Vec<HealthScore> {
    let mut scores = Vec::new();
    for (entity_id, run_stats) in run {
        let Some(base_stats) = baseline.get(entity_id) else {
            warn!(entity_id = %entity_id, "Missing baseline for entity, skipping");
            continue;
        };
        match score_entity(base_stats, run_stats) {
            Ok(score) => {
                metrics.inc_entities_scored();
                scores.push(score);
            }
            Err(err) => {
                warn!(error = %err, entity_id = %entity_id, "Skipping entity with invalid metrics");
                metrics.inc_scoring_errors();
            }
        }
    }
    scores
}

fn score_entity(
    base_stats: &WindowStats,
    run_stats: &WindowStats,
) -> Result<HealthScore, ScoreError> {
    let mut drivers = Vec::new();
    let mut severity = 0.0;

    for (metric, run_value) in &run_stats.metrics {
        let run_value = *run_value;
        let base_value = base_stats.metrics.get(metric).copied().unwrap_or(0.0);
        if !run_value.is_finite() || !base_value.is_finite() {
            return Err(ScoreError::NonFiniteMetric {
                entity_id: run_stats.entity_id.clone(),
                metric: metric.clone(),
            });
        }

        match metric.as_str() {
            "temperature_c" => {
                let delta = run_value - base_value;
                if delta >= TEMP_DRIFT_DELTA {
                    drivers.push("temperature_drift".to_string());
                    severity += SEVERITY_TEMP_DRIFT;
                } else if delta >= TEMP_WARNING_DELTA {
                    drivers.push("temperature_warning".to_string());
                    severity += SEVERITY_TEMP_WARNING;
                }
            }
            METRIC_CHARGER_FAULTS => {
                if run_value >= 1.0 {
                    drivers.push("charger_fault".to_string());
                    severity += SEVERITY_CHARGER_FAULT;
                }
            }
            "current_a" => {
                if base_value > 0.0 && run_value >= base_value * OVERCURRENT_RATIO {
                    drivers.push("overcurrent".to_string());
                    severity += SEVERITY_OVERCURRENT;
                }
            }
            _ => {
                let ratio = (run_value + RATIO_EPSILON) / (base_value + RATIO_EPSILON);
                if ratio >= SPIKE_RATIO {
                    drivers.push(format!("{metric}_spike"));
                    severity += SEVERITY_SPIKE;
                } else if ratio >= INCREASE_RATIO {
                    drivers.push(format!("{metric}_increase"));
                    severity += SEVERITY_INCREASE;
                }
            }
        }
    }

    let score = (100.0 - severity).clamp(0.0, 100.0);

    Ok(HealthScore {
        entity_type: run_stats.entity_type.clone(),
        entity_id: run_stats.entity_id.clone(),
        score,
        status: classify(score),
        drivers,
        details: build_details(run_stats),
        window_start: run_stats.window_start,
        window_end: run_stats.window_end,
    })
}

/// Populate the supporting values from the run window whether or not
/// the related drivers fired; policy rules look these up by name.
/// `charger_status` is always present: an entity with no observed
/// faults reads `ok`.
fn build_details(run_stats: &WindowStats) -> ScoreDetails {
    let get = |name: &str| run_stats.metrics.get(name).copied();
    let charger_faults = get(METRIC_CHARGER_FAULTS);
    let status = if charger_faults.unwrap_or(0.0) >= 1.0 {
        "fault"
    } else {
        "ok"
    };
    ScoreDetails {
        current_a: get("current_a"),
        power_kw: get("power_kw"),
        voltage_v: get("voltage_v"),
        battery_soc_pct: get("battery_soc_pct"),
        charger_faults,
        charger_status: Some(status.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatsKind;
    use chrono::{TimeZone, Utc};

    fn stats(entity_id: &str, kind: StatsKind, metrics: &[(&str, f64)]) -> WindowStats {
        WindowStats {
            entity_type: "link".to_string(),
            entity_id: entity_id.to_string(),
            metrics: metrics
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
            window_start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            window_end: Utc.with_ymd_and_hms(2025, 1, 1, 0, 5, 0).unwrap(),
            kind,
        }
    }

    fn maps(
        base: Vec<WindowStats>,
        run: Vec<WindowStats>,
    ) -> (
        BTreeMap<String, WindowStats>,
        BTreeMap<String, WindowStats>,
    ) {
        let index = |v: Vec<WindowStats>| {
            v.into_iter()
                .map(|s| (s.entity_id.clone(), s))
                .collect::<BTreeMap<_, _>>()
        };
        (index(base), index(run))
    }

    #[test]
    fn test_detects_error_spike() {
        let (base, run) = maps(
            vec![stats(
                "link-1",
                StatsKind::Baseline,
                &[("errors", 1.0), ("temperature_c", 40.0)],
            )],
            vec![stats(
                "link-1",
                StatsKind::Run,
                &[("errors", 4.0), ("temperature_c", 42.0)],
            )],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert_eq!(scores.len(), 1);
        // ratio 4/1 >= 3 -> spike, severity 35 -> score 65 -> WARN
        assert_eq!(scores[0].score, 65.0);
        assert_eq!(scores[0].status, HealthStatus::Warn);
        assert_eq!(scores[0].drivers, vec!["errors_spike"]);
    }

    #[test]
    fn test_temperature_drift_and_warning() {
        let (base, run) = maps(
            vec![stats("link-1", StatsKind::Baseline, &[("temperature_c", 40.0)])],
            vec![stats("link-1", StatsKind::Run, &[("temperature_c", 51.0)])],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert_eq!(scores[0].drivers, vec!["temperature_drift"]);
        assert_eq!(scores[0].score, 60.0);

        let (base, run) = maps(
            vec![stats("link-1", StatsKind::Baseline, &[("temperature_c", 40.0)])],
            vec![stats("link-1", StatsKind::Run, &[("temperature_c", 46.0)])],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert_eq!(scores[0].drivers, vec!["temperature_warning"]);
        assert_eq!(scores[0].score, 80.0);
    }

    #[test]
    fn test_charger_fault_driver() {
        let (base, run) = maps(
            vec![stats("charger-1", StatsKind::Baseline, &[("charger_faults", 0.0)])],
            vec![stats("charger-1", StatsKind::Run, &[("charger_faults", 1.0)])],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert_eq!(scores[0].drivers, vec!["charger_fault"]);
        assert_eq!(scores[0].score, 60.0);
        assert_eq!(scores[0].details.charger_status.as_deref(), Some("fault"));
    }

    #[test]
    fn test_overcurrent_requires_positive_baseline() {
        let (base, run) = maps(
            vec![stats("charger-1", StatsKind::Baseline, &[("current_a", 10.0)])],
            vec![stats("charger-1", StatsKind::Run, &[("current_a", 16.0)])],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert_eq!(scores[0].drivers, vec!["overcurrent"]);

        // zero baseline never flags overcurrent
        let (base, run) = maps(
            vec![stats("charger-1", StatsKind::Baseline, &[("current_a", 0.0)])],
            vec![stats("charger-1", StatsKind::Run, &[("current_a", 50.0)])],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert!(scores[0].drivers.is_empty());
    }

    #[test]
    fn test_missing_baseline_entity_is_skipped() {
        let (base, run) = maps(
            vec![stats("link-1", StatsKind::Baseline, &[("errors", 1.0)])],
            vec![
                stats("link-1", StatsKind::Run, &[("errors", 1.0)]),
                stats("link-9", StatsKind::Run, &[("errors", 100.0)]),
            ],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert_eq!(scores.len(), 1);
        assert!(scores.iter().all(|s| s.entity_id != "link-9"));
    }

    #[test]
    fn test_metric_absent_from_baseline_defaults_to_zero() {
        // baseline has the entity but not the metric; epsilon ratio fires a spike
        let (base, run) = maps(
            vec![stats("link-1", StatsKind::Baseline, &[("errors", 1.0)])],
            vec![stats(
                "link-1",
                StatsKind::Run,
                &[("errors", 1.0), ("drops", 5.0)],
            )],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert!(scores[0].drivers.contains(&"drops_spike".to_string()));
    }

    #[test]
    fn test_score_clamped_at_zero() {
        let (base, run) = maps(
            vec![stats(
                "link-1",
                StatsKind::Baseline,
                &[
                    ("errors", 1.0),
                    ("drops", 1.0),
                    ("retries", 1.0),
                    ("temperature_c", 40.0),
                ],
            )],
            vec![stats(
                "link-1",
                StatsKind::Run,
                &[
                    ("errors", 10.0),
                    ("drops", 10.0),
                    ("retries", 10.0),
                    ("temperature_c", 55.0),
                ],
            )],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        // 35 * 3 + 40 = 145 severity, clamped
        assert_eq!(scores[0].score, 0.0);
        assert_eq!(scores[0].status, HealthStatus::Fail);
    }

    #[test]
    fn test_healthy_entity_passes() {
        let (base, run) = maps(
            vec![stats("link-1", StatsKind::Baseline, &[("errors", 2.0)])],
            vec![stats("link-1", StatsKind::Run, &[("errors", 2.0)])],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert_eq!(scores[0].score, 100.0);
        assert_eq!(scores[0].status, HealthStatus::Pass);
        assert!(scores[0].drivers.is_empty());
    }

    #[test]
    fn test_details_populated_without_drivers() {
        let (base, run) = maps(
            vec![stats(
                "charger-1",
                StatsKind::Baseline,
                &[("current_a", 10.0), ("power_kw", 7.0), ("voltage_v", 230.0)],
            )],
            vec![stats(
                "charger-1",
                StatsKind::Run,
                &[
                    ("current_a", 10.0),
                    ("power_kw", 7.0),
                    ("voltage_v", 230.0),
                    ("battery_soc_pct", 80.0),
                    ("charger_faults", 0.0),
                ],
            )],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        let details = &scores[0].details;
        assert_eq!(details.current_a, Some(10.0));
        assert_eq!(details.power_kw, Some(7.0));
        assert_eq!(details.voltage_v, Some(230.0));
        assert_eq!(details.battery_soc_pct, Some(80.0));
        assert_eq!(details.charger_status.as_deref(), Some("ok"));
    }

    #[test]
    fn test_charger_status_defaults_to_ok_without_charger_metrics() {
        let (base, run) = maps(
            vec![stats("link-1", StatsKind::Baseline, &[("errors", 1.0)])],
            vec![stats("link-1", StatsKind::Run, &[("errors", 1.0)])],
        );
        let scores = score_entities(&base, &run, &PipelineMetrics::new());
        assert_eq!(scores[0].details.charger_status.as_deref(), Some("ok"));
        assert_eq!(scores[0].details.charger_faults, None);
    }

    #[test]
    fn test_non_finite_metric_skips_only_that_entity() {
        let (base, run) = maps(
            vec![
                stats("link-1", StatsKind::Baseline, &[("errors", 1.0)]),
                stats("link-2", StatsKind::Baseline, &[("errors", 1.0)]),
            ],
            vec![
                stats("link-1", StatsKind::Run, &[("errors", f64::NAN)]),
                stats("link-2", StatsKind::Run, &[("errors", 1.0)]),
            ],
        );
        let metrics = PipelineMetrics::new();
        let scores = score_entities(&base, &run, &metrics);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].entity_id, "link-2");
        assert_eq!(metrics.scoring_error_count(), 1);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let (base, run) = maps(
            vec![stats(
                "link-1",
                StatsKind::Baseline,
                &[("errors", 1.0), ("drops", 2.0), ("retries", 3.0)],
            )],
            vec![stats(
                "link-1",
                StatsKind::Run,
                &[("errors", 4.0), ("drops", 3.5), ("retries", 3.0)],
            )],
        );
        let first = score_entities(&base, &run, &PipelineMetrics::new());
        let second = score_entities(&base, &run, &PipelineMetrics::new());
        assert_eq!(first[0].score, second[0].score);
        assert_eq!(first[0].drivers, second[0].drivers);
    }
}
