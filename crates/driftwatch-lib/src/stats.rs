//! Window aggregation
//!
//! Reduces a batch of telemetry samples into per-entity average metrics
//! over one time window. Baseline building and run building share this
//! single code path; the caller keeps whichever view it needs.

use std::collections::BTreeMap;

use crate::models::{StatsKind, TelemetrySample, WindowStats};

/// Default entity type attached to aggregated stats
pub const ENTITY_TYPE_LINK: &str = "link";

/// Derived metric counting the fraction of a group's samples that
/// reported a charger fault.
pub const METRIC_CHARGER_FAULTS: &str = "charger_faults";

#[derive(Default)]
struct MetricSums {
    sums: BTreeMap<String, (f64, u64)>,
    sample_count: u64,
    fault_count: u64,
    charger_seen: bool,
}

impl MetricSums {
    fn add(&mut self, metric: &str, value: f64) {
        let entry = self.sums.entry(metric.to_string()).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    fn means(&self) -> BTreeMap<String, f64> {
        let mut metrics: BTreeMap<String, f64> = self
            .sums
            .iter()
            .map(|(name, (sum, count))| (name.clone(), sum / (*count).max(1) as f64))
            .collect();
        // charger_faults divides by the whole group, not by presence
        if self.charger_seen {
            metrics.insert(
                METRIC_CHARGER_FAULTS.to_string(),
                self.fault_count as f64 / self.sample_count.max(1) as f64,
            );
        }
        metrics
    }
}

/// Aggregate samples into per-entity window statistics.
///
/// Returns the same aggregation twice, tagged as the baseline view and
/// the run view, with every entity labeled `entity_type`. Empty input
/// yields two empty vectors. Each metric's mean divides only by the
/// number of samples where that metric was present. Window bounds are
/// the global min/max timestamps across the whole batch, shared by
/// every entity.
pub fn build_stats(
    samples: &[TelemetrySample],
    entity_type: &str,
) -> (Vec<WindowStats>, Vec<WindowStats>) {
    if samples.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let window_start = samples.iter().map(|s| s.timestamp).min().expect("non-empty");
    let window_end = samples.iter().map(|s| s.timestamp).max().expect("non-empty");

    let mut groups: BTreeMap<String, MetricSums> = BTreeMap::new();
    for sample in samples {
        let group = groups.entry(sample.link_id.clone()).or_default();
        group.sample_count += 1;

        group.add("errors", sample.errors as f64);
        group.add("drops", sample.drops as f64);
        group.add("retries", sample.retries as f64);
        group.add("fec_corrected", sample.fec_corrected as f64);
        group.add("fec_uncorrected", sample.fec_uncorrected as f64);

        for (metric, value) in [
            ("ber", sample.ber),
            ("tx_power_dbm", sample.tx_power_dbm),
            ("rx_power_dbm", sample.rx_power_dbm),
            ("temperature_c", sample.temperature_c),
            ("congestion_pct", sample.congestion_pct),
            ("power_kw", sample.power_kw),
            ("energy_kwh", sample.energy_kwh),
            ("voltage_v", sample.voltage_v),
            ("current_a", sample.current_a),
            ("battery_soc_pct", sample.battery_soc_pct),
        ] {
            if let Some(value) = value {
                group.add(metric, value);
            }
        }

        if sample.charger_status.is_some() || sample.charger_fault_code.is_some() {
            group.charger_seen = true;
        }
        let faulted = sample.charger_status.as_deref() == Some("fault")
            || sample.charger_fault_code.is_some();
        if faulted {
            group.fault_count += 1;
        }
    }

    let make = |kind: StatsKind| -> Vec<WindowStats> {
        groups
            .iter()
            .map(|(entity_id, sums)| WindowStats {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.clone(),
                metrics: sums.means(),
                window_start,
                window_end,
                kind,
            })
            .collect()
    };

    (make(StatsKind::Baseline), make(StatsKind::Run))
}

/// Index stats by entity id for scorer input
pub fn stats_by_entity(stats: Vec<WindowStats>) -> BTreeMap<String, WindowStats> {
    stats
        .into_iter()
        .map(|stat| (stat.entity_id.clone(), stat))
        .collect()
}
