//! Pipeline metrics
//!
//! Counters and histograms for the normalize/score pipeline. The
//! registry is owned by the [`PipelineMetrics`] value and passed into
//! the pipeline explicitly, so two pipelines (or two tests) never share
//! counter state through a process-wide global.

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Histogram buckets for normalize batch duration (in seconds)
const DURATION_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Owned metrics handle for one pipeline invocation.
///
/// Clones share the same underlying registry and counters.
#[derive(Clone)]
pub struct PipelineMetrics {
    registry: Registry,
    telemetry_ingested: IntCounter,
    normalize_errors: IntCounter,
    entities_scored: IntCounter,
    scoring_errors: IntCounter,
    normalize_duration_seconds: Histogram,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let telemetry_ingested = IntCounter::with_opts(Opts::new(
            "driftwatch_telemetry_ingested_total",
            "Telemetry records successfully normalized",
        ))
        .expect("valid counter opts");
        let normalize_errors = IntCounter::with_opts(Opts::new(
            "driftwatch_normalize_errors_total",
            "Telemetry records dropped by validation",
        ))
        .expect("valid counter opts");
        let entities_scored = IntCounter::with_opts(Opts::new(
            "driftwatch_entities_scored_total",
            "Entities that received a health score",
        ))
        .expect("valid counter opts");
        let scoring_errors = IntCounter::with_opts(Opts::new(
            "driftwatch_scoring_errors_total",
            "Entities skipped by the scorer due to contract violations",
        ))
        .expect("valid counter opts");
        let normalize_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "driftwatch_normalize_duration_seconds",
                "Time spent normalizing one batch of records",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
        )
        .expect("valid histogram opts");

        registry
            .register(Box::new(telemetry_ingested.clone()))
            .expect("register telemetry_ingested");
        registry
            .register(Box::new(normalize_errors.clone()))
            .expect("register normalize_errors");
        registry
            .register(Box::new(entities_scored.clone()))
            .expect("register entities_scored");
        registry
            .register(Box::new(scoring_errors.clone()))
            .expect("register scoring_errors");
        registry
            .register(Box::new(normalize_duration_seconds.clone()))
            .expect("register normalize_duration_seconds");

        Self {
            registry,
            telemetry_ingested,
            normalize_errors,
            entities_scored,
            scoring_errors,
            normalize_duration_seconds,
        }
    }

    pub fn inc_telemetry_ingested(&self) {
        self.telemetry_ingested.inc();
    }

    pub fn inc_normalize_errors(&self) {
        self.normalize_errors.inc();
    }

    pub fn inc_entities_scored(&self) {
        self.entities_scored.inc();
    }

    pub fn inc_scoring_errors(&self) {
        self.scoring_errors.inc();
    }

    /// Start a timer against the normalize duration histogram
    pub fn start_normalize_timer(&self) -> prometheus::HistogramTimer {
        self.normalize_duration_seconds.start_timer()
    }

    pub fn ingested_count(&self) -> u64 {
        self.telemetry_ingested.get()
    }

    pub fn normalize_error_count(&self) -> u64 {
        self.normalize_errors.get()
    }

    pub fn scoring_error_count(&self) -> u64 {
        self.scoring_errors.get()
    }

    /// Gather metric families for exposition by the caller
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.ingested_count(), 0);
        assert_eq!(metrics.normalize_error_count(), 0);
    }

    #[test]
    fn test_instances_are_independent() {
        let a = PipelineMetrics::new();
        let b = PipelineMetrics::new();
        a.inc_telemetry_ingested();
        a.inc_telemetry_ingested();
        assert_eq!(a.ingested_count(), 2);
        assert_eq!(b.ingested_count(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let a = PipelineMetrics::new();
        let b = a.clone();
        b.inc_normalize_errors();
        assert_eq!(a.normalize_error_count(), 1);
    }

    #[test]
    fn test_gather_exposes_families() {
        let metrics = PipelineMetrics::new();
        metrics.inc_telemetry_ingested();
        let families = metrics.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "driftwatch_telemetry_ingested_total"));
    }
}
