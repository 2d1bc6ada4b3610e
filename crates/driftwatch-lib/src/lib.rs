//! Core library for the driftwatch pipeline
//!
//! This crate provides the decision core for baseline-vs-run drift
//! detection over link and charger telemetry:
//! - Record normalization and schema migration
//! - Per-entity window aggregation
//! - Drift-based health scoring
//! - Rule-driven action recommendation
//!
//! The pipeline is a pure transform chain over in-memory collections:
//! no I/O, no concurrency, no shared mutable state. File ingest,
//! reporting, and alert transport live in the orchestrating binary.

pub mod models;
pub mod normalize;
pub mod observability;
pub mod policy;
pub mod scoring;
pub mod stats;

pub use models::{
    ActionRecommendation, ActionType, Event, EventLevel, HealthScore, HealthStatus, ScoreDetails,
    StatsKind, TelemetrySample, WindowStats,
};
pub use normalize::{normalize_record, normalize_records, NormalizeError};
pub use observability::PipelineMetrics;
pub use policy::{recommend_actions, FeatureFlags, PolicyRule};
pub use scoring::{score_entities, ScoreError};
pub use stats::{build_stats, stats_by_entity};
