//! `driftwatch run`: score a run window against a captured baseline

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use driftwatch_lib::policy::FLAG_EXPLAINABILITY;
use driftwatch_lib::{
    build_stats, recommend_actions, score_entities, stats_by_entity, FeatureFlags,
    PipelineMetrics, WindowStats,
};
use serde_json::json;
use tracing::info;

use crate::config::DriftwatchConfig;
use crate::{ingest, report};

pub async fn execute(
    input: &Path,
    baseline_dir: &Path,
    output: &Path,
    config: &DriftwatchConfig,
) -> Result<()> {
    let run_id = new_run_id();
    let started_at = Utc::now();

    let baseline_path = baseline_dir.join("baseline.json");
    if !baseline_path.exists() {
        bail!("Missing baseline.json in {}", baseline_dir.display());
    }
    let baseline_records: Vec<WindowStats> = serde_json::from_str(
        &std::fs::read_to_string(&baseline_path)
            .with_context(|| format!("Failed to read {}", baseline_path.display()))?,
    )
    .with_context(|| format!("Invalid baseline stats in {}", baseline_path.display()))?;
    let baseline_map = stats_by_entity(baseline_records);

    let metrics = PipelineMetrics::new();
    let samples = ingest::load_samples(input, config.collector_threads, &metrics).await?;
    let (_, run_stats) = build_stats(&samples, &config.entity_type);
    let run_map = stats_by_entity(run_stats.clone());

    let scores = score_entities(&baseline_map, &run_map, &metrics);
    let flags = FeatureFlags::from(config.feature_flags.clone());
    let actions = recommend_actions(&scores, &flags, &config.policy_rules);

    let explainability = flags.enabled(FLAG_EXPLAINABILITY);
    let mut events = report::build_score_events(&scores, &run_id, explainability);
    events.extend(report::build_action_events(&actions, &run_id));

    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;
    report::write_json(&output.join("run_stats.json"), &run_stats)?;
    report::write_json(&output.join("scores.json"), &scores)?;
    report::write_json(&output.join("actions.json"), &actions)?;
    report::write_jsonl(&output.join("events.jsonl"), &events)?;

    let run_meta = json!({
        "run_id": run_id,
        "input_dir": input.display().to_string(),
        "baseline_dir": baseline_dir.display().to_string(),
        "output_dir": output.display().to_string(),
        "sample_count": samples.len(),
        "rejected_count": metrics.normalize_error_count(),
        "score_count": scores.len(),
        "event_count": events.len(),
        "action_count": actions.len(),
        "explainability": explainability,
        "started_at": started_at.to_rfc3339(),
        "completed_at": Utc::now().to_rfc3339(),
    });
    report::write_json(&output.join("run_meta.json"), &run_meta)?;

    info!(
        run_id = %run_id,
        samples = samples.len(),
        scores = scores.len(),
        actions = actions.len(),
        "Run completed"
    );
    report::render_summary(&scores);
    report::print_success(&format!("Wrote run outputs to {}", output.display()));
    Ok(())
}

/// Unique-enough run identifier derived from the wall clock
fn new_run_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("run-{:x}{:x}", now.as_secs(), now.subsec_nanos())
}
