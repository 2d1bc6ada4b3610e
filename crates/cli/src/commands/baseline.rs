//! `driftwatch baseline`: capture a baseline window

use std::path::Path;

use anyhow::{Context, Result};
use driftwatch_lib::{build_stats, PipelineMetrics};
use tracing::info;

use crate::config::DriftwatchConfig;
use crate::{ingest, report};

pub async fn execute(input: &Path, out: Option<&Path>, config: &DriftwatchConfig) -> Result<()> {
    let metrics = PipelineMetrics::new();
    let samples = ingest::load_samples(input, config.collector_threads, &metrics).await?;
    let (baseline_stats, _) = build_stats(&samples, &config.entity_type);

    let out_dir = out.unwrap_or(input);
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;
    let baseline_path = out_dir.join("baseline.json");
    report::write_json(&baseline_path, &baseline_stats)?;
    report::write_jsonl(&out_dir.join("normalized.jsonl"), &samples)?;

    info!(
        samples = samples.len(),
        rejected = metrics.normalize_error_count(),
        entities = baseline_stats.len(),
        "Baseline captured"
    );
    report::print_success(&format!(
        "Wrote baseline stats for {} entities to {}",
        baseline_stats.len(),
        baseline_path.display()
    ));
    Ok(())
}
