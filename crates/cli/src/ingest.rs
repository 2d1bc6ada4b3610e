//! Telemetry file ingest
//!
//! Discovers telemetry files in an input directory, parses them into
//! raw records, and feeds them through the core normalizer. Files can
//! be read concurrently; record order within one file is preserved,
//! cross-file order is not guaranteed.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use driftwatch_lib::{normalize_records, PipelineMetrics, TelemetrySample};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::info;

/// Discover telemetry files: `telemetry.*` first, falling back to any
/// `*.jsonl` / `*.json` in the directory. Sorted for a stable sequential
/// ingest order.
pub fn find_telemetry_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut named = Vec::new();
    let mut fallback = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {}", dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        if stem == "telemetry" {
            named.push(path);
        } else if matches!(ext, "jsonl" | "json") {
            fallback.push(path);
        }
    }
    let mut files = if named.is_empty() { fallback } else { named };
    files.sort();
    Ok(files)
}

/// Parse one telemetry file into raw records.
///
/// `.json` accepts a top-level array or an object with a `records`
/// array; `.jsonl` takes one record per line, blank lines skipped.
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match ext {
        "json" => {
            let payload: Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?;
            match payload {
                Value::Array(records) => Ok(records),
                Value::Object(mut map) => match map.remove("records") {
                    Some(Value::Array(records)) => Ok(records),
                    _ => bail!("{} must be an array or contain a `records` array", path.display()),
                },
                _ => bail!("{} must be an array or contain a `records` array", path.display()),
            }
        }
        "jsonl" => content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("Invalid JSON on line {} of {}", idx + 1, path.display())
                })
            })
            .collect(),
        _ => bail!("Unsupported file type: {}", path.display()),
    }
}

/// Load and normalize every telemetry file under `dir`.
///
/// With more than one collector thread, file reads run on blocking
/// tasks and batches are normalized as each file completes; the core
/// normalizer itself stays sequential.
pub async fn load_samples(
    dir: &Path,
    collector_threads: usize,
    metrics: &PipelineMetrics,
) -> Result<Vec<TelemetrySample>> {
    let files = find_telemetry_files(dir)?;
    if files.is_empty() {
        info!(dir = %dir.display(), "No telemetry files found");
        return Ok(Vec::new());
    }
    info!(dir = %dir.display(), files = files.len(), "Ingesting telemetry files");

    let mut samples = Vec::new();
    if collector_threads <= 1 {
        for path in files {
            let records = load_records(&path)?;
            samples.extend(normalize_records(&records, metrics));
        }
        return Ok(samples);
    }

    let mut pending = files.into_iter();
    let mut set: JoinSet<Result<Vec<Value>>> = JoinSet::new();
    loop {
        while set.len() < collector_threads {
            let Some(path) = pending.next() else { break };
            set.spawn_blocking(move || load_records(&path));
        }
        let Some(joined) = set.join_next().await else { break };
        let records = joined.context("File ingest task panicked")??;
        samples.extend(normalize_records(&records, metrics));
    }
    Ok(samples)
}
