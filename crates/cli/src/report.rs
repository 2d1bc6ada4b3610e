//! Output persistence and console reporting
//!
//! Translates scores and actions into events, writes the JSON/JSONL
//! artifacts of a pipeline run, and renders the console summary table.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use driftwatch_lib::{ActionRecommendation, Event, EventLevel, HealthScore, HealthStatus};
use serde::Serialize;
use serde_json::json;
use tabled::{settings::Style, Table, Tabled};

/// Build reporting events for every non-PASS score.
///
/// With explainability enabled the event carries the drivers and the
/// numeric score; without it only the status line remains.
pub fn build_score_events(scores: &[HealthScore], run_id: &str, explainability: bool) -> Vec<Event> {
    scores
        .iter()
        .filter(|score| score.status != HealthStatus::Pass)
        .map(|score| {
            let level = match score.status {
                HealthStatus::Warn => EventLevel::Warn,
                _ => EventLevel::Error,
            };
            let mut details = BTreeMap::new();
            details.insert("run_id".to_string(), json!(run_id));
            if explainability {
                details.insert("drivers".to_string(), json!(score.drivers));
                details.insert("score".to_string(), json!(score.score));
            }
            Event {
                timestamp: score.window_end,
                level,
                message: format!(
                    "{} {} {} drivers={}",
                    score.entity_type,
                    score.entity_id,
                    score.status,
                    score.drivers.join(",")
                ),
                entity_type: Some(score.entity_type.clone()),
                entity_id: Some(score.entity_id.clone()),
                details,
            }
        })
        .collect()
}

/// Build an INFO event per recommended action
pub fn build_action_events(actions: &[ActionRecommendation], run_id: &str) -> Vec<Event> {
    actions
        .iter()
        .map(|action| Event {
            timestamp: Utc::now(),
            level: EventLevel::Info,
            message: format!(
                "action={} entity={}:{}",
                action.action, action.entity_type, action.entity_id
            ),
            entity_type: Some(action.entity_type.clone()),
            entity_id: Some(action.entity_id.clone()),
            details: BTreeMap::from([
                ("run_id".to_string(), json!(run_id)),
                ("rationale".to_string(), json!(action.rationale)),
            ]),
        })
        .collect()
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    std::fs::write(path, payload).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut lines = String::new();
    for item in items {
        lines.push_str(&serde_json::to_string(item)?);
        lines.push('\n');
    }
    std::fs::write(path, lines).with_context(|| format!("Failed to write {}", path.display()))
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Drivers")]
    drivers: String,
}

/// Render the per-entity health summary table
pub fn render_summary(scores: &[HealthScore]) {
    if scores.is_empty() {
        println!("{}", "No entities scored".yellow());
        return;
    }
    let rows: Vec<SummaryRow> = scores
        .iter()
        .map(|score| SummaryRow {
            entity: format!("{}:{}", score.entity_type, score.entity_id),
            status: color_status(score.status),
            score: format!("{:.1}", score.score),
            drivers: score.drivers.join(", "),
        })
        .collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
}

fn color_status(status: HealthStatus) -> String {
    match status {
        HealthStatus::Pass => status.to_string().green().to_string(),
        HealthStatus::Warn => status.to_string().yellow().to_string(),
        HealthStatus::Fail => status.to_string().red().to_string(),
    }
}

/// Print a success line for completed commands
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}
