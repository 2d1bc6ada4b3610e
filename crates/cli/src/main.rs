//! Driftwatch CLI
//!
//! Orchestrates the drift-detection pipeline: capture a baseline window
//! from telemetry files, then score later run windows against it and
//! emit policy recommendations, events, and JSON artifacts.

mod commands;
mod config;
mod ingest;
mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::DriftwatchConfig;

/// Baseline vs. run drift detection for link telemetry
#[derive(Parser)]
#[command(name = "driftwatch")]
#[command(author, version, about = "Baseline vs. run drift detection for link telemetry", long_about = None)]
struct Cli {
    /// Path to a TOML/JSON config file
    #[arg(long, env = "DRIFTWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a baseline window from telemetry files
    Baseline {
        /// Directory containing telemetry files
        #[arg(long)]
        input: PathBuf,

        /// Directory for baseline outputs; defaults to the input
        /// directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Score a run window against a captured baseline
    Run {
        /// Directory containing run telemetry files
        #[arg(long)]
        input: PathBuf,

        /// Directory containing baseline.json
        #[arg(long)]
        baseline: PathBuf,

        /// Directory for run outputs
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DriftwatchConfig::load(cli.config.as_deref())?;
    init_tracing(&config);

    match cli.command {
        Commands::Baseline { input, out } => {
            commands::baseline::execute(&input, out.as_deref(), &config).await
        }
        Commands::Run {
            input,
            baseline,
            output,
        } => commands::run::execute(&input, &baseline, &output, &config).await,
    }
}

fn init_tracing(config: &DriftwatchConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    if config.log_format == "text" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    }
}
