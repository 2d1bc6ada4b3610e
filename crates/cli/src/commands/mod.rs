//! CLI subcommand implementations

pub mod baseline;
pub mod run;
