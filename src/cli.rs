//! Command-line interface for the headless skirmish runner

use clap::Parser;
use std::path::PathBuf;

/// Headless party-combat skirmish simulator
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Headless party-combat skirmish simulator")]
#[command(version)]
pub struct Args {
    /// JSON scenario file to run
    #[arg(long, value_name = "SCENARIO_FILE")]
    pub scenario: PathBuf,

    /// Output path for the skirmish summary
    #[arg(long, value_name = "OUTPUT_PATH")]
    pub output: Option<PathBuf>,

    /// Maximum skirmish duration in seconds (overrides the scenario)
    #[arg(long)]
    pub max_duration: Option<f32>,

    /// RON selector tuning file (overrides the scenario's `selector`)
    #[arg(long, value_name = "RON_FILE")]
    pub selector_config: Option<PathBuf>,

    /// Random seed (overrides the scenario)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log filter passed to the tracing subscriber
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}

pub fn parse_args() -> Args {
    Args::parse()
}
