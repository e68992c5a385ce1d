//! Skirmish - headless party-combat simulator
//!
//! Loads a JSON scenario, runs it to completion and writes a JSON summary.

use std::process::ExitCode;

use skirmish::cli;
use skirmish::combat::config::load_selector_config;
use skirmish::headless::{run_headless_skirmish, ScenarioConfig};

fn main() -> ExitCode {
    let args = cli::parse_args();

    let mut config = match ScenarioConfig::load_from_file(&args.scenario) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading scenario: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Command-line overrides
    if let Some(output) = &args.output {
        config.output_path = Some(output.to_string_lossy().into_owned());
    }
    if let Some(max_duration) = args.max_duration {
        config.max_duration_secs = max_duration;
    }
    if let Some(path) = &args.selector_config {
        match load_selector_config(&path.to_string_lossy()) {
            Ok(selector) => config.selector = Some(selector),
            Err(e) => {
                eprintln!("Error loading selector config: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    if args.seed.is_some() {
        config.random_seed = args.seed;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid scenario: {}", e);
        return ExitCode::FAILURE;
    }

    match run_headless_skirmish(config, Some(args.log_filter)) {
        Ok(result) => {
            match result.winner {
                Some(faction) => println!("Faction {} wins after {:.1}s", faction, result.duration),
                None => println!("Draw after {:.1}s", result.duration),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Headless skirmish failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
