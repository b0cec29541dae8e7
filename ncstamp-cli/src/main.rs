//! ncstamp - instrument NC programs with machining progress stamps.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ncstamp_core::{stamp_file, validate_config, LineEnding, StampingConfig};

/// Instrument NC programs with machining progress stamps.
#[derive(Parser, Debug)]
#[command(name = "ncstamp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input NC program path
    #[arg(short, long)]
    input: PathBuf,

    /// Output path for the instrumented program
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file (flags below override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Variable receiving sequence stamps (e.g. Q5)
    #[arg(long)]
    sequence_variable: Option<String>,

    /// Variable receiving the start-cycle stamp
    #[arg(long)]
    start_cycle_variable: Option<String>,

    /// Variable receiving the stop-cycle stamp
    #[arg(long)]
    stop_cycle_variable: Option<String>,

    /// Dedicated milestone variable (folded into the sequence stamp when absent)
    #[arg(long)]
    milestone_variable: Option<String>,

    /// Milestone trigger frequency in minutes
    #[arg(long)]
    frequency_minutes: Option<f64>,

    /// Write DOS line endings (CR LF)
    #[arg(long)]
    crlf: bool,

    /// Delay sequence stamps until the first machining instruction
    #[arg(long)]
    defer_sequence_stamp: bool,

    /// Keep stamp lines already present in the input
    #[arg(long)]
    keep_existing_stamps: bool,

    /// Validate the configuration only, don't stamp
    #[arg(long)]
    validate: bool,

    /// Output the run summary as JSON
    #[arg(long)]
    debug: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Merge the config file and the command line flags.
fn build_config(args: &Args) -> Result<StampingConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => StampingConfig::default(),
    };

    if let Some(variable) = &args.sequence_variable {
        config.variables.sequence_stamp_variable = Some(variable.clone());
    }
    if let Some(variable) = &args.start_cycle_variable {
        config.variables.start_cycle_variable = Some(variable.clone());
    }
    if let Some(variable) = &args.stop_cycle_variable {
        config.variables.stop_cycle_variable = Some(variable.clone());
    }
    if let Some(variable) = &args.milestone_variable {
        config.variables.milestone_variable = Some(variable.clone());
    }
    if let Some(frequency) = args.frequency_minutes {
        config.time.milestone_frequency_minutes = frequency;
    }
    if args.crlf {
        config.line_ending = LineEnding::CrLf;
    }
    if args.defer_sequence_stamp {
        config.defer_sequence_stamp = true;
    }
    config.strip_existing_stamps = !args.keep_existing_stamps;

    Ok(config)
}

/// Default output path: `prog.h` becomes `prog.stamped.h`.
fn default_output_path(input: &PathBuf) -> PathBuf {
    match input.extension().and_then(|e| e.to_str()) {
        Some(extension) => input.with_extension(format!("stamped.{extension}")),
        None => input.with_extension("stamped"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = build_config(&args)?;

    // Validate
    let validation = validate_config(&config);

    for warning in &validation.warnings {
        warn!("{}", warning);
    }

    for err in &validation.errors {
        error!("{}", err);
    }

    if !validation.passed {
        anyhow::bail!("Validation failed");
    }

    // Validate-only mode
    if args.validate {
        info!("Validation passed");
        return Ok(());
    }

    info!("Processing: {}", args.input.display());

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));

    let summary = stamp_file(&args.input, &output_path, config)
        .await
        .with_context(|| format!("Failed to stamp {}", args.input.display()))?;

    if summary.parse_errors > 0 {
        warn!(
            "{} line(s) could not be classified and were passed through",
            summary.parse_errors
        );
    }

    // Debug output
    if args.debug {
        let json = serde_json::to_string_pretty(&summary)?;
        println!("{}", json);
    }

    info!("Generated: {}", output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(&PathBuf::from("prog.h")),
            PathBuf::from("prog.stamped.h")
        );
        assert_eq!(
            default_output_path(&PathBuf::from("prog")),
            PathBuf::from("prog.stamped")
        );
    }
}
