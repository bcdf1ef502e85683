//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - fetches the country list and indicators from the World Bank API
//! - runs resolve / merge / QA / assembly
//! - prints the run summary and writes outputs

use std::path::PathBuf;

use chrono::{Datelike, SubsecRound, Utc};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{BuildArgs, Command, FetchArgs, OutputArgs, RunArgs};
use crate::data::WorldBankClient;
use crate::domain::{BuildConfig, FetchConfig, IndicatorCodes, PipelineOutput};
use crate::error::{AppError, EXIT_QA_FAILED};

pub mod pipeline;

/// Entry point for the `ci` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Fetch(args) => handle_fetch(args),
        Command::Build(args) => handle_build(args),
        Command::Run(args) => handle_run(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fetch(args: FetchArgs) -> Result<(), AppError> {
    let config = fetch_config(args.start_year, args.raw_dir, args.indicators.codes());
    let client = WorldBankClient::from_env()?;
    pipeline::fetch_reference_table(&client, &config.raw_dir)?;
    let observations = pipeline::fetch_observations(&client, &config)?;
    info!(rows = observations.len(), dir = %config.raw_dir.display(), "fetch complete");
    Ok(())
}

fn handle_build(args: BuildArgs) -> Result<(), AppError> {
    let config = build_config(args.countries, &args.output, args.observations, args.indicators.codes());
    let inputs = pipeline::load_inputs(&config)?;
    finish(&config, &inputs)
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let codes = args.indicators.codes();
    let fetch = fetch_config(args.start_year, args.raw_dir, codes.clone());
    let client = WorldBankClient::from_env()?;

    // A local reference table is loaded before any request so a fatal input
    // error aborts without touching the network.
    let countries_path = match args.countries {
        Some(path) => path,
        None => pipeline::fetch_reference_table(&client, &fetch.raw_dir)?,
    };
    let config = build_config(countries_path, &args.output, Vec::new(), codes);
    let mut inputs = pipeline::load_inputs(&config)?;

    let observations = pipeline::fetch_observations(&client, &fetch)?;

    inputs.summary.observations = observations.len();
    inputs.observations = observations;

    finish(&config, &inputs)
}

/// Run the core stages, print the summary, write outputs, apply `--strict`.
fn finish(config: &BuildConfig, inputs: &pipeline::PipelineInputs) -> Result<(), AppError> {
    let run_timestamp = Utc::now().trunc_subsecs(0);
    let output = pipeline::run_with_inputs(inputs, &config.indicators, run_timestamp)?;

    println!("{}", crate::report::format_run_summary(&output, &inputs.summary));

    let written = crate::io::write_outputs(&config.out_dir, &output)?;
    for path in &written {
        println!("Saved: {}", path.display());
    }

    strict_gate(&output, config.strict)
}

fn strict_gate(output: &PipelineOutput, strict: bool) -> Result<(), AppError> {
    if output.status.pass {
        return Ok(());
    }
    warn!(failed = %output.status.failed_checks.join(","), "dataset did not pass QA");
    if strict {
        return Err(AppError::new(
            EXIT_QA_FAILED,
            format!("QA failed: {}", output.status.failed_checks.join(", ")),
        ));
    }
    Ok(())
}

pub fn fetch_config(start_year: i32, raw_dir: PathBuf, indicators: IndicatorCodes) -> FetchConfig {
    FetchConfig {
        indicators,
        start_year,
        end_year: Utc::now().year(),
        raw_dir,
    }
}

pub fn build_config(
    countries_path: PathBuf,
    output: &OutputArgs,
    observation_paths: Vec<PathBuf>,
    indicators: IndicatorCodes,
) -> BuildConfig {
    BuildConfig {
        indicators,
        countries_path,
        observation_paths,
        capitals_path: output.capitals.clone(),
        out_dir: output.out_dir.clone(),
        strict: output.strict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CountryRecord;
    use chrono::TimeZone;

    fn output_with_duplicates() -> PipelineOutput {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let gbr = CountryRecord {
            iso3: "GBR".to_string(),
            ..CountryRecord::default()
        };
        let inputs = pipeline::PipelineInputs {
            countries: vec![gbr.clone(), gbr],
            ..pipeline::PipelineInputs::default()
        };
        pipeline::run_with_inputs(&inputs, &IndicatorCodes::default(), ts).unwrap()
    }

    #[test]
    fn strict_gate_only_fails_in_strict_mode() {
        let output = output_with_duplicates();
        assert!(!output.status.pass);
        assert!(strict_gate(&output, false).is_ok());
        let err = strict_gate(&output, true).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_QA_FAILED);
    }
}
