//! Shared pipeline logic used by the `build` and `run` commands.
//!
//! raw extracts -> resolve -> merge -> assess -> assemble
//!
//! Fetching and file I/O happen around this; the core stages only see
//! in-memory tables.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::data::WorldBankClient;
use crate::domain::{
    BuildConfig, CapitalRecord, CountryRecord, FetchConfig, IndicatorCodes, IndicatorObservation, PipelineOutput,
};
use crate::error::AppError;
use crate::io::{
    COUNTRIES_RAW_FILE, load_capitals, load_countries, load_observations, write_countries_csv,
    write_observations_csv,
};
use crate::merge::{log_unmatched, merge, unmatched_entities};
use crate::qa::assess;
use crate::report::{InputSummary, assemble};
use crate::resolve::resolve_all;

/// Tables consumed by the core stages.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub countries: Vec<CountryRecord>,
    pub observations: Vec<IndicatorObservation>,
    /// `None` when the enrichment table is unavailable.
    pub capitals: Option<Vec<CapitalRecord>>,
    pub summary: InputSummary,
}

/// Execute resolve -> merge -> assess -> assemble over in-memory inputs.
///
/// The only failure is an empty reference table.
pub fn run_with_inputs(
    inputs: &PipelineInputs,
    codes: &IndicatorCodes,
    run_timestamp: DateTime<Utc>,
) -> Result<PipelineOutput, AppError> {
    if inputs.countries.is_empty() {
        return Err(AppError::fatal_input("Country reference table is empty."));
    }

    let resolved = resolve_all(&inputs.observations, codes);
    log_unmatched(&unmatched_entities(&inputs.countries, &resolved, codes));

    let merged = merge(&inputs.countries, &resolved, inputs.capitals.as_deref(), codes);
    let (report, status) = assess(&merged, run_timestamp);

    Ok(assemble(merged, report, status, run_timestamp))
}

/// Load the reference table, observation extracts, and optional capitals.
pub fn load_inputs(config: &BuildConfig) -> Result<PipelineInputs, AppError> {
    let countries = load_countries(&config.countries_path)?;

    let mut observations = Vec::new();
    let mut row_errors = countries.row_errors.len();
    for path in &config.observation_paths {
        let loaded = load_observations(path)?;
        row_errors += loaded.row_errors.len();
        observations.extend(loaded.rows);
    }

    let capitals = load_capitals(config.capitals_path.as_deref());
    if let Some(c) = &capitals {
        row_errors += c.row_errors.len();
    }

    info!(
        countries = countries.rows.len(),
        observations = observations.len(),
        capitals = capitals.as_ref().map_or(0, |c| c.rows.len()),
        "loaded inputs"
    );

    let summary = InputSummary {
        countries: countries.rows.len(),
        observations: observations.len(),
        capitals: capitals.as_ref().map(|c| c.rows.len()),
        row_errors,
    };

    Ok(PipelineInputs {
        countries: countries.rows,
        observations,
        capitals: capitals.map(|c| c.rows),
        summary,
    })
}

/// Fetch the World Bank country list into `raw_dir` as a reference table.
///
/// Returns the written path, ready for `BuildConfig::countries_path`.
pub fn fetch_reference_table(client: &WorldBankClient, raw_dir: &Path) -> Result<PathBuf, AppError> {
    info!("fetching country list");
    let countries = client.fetch_countries()?;

    let path = raw_dir.join(COUNTRIES_RAW_FILE);
    write_countries_csv(&path, &countries)?;
    info!(path = %path.display(), rows = countries.len(), "wrote raw extract");
    Ok(path)
}

/// Fetch every configured indicator and write one raw extract per indicator.
///
/// Returns all observations concatenated in indicator order.
pub fn fetch_observations(
    client: &WorldBankClient,
    config: &FetchConfig,
) -> Result<Vec<IndicatorObservation>, AppError> {
    let mut all = Vec::new();
    for (kind, code) in config.indicators.iter() {
        info!(indicator = kind.name(), code, "fetching indicator");
        let observations = client.fetch_indicator(code, config.start_year, config.end_year)?;

        let path = config.raw_dir.join(format!("indicator_{}.csv", kind.name()));
        write_observations_csv(&path, &observations)?;
        info!(path = %path.display(), rows = observations.len(), "wrote raw extract");

        all.extend(observations);
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_reference_table_is_fatal() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let err = run_with_inputs(&PipelineInputs::default(), &IndicatorCodes::default(), ts).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_FATAL_INPUT);
    }
}
