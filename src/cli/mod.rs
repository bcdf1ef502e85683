//! Command-line parsing for the country insights pipeline.
//!
//! Argument parsing and command dispatch stay separate from the pipeline
//! stages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::IndicatorCodes;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ci", version, about = "Country insights dataset builder (World Bank indicators + QA)")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the country list and indicators from the World Bank API into raw extracts.
    Fetch(FetchArgs),
    /// Build the dataset and QA artifacts from extracts already on disk.
    Build(BuildArgs),
    /// Fetch, then build the dataset in one step.
    Run(RunArgs),
}

/// Indicator code overrides shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct IndicatorArgs {
    /// Population indicator code.
    #[arg(long, default_value = "SP.POP.TOTL")]
    pub population_code: String,

    /// GDP (current US$) indicator code.
    #[arg(long, default_value = "NY.GDP.MKTP.CD")]
    pub gdp_code: String,

    /// GDP per capita (current US$) indicator code.
    #[arg(long, default_value = "NY.GDP.PCAP.CD")]
    pub gdp_per_capita_code: String,

    /// Life expectancy at birth indicator code.
    #[arg(long, default_value = "SP.DYN.LE00.IN")]
    pub life_expectancy_code: String,
}

impl IndicatorArgs {
    pub fn codes(&self) -> IndicatorCodes {
        IndicatorCodes {
            population: self.population_code.clone(),
            gdp_usd: self.gdp_code.clone(),
            gdp_per_capita_usd: self.gdp_per_capita_code.clone(),
            life_expectancy: self.life_expectancy_code.clone(),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    /// First year of the fetch window (the window ends at the current year).
    #[arg(long, default_value_t = 2010)]
    pub start_year: i32,

    /// Directory for raw extracts (`countries_worldbank.csv`, `indicator_<name>.csv`).
    #[arg(long, default_value = "data/raw")]
    pub raw_dir: PathBuf,

    #[command(flatten)]
    pub indicators: IndicatorArgs,
}

/// Enrichment input and outputs shared by `build` and `run`.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Optional capital/coordinate table CSV (`iso3,capital,lat,lon`).
    #[arg(long, value_name = "CSV")]
    pub capitals: Option<PathBuf>,

    /// Directory for the dataset and QA artifacts.
    #[arg(long, default_value = "data/processed")]
    pub out_dir: PathBuf,

    /// Exit with a non-zero code when QA fails (outputs are still written).
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Args, Clone)]
pub struct BuildArgs {
    /// Country reference table CSV.
    #[arg(long, value_name = "CSV")]
    pub countries: PathBuf,

    /// Long-form observation CSVs (`iso3,indicator,year,value`).
    #[arg(long = "observations", value_name = "CSV", num_args = 1.., required = true)]
    pub observations: Vec<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub indicators: IndicatorArgs,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// First year of the fetch window (the window ends at the current year).
    #[arg(long, default_value_t = 2010)]
    pub start_year: i32,

    /// Directory for raw extracts (`countries_worldbank.csv`, `indicator_<name>.csv`).
    #[arg(long, default_value = "data/raw")]
    pub raw_dir: PathBuf,

    /// Country reference table CSV; fetched from the World Bank when omitted.
    #[arg(long, value_name = "CSV")]
    pub countries: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub indicators: IndicatorArgs,
}
