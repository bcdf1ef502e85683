//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - built from CSV extracts or API payloads
//! - passed by reference through resolve -> merge -> assess -> assemble
//! - exported to CSV/JSON

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Earliest year accepted by the validity check.
pub const MIN_PLAUSIBLE_YEAR: i32 = 1900;

/// The four indicators tracked per country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Population,
    GdpUsd,
    GdpPerCapitaUsd,
    LifeExpectancy,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 4] = [
        IndicatorKind::Population,
        IndicatorKind::GdpUsd,
        IndicatorKind::GdpPerCapitaUsd,
        IndicatorKind::LifeExpectancy,
    ];

    /// Short name used in raw extract file names and log lines.
    pub fn name(self) -> &'static str {
        match self {
            IndicatorKind::Population => "population",
            IndicatorKind::GdpUsd => "gdp_usd",
            IndicatorKind::GdpPerCapitaUsd => "gdp_per_capita_usd",
            IndicatorKind::LifeExpectancy => "life_expectancy",
        }
    }

    pub fn value_column(self) -> Column {
        match self {
            IndicatorKind::Population => Column::PopulationY,
            IndicatorKind::GdpUsd => Column::GdpUsd,
            IndicatorKind::GdpPerCapitaUsd => Column::GdpPerCapitaUsd,
            IndicatorKind::LifeExpectancy => Column::LifeExpectancy,
        }
    }

    pub fn year_column(self) -> Column {
        match self {
            IndicatorKind::Population => Column::PopulationYear,
            IndicatorKind::GdpUsd => Column::GdpUsdYear,
            IndicatorKind::GdpPerCapitaUsd => Column::GdpPerCapitaUsdYear,
            IndicatorKind::LifeExpectancy => Column::LifeExpectancyYear,
        }
    }
}

/// Statistical API codes for each indicator.
///
/// Passed explicitly to the resolver and the merger; nothing reads a global
/// indicator table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorCodes {
    pub population: String,
    pub gdp_usd: String,
    pub gdp_per_capita_usd: String,
    pub life_expectancy: String,
}

impl Default for IndicatorCodes {
    fn default() -> Self {
        Self {
            population: "SP.POP.TOTL".to_string(),
            gdp_usd: "NY.GDP.MKTP.CD".to_string(),
            gdp_per_capita_usd: "NY.GDP.PCAP.CD".to_string(),
            life_expectancy: "SP.DYN.LE00.IN".to_string(),
        }
    }
}

impl IndicatorCodes {
    pub fn code(&self, kind: IndicatorKind) -> &str {
        match kind {
            IndicatorKind::Population => &self.population,
            IndicatorKind::GdpUsd => &self.gdp_usd,
            IndicatorKind::GdpPerCapitaUsd => &self.gdp_per_capita_usd,
            IndicatorKind::LifeExpectancy => &self.life_expectancy,
        }
    }

    /// `(kind, code)` pairs in the fixed indicator order.
    pub fn iter(&self) -> impl Iterator<Item = (IndicatorKind, &str)> + '_ {
        IndicatorKind::ALL.into_iter().map(move |kind| (kind, self.code(kind)))
    }
}

/// A row of the static country reference table. `iso3` is the join key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountryRecord {
    pub iso3: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub capital: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Population as published by the reference table's own authority.
    pub population_x: Option<f64>,
}

/// One `(entity, indicator, year)` observation from the statistical API.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorObservation {
    pub entity: String,
    pub indicator: String,
    pub year: i32,
    pub value: Option<f64>,
}

/// Latest non-null observation for an `(entity, indicator)` pair.
///
/// `value` and `year` are either both present or both absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIndicator {
    pub entity: String,
    pub indicator: String,
    pub value: Option<f64>,
    pub year: Option<i32>,
}

/// Entity code -> resolved indicator, for one indicator code.
pub type ResolvedTable = HashMap<String, ResolvedIndicator>;

/// Indicator code -> resolved table.
pub type ResolvedSet = HashMap<String, ResolvedTable>;

/// Optional capital/coordinate enrichment row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CapitalRecord {
    pub iso3: String,
    pub capital: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// A country row from the World Bank country list.
///
/// Written as the raw reference extract; `income_level` stays in that file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldBankCountry {
    pub iso3: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub income_level: Option<String>,
    pub capital: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Value + year pair carried into the merged output for one indicator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorValue {
    pub value: Option<f64>,
    pub year: Option<i32>,
}

impl From<&ResolvedIndicator> for IndicatorValue {
    fn from(r: &ResolvedIndicator) -> Self {
        Self {
            value: r.value,
            year: r.year,
        }
    }
}

/// A reference-table country extended with resolved indicators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedRecord {
    pub iso3: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub capital: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub population_x: Option<f64>,
    /// `population_y` / `population_year`.
    pub population: IndicatorValue,
    pub gdp_usd: IndicatorValue,
    pub gdp_per_capita_usd: IndicatorValue,
    pub life_expectancy: IndicatorValue,
}

impl MergedRecord {
    pub fn indicator(&self, kind: IndicatorKind) -> &IndicatorValue {
        match kind {
            IndicatorKind::Population => &self.population,
            IndicatorKind::GdpUsd => &self.gdp_usd,
            IndicatorKind::GdpPerCapitaUsd => &self.gdp_per_capita_usd,
            IndicatorKind::LifeExpectancy => &self.life_expectancy,
        }
    }

    pub fn indicator_mut(&mut self, kind: IndicatorKind) -> &mut IndicatorValue {
        match kind {
            IndicatorKind::Population => &mut self.population,
            IndicatorKind::GdpUsd => &mut self.gdp_usd,
            IndicatorKind::GdpPerCapitaUsd => &mut self.gdp_per_capita_usd,
            IndicatorKind::LifeExpectancy => &mut self.life_expectancy,
        }
    }

    /// Value of `column` for this record.
    ///
    /// `Column::AsOfUtc` is not part of the record and reads as missing; the
    /// assembler supplies it.
    pub fn cell(&self, column: Column) -> Cell<'_> {
        fn text(s: &Option<String>) -> Cell<'_> {
            s.as_deref().map_or(Cell::Missing, Cell::Text)
        }
        fn number(v: Option<f64>) -> Cell<'static> {
            v.map_or(Cell::Missing, Cell::Number)
        }
        fn year(v: Option<i32>) -> Cell<'static> {
            v.map_or(Cell::Missing, Cell::Year)
        }

        match column {
            Column::Iso3 => Cell::Text(&self.iso3),
            Column::Country => text(&self.country),
            Column::Region => text(&self.region),
            Column::Subregion => text(&self.subregion),
            Column::Capital => text(&self.capital),
            Column::Lat => number(self.lat),
            Column::Lon => number(self.lon),
            Column::PopulationX => number(self.population_x),
            Column::PopulationY => number(self.population.value),
            Column::PopulationYear => year(self.population.year),
            Column::GdpUsd => number(self.gdp_usd.value),
            Column::GdpUsdYear => year(self.gdp_usd.year),
            Column::GdpPerCapitaUsd => number(self.gdp_per_capita_usd.value),
            Column::GdpPerCapitaUsdYear => year(self.gdp_per_capita_usd.year),
            Column::LifeExpectancy => number(self.life_expectancy.value),
            Column::LifeExpectancyYear => year(self.life_expectancy.year),
            Column::AsOfUtc => Cell::Missing,
        }
    }
}

/// A single cell of the output table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Year(i32),
    Missing,
}

impl Cell<'_> {
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::Year(_) => false,
        }
    }

    /// CSV rendering; missing cells render as an empty field.
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => (*s).to_string(),
            Cell::Number(v) => v.to_string(),
            Cell::Year(y) => y.to_string(),
            Cell::Missing => String::new(),
        }
    }
}

/// Logical group a column belongs to. Published column order never moves a
/// column backwards across groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnGroup {
    Key,
    Metadata,
    Population,
    Indicator,
    Pipeline,
}

/// Columns of the published dataset, in published order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Iso3,
    Country,
    Region,
    Subregion,
    Capital,
    Lat,
    Lon,
    PopulationX,
    PopulationY,
    PopulationYear,
    GdpUsd,
    GdpUsdYear,
    GdpPerCapitaUsd,
    GdpPerCapitaUsdYear,
    LifeExpectancy,
    LifeExpectancyYear,
    AsOfUtc,
}

impl Column {
    /// Full published schema, including `as_of_utc`.
    pub const ALL: [Column; 17] = [
        Column::Iso3,
        Column::Country,
        Column::Region,
        Column::Subregion,
        Column::Capital,
        Column::Lat,
        Column::Lon,
        Column::PopulationX,
        Column::PopulationY,
        Column::PopulationYear,
        Column::GdpUsd,
        Column::GdpUsdYear,
        Column::GdpPerCapitaUsd,
        Column::GdpPerCapitaUsdYear,
        Column::LifeExpectancy,
        Column::LifeExpectancyYear,
        Column::AsOfUtc,
    ];

    /// Columns carried by a `MergedRecord` (everything but pipeline metadata).
    pub fn record_columns() -> impl Iterator<Item = Column> {
        Column::ALL
            .into_iter()
            .filter(|c| c.group() != ColumnGroup::Pipeline)
    }

    pub fn name(self) -> &'static str {
        match self {
            Column::Iso3 => "iso3",
            Column::Country => "country",
            Column::Region => "region",
            Column::Subregion => "subregion",
            Column::Capital => "capital",
            Column::Lat => "lat",
            Column::Lon => "lon",
            Column::PopulationX => "population_x",
            Column::PopulationY => "population_y",
            Column::PopulationYear => "population_year",
            Column::GdpUsd => "gdp_usd",
            Column::GdpUsdYear => "gdp_usd_year",
            Column::GdpPerCapitaUsd => "gdp_per_capita_usd",
            Column::GdpPerCapitaUsdYear => "gdp_per_capita_usd_year",
            Column::LifeExpectancy => "life_expectancy",
            Column::LifeExpectancyYear => "life_expectancy_year",
            Column::AsOfUtc => "as_of_utc",
        }
    }

    pub fn group(self) -> ColumnGroup {
        match self {
            Column::Iso3 => ColumnGroup::Key,
            Column::Country
            | Column::Region
            | Column::Subregion
            | Column::Capital
            | Column::Lat
            | Column::Lon => ColumnGroup::Metadata,
            Column::PopulationX | Column::PopulationY | Column::PopulationYear => ColumnGroup::Population,
            Column::GdpUsd
            | Column::GdpUsdYear
            | Column::GdpPerCapitaUsd
            | Column::GdpPerCapitaUsdYear
            | Column::LifeExpectancy
            | Column::LifeExpectancyYear => ColumnGroup::Indicator,
            Column::AsOfUtc => ColumnGroup::Pipeline,
        }
    }

    /// Text-valued columns; everything else is numeric.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Column::Iso3 | Column::Country | Column::Region | Column::Subregion | Column::Capital | Column::AsOfUtc
        )
    }

    pub fn is_year(self) -> bool {
        matches!(
            self,
            Column::PopulationYear | Column::GdpUsdYear | Column::GdpPerCapitaUsdYear | Column::LifeExpectancyYear
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// An iso3 that appears more than once in the merged table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    pub iso3: String,
    pub count: usize,
}

/// Missingness of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingnessEntry {
    pub column: Column,
    pub missing_count: usize,
    pub missing_rate: f64,
}

/// Why a value failed the validity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationReason {
    Negative,
    YearOutOfRange { min: i32, max: i32 },
    YearWithoutValue,
    ValueWithoutYear,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::Negative => f.write_str("negative value"),
            ViolationReason::YearOutOfRange { min, max } => {
                write!(f, "year outside plausible range {min}..={max}")
            }
            ViolationReason::YearWithoutValue => f.write_str("year present without value"),
            ViolationReason::ValueWithoutYear => f.write_str("value present without year"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidityViolation {
    pub iso3: String,
    pub column: Column,
    pub reason: ViolationReason,
}

/// One row of the check table (`check,passed,details`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QaReport {
    pub duplicate_keys: Vec<DuplicateKey>,
    /// Sorted by `missing_rate` descending, ties in column order.
    pub missingness: Vec<MissingnessEntry>,
    pub validity_violations: Vec<ValidityViolation>,
    pub checks: Vec<CheckOutcome>,
}

/// Pass/fail gate for a run; serialized as `qa_status.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaStatus {
    pub pass: bool,
    pub row_count: usize,
    #[serde(serialize_with = "serialize_timestamp")]
    pub generated_at: DateTime<Utc>,
    pub failed_checks: Vec<String>,
    pub max_missing_column: Option<Column>,
    pub max_missing_rate: f64,
}

/// Fully shaped output of one run, ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub as_of_utc: DateTime<Utc>,
    pub columns: Vec<Column>,
    pub records: Vec<MergedRecord>,
    pub report: QaReport,
    pub status: QaStatus,
}

/// ISO 8601 with an explicit `+00:00` offset, second precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}

/// Inputs and outputs of an offline `build` run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub indicators: IndicatorCodes,
    pub countries_path: PathBuf,
    pub observation_paths: Vec<PathBuf>,
    pub capitals_path: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub strict: bool,
}

/// Parameters of a fetch against the statistical API.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub indicators: IndicatorCodes,
    pub start_year: i32,
    pub end_year: i32,
    pub raw_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn published_column_order() {
        let names: Vec<&str> = Column::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "iso3",
                "country",
                "region",
                "subregion",
                "capital",
                "lat",
                "lon",
                "population_x",
                "population_y",
                "population_year",
                "gdp_usd",
                "gdp_usd_year",
                "gdp_per_capita_usd",
                "gdp_per_capita_usd_year",
                "life_expectancy",
                "life_expectancy_year",
                "as_of_utc",
            ]
        );
    }

    #[test]
    fn column_groups_never_go_backwards() {
        let groups: Vec<ColumnGroup> = Column::ALL.iter().map(|c| c.group()).collect();
        assert!(groups.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(Column::record_columns().count(), 16);
    }

    #[test]
    fn every_indicator_maps_to_a_value_and_year_column() {
        for kind in IndicatorKind::ALL {
            assert!(!kind.value_column().is_year());
            assert!(kind.year_column().is_year());
            assert_eq!(kind.year_column().name(), format!("{}_year", kind.name()));
        }
    }

    #[test]
    fn timestamp_has_explicit_utc_offset() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 15, 18, 33, 17).unwrap();
        assert_eq!(format_timestamp(&ts), "2025-12-15T18:33:17+00:00");
    }

    #[test]
    fn default_codes() {
        let codes = IndicatorCodes::default();
        let pairs: Vec<(IndicatorKind, &str)> = codes.iter().collect();
        assert_eq!(pairs[0], (IndicatorKind::Population, "SP.POP.TOTL"));
        assert_eq!(pairs[3], (IndicatorKind::LifeExpectancy, "SP.DYN.LE00.IN"));
    }

    #[test]
    fn blank_text_counts_as_missing() {
        assert!(Cell::Text("  ").is_missing());
        assert!(!Cell::Number(0.0).is_missing());
        assert_eq!(Cell::Missing.render(), "");
    }
}
