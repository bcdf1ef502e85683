//! CSV ingest of the raw extracts.
//!
//! Three tables come in:
//! - the country reference table (required; empty or unreadable is fatal)
//! - long-form indicator observations (one or more files)
//! - the capital/coordinate table (optional; any failure degrades to `None`)
//!
//! Bad rows are skipped and reported, never fatal on their own.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, warn};

use crate::domain::{CapitalRecord, CountryRecord, IndicatorObservation};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Parsed rows plus what was skipped.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl<T> Loaded<T> {
    fn log_row_errors(&self, table: &str) {
        for e in &self.row_errors {
            debug!(table, line = e.line, id = ?e.id, "{}", e.message);
        }
        if !self.row_errors.is_empty() {
            warn!(
                table,
                skipped = self.row_errors.len(),
                read = self.rows_read,
                "skipped invalid rows"
            );
        }
    }
}

/// Load the country reference table from `path`.
pub fn load_countries(path: &Path) -> Result<Loaded<CountryRecord>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::fatal_input(format!(
            "Failed to open country reference table '{}': {e}",
            path.display()
        ))
    })?;
    let loaded = read_countries(file)?;
    loaded.log_row_errors("countries");
    Ok(loaded)
}

/// Parse the country reference table.
///
/// Duplicate iso3 rows are kept; the QA engine reports them.
pub fn read_countries<R: Read>(reader: R) -> Result<Loaded<CountryRecord>, AppError> {
    let mut reader = csv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::fatal_input(format!("Failed to read country table headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    if !header_map.contains_key("iso3") {
        return Err(AppError::fatal_input(
            "Country reference table is missing required column: `iso3`",
        ));
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_country(&record, &header_map) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError {
                line,
                id: get_optional(&record, &header_map, "iso3").map(str::to_string),
                message,
            }),
        }
    }

    if rows.is_empty() {
        return Err(AppError::fatal_input(
            "Country reference table has no usable rows.",
        ));
    }

    Ok(Loaded {
        rows,
        row_errors,
        rows_read,
    })
}

/// Load long-form indicator observations from `path`.
pub fn load_observations(path: &Path) -> Result<Loaded<IndicatorObservation>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::io(format!(
            "Failed to open observations CSV '{}': {e}",
            path.display()
        ))
    })?;
    let loaded = read_observations(file)?;
    loaded.log_row_errors("observations");
    Ok(loaded)
}

/// Parse long-form observations (`iso3,indicator,year,value`).
///
/// Entity codes that are not three letters (regional aggregates in some
/// extracts) are dropped silently. Empty or non-numeric values are kept as
/// absent observations.
pub fn read_observations<R: Read>(reader: R) -> Result<Loaded<IndicatorObservation>, AppError> {
    let mut reader = csv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::io(format!("Failed to read observation headers: {e}")))?
        .clone();
    let mut header_map = build_header_map(&headers);

    if !header_map.contains_key("iso3") {
        if let Some(idx) = header_map.get("entity").copied() {
            header_map.insert("iso3".to_string(), idx);
        }
    }
    for required in ["iso3", "indicator", "year", "value"] {
        if !header_map.contains_key(required) {
            return Err(AppError::io(format!(
                "Observations CSV is missing required column: `{required}`"
            )));
        }
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_observation(&record, &header_map) {
            Ok(Some(obs)) => rows.push(obs),
            Ok(None) => {}
            Err(message) => row_errors.push(RowError {
                line,
                id: get_optional(&record, &header_map, "iso3").map(str::to_string),
                message,
            }),
        }
    }

    Ok(Loaded {
        rows,
        row_errors,
        rows_read,
    })
}

/// Load the optional capital table.
///
/// Any failure (no path, unreadable file, bad header, zero usable rows) is
/// logged and returns `None`; the merge then keeps reference-table values.
pub fn load_capitals(path: Option<&Path>) -> Option<Loaded<CapitalRecord>> {
    let Some(path) = path else {
        debug!("no capital table configured");
        return None;
    };

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "capital table unavailable; using reference values");
            return None;
        }
    };

    match read_capitals(file) {
        Ok(loaded) if !loaded.rows.is_empty() => {
            loaded.log_row_errors("capitals");
            Some(loaded)
        }
        Ok(_) => {
            warn!(path = %path.display(), "capital table is empty; using reference values");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "capital table unreadable; using reference values");
            None
        }
    }
}

/// Parse the capital table (`iso3,capital,lat,lon`; lat/lon optional).
pub fn read_capitals<R: Read>(reader: R) -> Result<Loaded<CapitalRecord>, AppError> {
    let mut reader = csv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::io(format!("Failed to read capital table headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for required in ["iso3", "capital"] {
        if !header_map.contains_key(required) {
            return Err(AppError::io(format!(
                "Capital table is missing required column: `{required}`"
            )));
        }
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let iso3 = match get_required(&record, &header_map, "iso3").and_then(parse_iso3) {
            Ok(code) => code,
            Err(message) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message,
                });
                continue;
            }
        };

        rows.push(CapitalRecord {
            iso3,
            capital: get_text(&record, &header_map, "capital"),
            lat: parse_opt_f64(get_optional(&record, &header_map, "lat")),
            lon: parse_opt_f64(get_optional(&record, &header_map, "lon")),
        });
    }

    Ok(Loaded {
        rows,
        row_errors,
        rows_read,
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn parse_country(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<CountryRecord, String> {
    let iso3 = parse_iso3(get_required(record, header_map, "iso3")?)?;

    let population_x = get_optional(record, header_map, "population")
        .or_else(|| get_optional(record, header_map, "population_x"));

    Ok(CountryRecord {
        iso3,
        country: get_text(record, header_map, "country"),
        region: get_text(record, header_map, "region"),
        subregion: get_text(record, header_map, "subregion"),
        capital: get_text(record, header_map, "capital"),
        lat: parse_opt_f64(get_optional(record, header_map, "lat")),
        lon: parse_opt_f64(get_optional(record, header_map, "lon")),
        population_x: parse_opt_f64(population_x),
    })
}

fn parse_observation(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> Result<Option<IndicatorObservation>, String> {
    let entity = get_required(record, header_map, "iso3")?;
    let Ok(entity) = parse_iso3(entity) else {
        return Ok(None);
    };
    let indicator = get_required(record, header_map, "indicator")?.to_string();
    let year_raw = get_required(record, header_map, "year")?;
    let year = year_raw
        .parse::<i32>()
        .map_err(|_| format!("Invalid year '{year_raw}'."))?;

    Ok(Some(IndicatorObservation {
        entity,
        indicator,
        year,
        value: parse_opt_f64(get_optional(record, header_map, "value")),
    }))
}

/// Normalize an iso3 code; rejects anything that is not three ASCII letters.
pub fn parse_iso3(raw: &str) -> Result<String, String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(format!("Invalid iso3 code '{raw}'."))
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Strip footnote markers such as `[a]` and surrounding whitespace.
fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Optional text cell with footnotes stripped; a cell holding only a
/// footnote marker reads as absent.
fn get_text(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<String> {
    get_optional(record, header_map, name)
        .map(clean_text)
        .filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countries_parse_with_bom_and_alias() {
        let csv = "\u{feff}ISO3,Country,Region,Subregion,Capital,Lat,Lon,Population_x\n\
                   gbr,United Kingdom,Europe,Northern Europe,London,51.5,-0.12,67000000\n\
                   ATA,Antarctica,Antarctic,,,-75,0,1000\n";
        let loaded = read_countries(csv.as_bytes()).unwrap();
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(loaded.rows[0].iso3, "GBR");
        assert_eq!(loaded.rows[0].population_x, Some(67_000_000.0));
        assert_eq!(loaded.rows[1].subregion, None);
        assert_eq!(loaded.rows[1].capital, None);
    }

    #[test]
    fn country_rows_with_bad_keys_are_skipped() {
        let csv = "iso3,country\nGBR,United Kingdom\nXX,Nowhere\n,Blank\n";
        let loaded = read_countries(csv.as_bytes()).unwrap();
        assert_eq!(loaded.rows.len(), 1);
        assert_eq!(loaded.row_errors.len(), 2);
        assert_eq!(loaded.row_errors[0].line, 3);
        assert_eq!(loaded.rows_read, 3);
    }

    #[test]
    fn duplicate_countries_are_kept_for_qa() {
        let csv = "iso3,country\nGBR,United Kingdom\nGBR,Britain\n";
        let loaded = read_countries(csv.as_bytes()).unwrap();
        assert_eq!(loaded.rows.len(), 2);
    }

    #[test]
    fn empty_country_table_is_fatal() {
        let err = read_countries("iso3,country\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_FATAL_INPUT);

        let err = read_countries("code,country\nGBR,United Kingdom\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_FATAL_INPUT);
    }

    #[test]
    fn observations_keep_null_values_and_drop_aggregates() {
        let csv = "entity,indicator,year,value\n\
                   GBR,SP.POP.TOTL,2022,66971411\n\
                   GBR,SP.POP.TOTL,2023,\n\
                   1W,SP.POP.TOTL,2023,8e9\n\
                   FRA,SP.POP.TOTL,20x2,1\n";
        let loaded = read_observations(csv.as_bytes()).unwrap();
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(loaded.rows[1].value, None);
        assert_eq!(loaded.row_errors.len(), 1);
        assert_eq!(loaded.row_errors[0].id.as_deref(), Some("FRA"));
    }

    #[test]
    fn observations_require_columns() {
        let err = read_observations("iso3,year,value\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_IO);
    }

    #[test]
    fn capitals_strip_footnotes() {
        let csv = "iso3,capital,lat,lon\nBOL,Sucre[a],-19.0,\n";
        let loaded = read_capitals(csv.as_bytes()).unwrap();
        assert_eq!(loaded.rows[0].capital.as_deref(), Some("Sucre"));
        assert_eq!(loaded.rows[0].lat, Some(-19.0));
        assert_eq!(loaded.rows[0].lon, None);
    }

    #[test]
    fn footnote_only_cells_read_as_absent() {
        let loaded = read_capitals("iso3,capital,lat,lon\nGBR,[a],,\n".as_bytes()).unwrap();
        assert_eq!(loaded.rows[0].capital, None);

        let csv = "iso3,country,region,subregion,capital\nGBR,United Kingdom[1],[n],[2] ,[a][b]\n";
        let loaded = read_countries(csv.as_bytes()).unwrap();
        let gbr = &loaded.rows[0];
        assert_eq!(gbr.country.as_deref(), Some("United Kingdom"));
        assert_eq!(gbr.region, None);
        assert_eq!(gbr.subregion, None);
        assert_eq!(gbr.capital, None);
    }

    #[test]
    fn missing_capital_file_is_not_an_error() {
        assert!(load_capitals(None).is_none());
        assert!(load_capitals(Some(Path::new("/nonexistent/capitals.csv"))).is_none());
    }
}
