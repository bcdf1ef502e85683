//! Persist a finished run and raw extracts.
//!
//! Output files (all in one directory):
//! - `country_insights_latest.csv`
//! - `country_insights_latest.parquet`
//! - `qa_missingness_report.csv`
//! - `qa_checks.csv`
//! - `qa_validity_violations.csv`
//! - `qa_status.json`

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, Int32Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::info;

use crate::domain::{Cell, Column, IndicatorObservation, PipelineOutput, WorldBankCountry, format_timestamp};
use crate::error::AppError;

pub const DATASET_FILE: &str = "country_insights_latest.csv";
pub const DATASET_PARQUET_FILE: &str = "country_insights_latest.parquet";
pub const MISSINGNESS_FILE: &str = "qa_missingness_report.csv";
pub const CHECKS_FILE: &str = "qa_checks.csv";
pub const VIOLATIONS_FILE: &str = "qa_validity_violations.csv";
pub const STATUS_FILE: &str = "qa_status.json";
pub const COUNTRIES_RAW_FILE: &str = "countries_worldbank.csv";

/// Write the dataset and every QA artifact into `dir`, overwriting previous
/// files. Returns the written paths in the order above.
pub fn write_outputs(dir: &Path, output: &PipelineOutput) -> Result<Vec<PathBuf>, AppError> {
    create_dir_all(dir)
        .map_err(|e| AppError::io(format!("Failed to create output dir '{}': {e}", dir.display())))?;

    let dataset = dir.join(DATASET_FILE);
    let mut w = csv_writer(&dataset)?;
    write_record(&mut w, output.header())?;
    for row in output.rows() {
        write_record(&mut w, &row)?;
    }
    flush(w, &dataset)?;

    let parquet = dir.join(DATASET_PARQUET_FILE);
    write_dataset_parquet(&parquet, output)?;

    let missingness = dir.join(MISSINGNESS_FILE);
    let mut w = csv_writer(&missingness)?;
    write_record(&mut w, ["column_name", "missing_count", "missing_rate"])?;
    for m in &output.report.missingness {
        write_record(
            &mut w,
            [
                m.column.name().to_string(),
                m.missing_count.to_string(),
                m.missing_rate.to_string(),
            ],
        )?;
    }
    flush(w, &missingness)?;

    let checks = dir.join(CHECKS_FILE);
    let mut w = csv_writer(&checks)?;
    write_record(&mut w, ["check", "passed", "details"])?;
    for c in &output.report.checks {
        write_record(&mut w, [c.name, if c.passed { "true" } else { "false" }, c.details.as_str()])?;
    }
    flush(w, &checks)?;

    let violations = dir.join(VIOLATIONS_FILE);
    let mut w = csv_writer(&violations)?;
    write_record(&mut w, ["iso3", "column", "reason"])?;
    for v in &output.report.validity_violations {
        write_record(
            &mut w,
            [v.iso3.clone(), v.column.name().to_string(), v.reason.to_string()],
        )?;
    }
    flush(w, &violations)?;

    let status = dir.join(STATUS_FILE);
    let file = File::create(&status)
        .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", status.display())))?;
    serde_json::to_writer_pretty(file, &output.status)
        .map_err(|e| AppError::io(format!("Failed to write QA status JSON: {e}")))?;

    info!(dir = %dir.display(), rows = output.records.len(), "wrote outputs");

    Ok(vec![dataset, parquet, missingness, checks, violations, status])
}

/// Write the dataset as a single-row-group Parquet file, Snappy compressed.
pub fn write_dataset_parquet(path: &Path, output: &PipelineOutput) -> Result<(), AppError> {
    let batch = dataset_batch(output)?;
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let parquet_err = |e: parquet::errors::ParquetError| {
        AppError::io(format!("Failed to write Parquet '{}': {e}", path.display()))
    };

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props)).map_err(parquet_err)?;
    writer.write(&batch).map_err(parquet_err)?;
    writer.close().map_err(parquet_err)?;
    Ok(())
}

/// Typed columns in published order; absent cells become nulls.
fn dataset_batch(output: &PipelineOutput) -> Result<RecordBatch, AppError> {
    let rows = output.records.len();
    let as_of = format_timestamp(&output.as_of_utc);

    let mut fields = Vec::with_capacity(output.columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(output.columns.len());

    for &column in &output.columns {
        let (data_type, array): (DataType, ArrayRef) = if column == Column::AsOfUtc {
            let mut b = StringBuilder::with_capacity(rows, rows * as_of.len());
            for _ in 0..rows {
                b.append_value(&as_of);
            }
            (DataType::Utf8, Arc::new(b.finish()))
        } else if column.is_text() {
            let mut b = StringBuilder::with_capacity(rows, rows * 16);
            for record in &output.records {
                match record.cell(column) {
                    Cell::Text(s) if !s.trim().is_empty() => b.append_value(s),
                    _ => b.append_null(),
                }
            }
            (DataType::Utf8, Arc::new(b.finish()))
        } else if column.is_year() {
            let mut b = Int32Builder::with_capacity(rows);
            for record in &output.records {
                match record.cell(column) {
                    Cell::Year(y) => b.append_value(y),
                    _ => b.append_null(),
                }
            }
            (DataType::Int32, Arc::new(b.finish()))
        } else {
            let mut b = Float64Builder::with_capacity(rows);
            for record in &output.records {
                match record.cell(column) {
                    Cell::Number(v) => b.append_value(v),
                    _ => b.append_null(),
                }
            }
            (DataType::Float64, Arc::new(b.finish()))
        };

        let nullable = !matches!(column, Column::Iso3 | Column::AsOfUtc);
        fields.push(Field::new(column.name(), data_type, nullable));
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| AppError::io(format!("Failed to build dataset batch: {e}")))
}

/// Write the fetched country list (`iso3,country,region,income_level,capital,lat,lon`).
///
/// `io::ingest::read_countries` reads this layout as a reference table.
pub fn write_countries_csv(path: &Path, countries: &[WorldBankCountry]) -> Result<(), AppError> {
    ensure_parent(path)?;

    let mut w = csv_writer(path)?;
    write_record(
        &mut w,
        ["iso3", "country", "region", "income_level", "capital", "lat", "lon"],
    )?;
    for c in countries {
        write_record(
            &mut w,
            [
                c.iso3.clone(),
                c.country.clone().unwrap_or_default(),
                c.region.clone().unwrap_or_default(),
                c.income_level.clone().unwrap_or_default(),
                c.capital.clone().unwrap_or_default(),
                c.lat.map(|v| v.to_string()).unwrap_or_default(),
                c.lon.map(|v| v.to_string()).unwrap_or_default(),
            ],
        )?;
    }
    flush(w, path)
}

/// Write long-form observations (`iso3,indicator,year,value`) to `path`.
///
/// The layout matches what `io::ingest::read_observations` accepts.
pub fn write_observations_csv(path: &Path, observations: &[IndicatorObservation]) -> Result<(), AppError> {
    ensure_parent(path)?;

    let mut w = csv_writer(path)?;
    write_record(&mut w, ["iso3", "indicator", "year", "value"])?;
    for o in observations {
        write_record(
            &mut w,
            [
                o.entity.clone(),
                o.indicator.clone(),
                o.year.to_string(),
                o.value.map(|v| v.to_string()).unwrap_or_default(),
            ],
        )?;
    }
    flush(w, path)
}

fn ensure_parent(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)
            .map_err(|e| AppError::io(format!("Failed to create dir '{}': {e}", parent.display())))?;
    }
    Ok(())
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))
}

fn write_record<I, T>(w: &mut csv::Writer<File>, record: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    w.write_record(record)
        .map_err(|e| AppError::io(format!("Failed to write CSV row: {e}")))
}

fn flush(mut w: csv::Writer<File>, path: &Path) -> Result<(), AppError> {
    w.flush()
        .map_err(|e| AppError::io(format!("Failed to flush '{}': {e}", path.display())))
}
