//! Output assembly: shapes the final table and QA artifacts for persistence.

use chrono::{DateTime, Utc};

use crate::domain::{Column, MergedRecord, PipelineOutput, QaReport, QaStatus, format_timestamp};

pub mod format;

pub use format::*;

/// Attach the run timestamp and the published column order.
pub fn assemble(
    merged: Vec<MergedRecord>,
    report: QaReport,
    status: QaStatus,
    run_timestamp: DateTime<Utc>,
) -> PipelineOutput {
    PipelineOutput {
        as_of_utc: run_timestamp,
        columns: Column::ALL.to_vec(),
        records: merged,
        report,
        status,
    }
}

impl PipelineOutput {
    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Rendered rows in column order; `as_of_utc` is filled on every row.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let as_of = format_timestamp(&self.as_of_utc);
        self.records
            .iter()
            .map(|record| {
                self.columns
                    .iter()
                    .map(|&column| match column {
                        Column::AsOfUtc => as_of.clone(),
                        other => record.cell(other).render(),
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IndicatorValue;
    use crate::qa::assess;
    use chrono::TimeZone;

    #[test]
    fn rows_follow_published_order_and_carry_timestamp() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 15, 18, 33, 17).unwrap();
        let merged = vec![MergedRecord {
            iso3: "GBR".to_string(),
            country: Some("United Kingdom".to_string()),
            region: Some("Europe".to_string()),
            subregion: Some("Northern Europe".to_string()),
            capital: Some("London".to_string()),
            lat: Some(51.5),
            lon: Some(-0.12),
            population_x: Some(67_000_000.0),
            population: IndicatorValue {
                value: Some(68_350_000.0),
                year: Some(2023),
            },
            ..MergedRecord::default()
        }];
        let (report, status) = assess(&merged, ts);
        let output = assemble(merged, report, status, ts);

        assert_eq!(output.header().len(), 17);
        assert_eq!(output.header()[0], "iso3");
        assert_eq!(output.header()[16], "as_of_utc");

        let rows = output.rows();
        assert_eq!(
            rows[0],
            vec![
                "GBR",
                "United Kingdom",
                "Europe",
                "Northern Europe",
                "London",
                "51.5",
                "-0.12",
                "67000000",
                "68350000",
                "2023",
                "",
                "",
                "",
                "",
                "",
                "",
                "2025-12-15T18:33:17+00:00",
            ]
        );
    }
}
