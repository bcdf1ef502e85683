//! QA checks over the merged table.
//!
//! Three independent checks always run, in this order:
//!
//! 1. `unique_iso3`: every iso3 appears once
//! 2. `missingness_ok`: per-column missing rates (informational, never fails)
//! 3. `values_valid`: non-negative indicator values, plausible years, and
//!    value/year pairing
//!
//! The run passes only when `unique_iso3` and `values_valid` pass.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, warn};

use crate::domain::{
    CheckOutcome, Column, DuplicateKey, IndicatorKind, MIN_PLAUSIBLE_YEAR, MergedRecord, MissingnessEntry,
    QaReport, QaStatus, ValidityViolation, ViolationReason,
};

pub const CHECK_UNIQUE_ISO3: &str = "unique_iso3";
pub const CHECK_MISSINGNESS: &str = "missingness_ok";
pub const CHECK_VALIDITY: &str = "values_valid";

/// Assess the merged table.
///
/// `generated_at` is stamped on the status and its year is the upper bound
/// for plausible `*_year` values. Given the same table and timestamp the
/// result is identical.
pub fn assess(merged: &[MergedRecord], generated_at: DateTime<Utc>) -> (QaReport, QaStatus) {
    let max_year = generated_at.year();

    let duplicate_keys = find_duplicate_keys(merged);
    let missingness = compute_missingness(merged);
    let validity_violations = find_validity_violations(merged, MIN_PLAUSIBLE_YEAR, max_year);

    let extra_rows: usize = duplicate_keys.iter().map(|d| d.count - 1).sum();
    let worst = missingness.first().filter(|m| m.missing_count > 0);

    let checks = vec![
        CheckOutcome {
            name: CHECK_UNIQUE_ISO3,
            passed: duplicate_keys.is_empty(),
            details: format!("{extra_rows} duplicate row(s) across {} key(s)", duplicate_keys.len()),
        },
        CheckOutcome {
            name: CHECK_MISSINGNESS,
            passed: true,
            details: match worst {
                Some(m) => format!("worst column {} at {:.4}", m.column, m.missing_rate),
                None => "no missing values".to_string(),
            },
        },
        CheckOutcome {
            name: CHECK_VALIDITY,
            passed: validity_violations.is_empty(),
            details: format!("{} violation(s)", validity_violations.len()),
        },
    ];

    let failed_checks: Vec<String> = checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| c.name.to_string())
        .collect();

    let status = QaStatus {
        pass: failed_checks.is_empty(),
        row_count: merged.len(),
        generated_at,
        failed_checks,
        max_missing_column: worst.map(|m| m.column),
        max_missing_rate: worst.map_or(0.0, |m| m.missing_rate),
    };

    if status.pass {
        info!(rows = status.row_count, "QA passed");
    } else {
        warn!(
            rows = status.row_count,
            failed = %status.failed_checks.join(","),
            "QA failed"
        );
    }

    let report = QaReport {
        duplicate_keys,
        missingness,
        validity_violations,
        checks,
    };

    (report, status)
}

/// Keys appearing more than once, in order of first appearance.
fn find_duplicate_keys(merged: &[MergedRecord]) -> Vec<DuplicateKey> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for record in merged {
        let count = counts.entry(record.iso3.as_str()).or_insert(0);
        if *count == 0 {
            order.push(record.iso3.as_str());
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter_map(|iso3| {
            let count = counts[iso3];
            (count > 1).then(|| DuplicateKey {
                iso3: iso3.to_string(),
                count,
            })
        })
        .collect()
}

/// Missing count and rate for every record column, worst first.
fn compute_missingness(merged: &[MergedRecord]) -> Vec<MissingnessEntry> {
    let total = merged.len();

    let mut entries: Vec<MissingnessEntry> = Column::record_columns()
        .map(|column| {
            let missing_count = merged.iter().filter(|r| r.cell(column).is_missing()).count();
            let missing_rate = if total == 0 {
                0.0
            } else {
                missing_count as f64 / total as f64
            };
            MissingnessEntry {
                column,
                missing_count,
                missing_rate,
            }
        })
        .collect();

    // Stable sort: ties keep column declaration order.
    entries.sort_by(|a, b| b.missing_rate.partial_cmp(&a.missing_rate).unwrap_or(Ordering::Equal));
    entries
}

fn find_validity_violations(merged: &[MergedRecord], min_year: i32, max_year: i32) -> Vec<ValidityViolation> {
    let mut out = Vec::new();

    for record in merged {
        for kind in IndicatorKind::ALL {
            let iv = record.indicator(kind);
            let mut push = |column: Column, reason: ViolationReason| {
                out.push(ValidityViolation {
                    iso3: record.iso3.clone(),
                    column,
                    reason,
                });
            };

            match (iv.value, iv.year) {
                (Some(_), None) => push(kind.value_column(), ViolationReason::ValueWithoutYear),
                (None, Some(_)) => push(kind.year_column(), ViolationReason::YearWithoutValue),
                _ => {}
            }

            if let Some(value) = iv.value {
                if value < 0.0 {
                    push(kind.value_column(), ViolationReason::Negative);
                }
            }

            if let Some(year) = iv.year {
                if year < 0 {
                    push(kind.year_column(), ViolationReason::Negative);
                } else if year < min_year || year > max_year {
                    push(
                        kind.year_column(),
                        ViolationReason::YearOutOfRange {
                            min: min_year,
                            max: max_year,
                        },
                    );
                }
            }
        }
    }

    out
}
