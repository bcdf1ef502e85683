//! Formatted terminal output for a finished run.
//!
//! Formatting lives here so the pipeline stages stay free of presentation.

use crate::domain::{PipelineOutput, QaReport, format_timestamp};

/// How many missingness rows the summary prints.
const TOP_MISSING: usize = 8;

/// Counts describing what was fed into the run.
#[derive(Debug, Clone, Default)]
pub struct InputSummary {
    pub countries: usize,
    pub observations: usize,
    pub capitals: Option<usize>,
    pub row_errors: usize,
}

/// Format the run summary: inputs, QA checks, and the worst missing columns.
pub fn format_run_summary(output: &PipelineOutput, inputs: &InputSummary) -> String {
    let mut out = String::new();

    out.push_str("=== ci - Country Insights ===\n");
    out.push_str(&format!("As-of: {}\n", format_timestamp(&output.as_of_utc)));
    out.push_str(&format!(
        "Inputs: countries={} | observations={} | capitals={} | skipped rows={}\n",
        inputs.countries,
        inputs.observations,
        inputs
            .capitals
            .map_or_else(|| "unavailable".to_string(), |n| n.to_string()),
        inputs.row_errors,
    ));
    out.push_str(&format!("Rows: {}\n", output.status.row_count));

    out.push_str("\nQA checks:\n");
    for check in &output.report.checks {
        let mark = if check.passed { "ok  " } else { "FAIL" };
        out.push_str(&format!("{mark} {:<16} {}\n", check.name, check.details));
    }

    out.push_str("\nTop missing:\n");
    out.push_str(&format_missingness(&output.report, TOP_MISSING));

    if !output.report.validity_violations.is_empty() {
        out.push_str("\nValidity violations:\n");
        for v in output.report.validity_violations.iter().take(TOP_MISSING) {
            out.push_str(&format!("- {} {}: {}\n", v.iso3, v.column, v.reason));
        }
        let rest = output.report.validity_violations.len().saturating_sub(TOP_MISSING);
        if rest > 0 {
            out.push_str(&format!("  (+{rest} more)\n"));
        }
    }

    out.push_str(&format!(
        "\nQA passed: {}\n",
        if output.status.pass { "yes" } else { "no" }
    ));

    out
}

/// Format the first `top_n` missingness rows as a fixed-width table.
pub fn format_missingness(report: &QaReport, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<24} {:>8} {:>8}", "column", "missing", "rate").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<8} {:-<8}", "", "", "").trim_end());
    out.push('\n');

    for m in report.missingness.iter().take(top_n) {
        out.push_str(
            format!(
                "{:<24} {:>8} {:>8.4}",
                truncate(m.column.name(), 24),
                m.missing_count,
                m.missing_rate
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
