//! Report generation.
//!
//! This module renders aggregation results as CSV (the download format)
//! and as Markdown or JSON reports for the command line.

use crate::models::{AggregationRow, FileStatus, PendingRecord, ReportMetadata, ZoneReport};
use anyhow::Result;
use std::borrow::Cow;

/// Header row of the CSV export.
pub const CSV_HEADER: [&str; 2] = ["Zone", "Average"];

/// Format an average with a fixed number of decimals.
pub fn format_average(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Serialize rows as CSV: a `Zone,Average` header and one line per row.
pub fn generate_csv(rows: &[AggregationRow], precision: usize) -> String {
    let mut output = String::new();

    output.push_str(&CSV_HEADER.join(","));
    output.push('\n');

    for row in rows {
        output.push_str(&csv_field(&row.zone));
        output.push(',');
        output.push_str(&format_average(row.average, precision));
        output.push('\n');
    }

    output
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &ZoneReport, precision: usize) -> String {
    let mut output = String::new();

    output.push_str("# Zone Averages\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&format!(
        "**Filter:** Vocation `{}` / Mode `{}`\n\n",
        report.filter.vocation, report.filter.mode
    ));
    output.push_str(&generate_table_section(&report.rows, precision));
    output.push_str(&generate_pending_section(&report.pending));
    output.push_str(&generate_files_section(report));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Files Read:** {}\n", metadata.files_read));
    if metadata.files_rejected > 0 {
        section.push_str(&format!(
            "- **Files Rejected:** {}\n",
            metadata.files_rejected
        ));
    }
    section.push_str(&format!("- **Complete Hunts:** {}\n", metadata.records));
    section.push_str(&format!("- **Pending Hunts:** {}\n", metadata.pending));
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Generate the zone table.
fn generate_table_section(rows: &[AggregationRow], precision: usize) -> String {
    let mut section = String::new();

    section.push_str("## Zones\n\n");

    if rows.is_empty() {
        section.push_str("No hunts match the selected filters.\n\n");
        return section;
    }

    section.push_str("| Zone | Hunts | Average |\n");
    section.push_str("|:---|:---:|---:|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            markdown_cell(&row.zone),
            row.count,
            format_average(row.average, precision)
        ));
    }
    section.push('\n');

    section
}

/// Generate the pending list.
fn generate_pending_section(pending: &[PendingRecord]) -> String {
    if pending.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Pending\n\n");
    section.push_str("| Source | Vocation | Mode | Zone | Problems |\n");
    section.push_str("|:---|:---|:---|:---|:---|\n");
    for entry in pending {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            markdown_cell(&entry.source.to_string()),
            markdown_cell(entry.vocation.as_deref().unwrap_or("")),
            markdown_cell(entry.mode.as_deref().unwrap_or("")),
            markdown_cell(entry.zone.as_deref().unwrap_or("")),
            entry.problems()
        ));
    }
    section.push('\n');

    section
}

/// List files that were not accepted.
fn generate_files_section(report: &ZoneReport) -> String {
    let problems: Vec<_> = report
        .files
        .iter()
        .filter(|f| f.status != FileStatus::Accepted)
        .collect();

    if problems.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Skipped Files\n\n");
    for file in problems {
        match &file.error {
            Some(error) => section.push_str(&format!("- `{}`: {} ({})\n", file.file, file.status, error)),
            None => section.push_str(&format!("- `{}`: {}\n", file.file, file.status)),
        }
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &ZoneReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
