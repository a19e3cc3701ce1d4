// Report projection and rendering
// Turns the accumulator into the sorted college leaderboard

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::aggregate::CollegeStats;

/// One row of the college category report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "College")]
    pub college: String,

    #[serde(rename = "Normalized Name")]
    pub normalized_name: String,

    #[serde(rename = "C1 Count")]
    pub c1_count: u64,

    #[serde(rename = "C2 Count")]
    pub c2_count: u64,

    #[serde(rename = "C3 Count")]
    pub c3_count: u64,

    #[serde(rename = "C4 Count")]
    pub c4_count: u64,

    #[serde(rename = "C5 Count")]
    pub c5_count: u64,

    #[serde(rename = "Total Students")]
    pub total_students: u64,
}

/// Project the accumulator into report rows, sorted by Total Students
/// descending. Ties are broken by canonical name ascending so repeated runs
/// render identical reports.
pub fn project(stats: &CollegeStats) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = stats
        .snapshot()
        .into_iter()
        .map(|entry| ReportRow {
            college: if entry.original_name.is_empty() {
                "Unknown".to_string()
            } else {
                entry.original_name
            },
            normalized_name: entry.canonical_name,
            c1_count: entry.counts[0],
            c2_count: entry.counts[1],
            c3_count: entry.counts[2],
            c4_count: entry.counts[3],
            c5_count: entry.counts[4],
            total_students: entry.total,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_students
            .cmp(&a.total_students)
            .then_with(|| a.normalized_name.cmp(&b.normalized_name))
    });

    rows
}

/// Render rows as CSV with the report's column headers.
pub fn write_csv<W: Write>(writer: W, rows: &[ReportRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).context("Failed to write report row")?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv_file(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;
    write_csv(file, rows)
}
