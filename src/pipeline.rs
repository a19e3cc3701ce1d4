// Enrichment Pipeline
// Joins score documents to student profiles, resolves and normalizes the
// primary college, feeds the accumulator, and emits persistence instructions

use anyhow::{Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use thiserror::Error;

use crate::aggregate::CollegeStats;
use crate::config::Config;
use crate::normalize::normalize_college_name;
use crate::store::{
    CollegeUpdate, ScoreDocument, ScoreRecord, ScoreStore, StudentProfile, StudentStore,
};

/// Single-record fetch of a student profile by id.
///
/// The pipeline only ever needs point lookups, so tests can stand in a map
/// where production uses the student collection.
pub trait StudentLookup {
    fn find_student(&self, student_id: &str) -> Result<Option<StudentProfile>>;
}

impl StudentLookup for StudentStore<'_> {
    fn find_student(&self, student_id: &str) -> Result<Option<StudentProfile>> {
        self.find_by_id(student_id)
    }
}

/// Unexpected per-record failure. Expected missing data (no `student_id`)
/// is not an error; it is the skip path of [`process_batch`].
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("score document is not valid JSON: {0}")]
    MalformedDocument(#[from] serde_json::Error),

    #[error("student lookup failed: {0:#}")]
    StudentLookup(#[source] anyhow::Error),
}

/// Outcome of processing one window of score documents.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Persistence instructions, one per record with a resolvable
    /// `student_id` that processed cleanly.
    pub updates: Vec<CollegeUpdate>,
    /// Records skipped because `student_id` was absent.
    pub missing_student_id: usize,
    /// Records skipped because of an unexpected failure, with the record id.
    pub failures: Vec<(String, RecordError)>,
}

/// Process one window of score documents.
///
/// Each record's outcome depends only on its own fields and its owning
/// profile, so processing is deterministic and order-independent. Failures
/// are confined to the record that caused them; the rest of the window is
/// always processed.
pub fn process_batch(
    batch: &[ScoreDocument],
    students: &dyn StudentLookup,
    stats: &mut CollegeStats,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for doc in batch {
        match process_record(doc, students, stats) {
            Ok(Some(update)) => outcome.updates.push(update),
            Ok(None) => outcome.missing_student_id += 1,
            Err(err) => {
                error!("Error processing document {}: {err}", doc.id);
                outcome.failures.push((doc.id.clone(), err));
            }
        }
    }

    outcome
}

/// Process a single score document.
///
/// `Ok(None)` is the deliberate skip for a missing `student_id`: no
/// instruction, no aggregation, only a warning. In every other non-error
/// case an instruction is emitted, with the college resolved to the
/// canonical name or null.
fn process_record(
    doc: &ScoreDocument,
    students: &dyn StudentLookup,
    stats: &mut CollegeStats,
) -> Result<Option<CollegeUpdate>, RecordError> {
    let record = ScoreRecord::parse(doc)?;

    let Some(student_id) = record.student_id.as_deref() else {
        warn!("No student_id found for score document {}", doc.id);
        return Ok(None);
    };

    let profile = students
        .find_student(student_id)
        .map_err(RecordError::StudentLookup)?;

    let college = profile.as_ref().and_then(|p| p.primary_college());
    let canonical = normalize_college_name(college);

    if let Some(college) = college {
        stats.record(canonical.as_deref(), college, record.category());
    }

    Ok(Some(CollegeUpdate {
        id: doc.id.clone(),
        college: canonical,
    }))
}

/// Totals reported at the end of a run.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub total_documents: i64,
    pub windows: usize,
    pub documents_updated: usize,
    pub missing_student_id: usize,
    pub failed_records: usize,
    pub unique_colleges: usize,
}

/// Result of a full enrichment run: the summary plus the accumulator,
/// ready to be projected into the report.
#[derive(Debug)]
pub struct EnrichmentOutcome {
    pub stats: CollegeStats,
    pub summary: RunSummary,
}

/// Run the full enrichment pass over the score collection.
///
/// The collection is counted once, then consumed in windows of
/// `config.window_size` documents fetched by ascending id. Each window is
/// fully processed and persisted (one bulk write) before the next fetch.
/// A failed bulk write aborts the run; windows already persisted stay
/// persisted, and re-running from the start converges to the same state.
pub fn run_enrichment(conn: &Connection, config: &Config) -> Result<EnrichmentOutcome> {
    let scores = ScoreStore::new(conn, &config.scores_collection)?;
    let students = StudentStore::new(conn, &config.students_collection)?;

    let total_documents = scores.count()?;
    info!("Total documents to process: {total_documents}");

    let mut stats = CollegeStats::new();
    let mut summary = RunSummary {
        total_documents,
        ..RunSummary::default()
    };

    let mut cursor: Option<String> = None;
    loop {
        let window = scores.window_after(cursor.as_deref(), config.window_size)?;
        if window.is_empty() {
            break;
        }

        summary.windows += 1;
        info!(
            "Processing window {} ({} documents)",
            summary.windows,
            window.len()
        );

        let outcome = process_batch(&window, &students, &mut stats);
        summary.missing_student_id += outcome.missing_student_id;
        summary.failed_records += outcome.failures.len();

        if !outcome.updates.is_empty() {
            let modified = scores
                .apply_updates(&outcome.updates)
                .with_context(|| format!("bulk update failed in window {}", summary.windows))?;
            info!("Window update complete. Modified {modified} documents");
            summary.documents_updated += modified;
        }

        cursor = window.last().map(|doc| doc.id.clone());
    }

    summary.unique_colleges = stats.len();

    info!(
        "Total unique colleges after normalization: {}",
        summary.unique_colleges
    );
    info!("Update completed:");
    info!("Total documents updated: {}", summary.documents_updated);
    info!(
        "Total records skipped (no student_id): {}",
        summary.missing_student_id
    );
    info!("Total errors encountered: {}", summary.failed_records);

    Ok(EnrichmentOutcome { stats, summary })
}
