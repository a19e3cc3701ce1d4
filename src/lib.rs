// College Category Report - Core Library
// Exposes all modules for use in the CLI and tests

pub mod aggregate;
pub mod config;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod store;

// Re-export commonly used types
pub use aggregate::{Category, CollegeAggregate, CollegeSnapshot, CollegeStats};
pub use config::Config;
pub use normalize::{normalize_college_name, REPLACEMENTS};
pub use pipeline::{
    process_batch, run_enrichment, BatchOutcome, EnrichmentOutcome, RecordError, RunSummary,
    StudentLookup,
};
pub use report::{project, write_csv, write_csv_file, ReportRow};
pub use store::{
    CollegeUpdate, EducationRecord, ScoreDocument, ScoreRecord, ScoreStore, StudentProfile,
    StudentStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
