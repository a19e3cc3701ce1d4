// 📥 CSV Ingestion
// Loads the consolidated score CSV into the score collection. Upstream of
// the enrichment run; the pipeline never depends on this module.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use csv::StringRecord;
use log::{info, warn};
use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::store::ScoreStore;

/// CSV columns whose cell text is itself a JSON payload. Decoded before
/// storage; a malformed payload is stored as null, never a fatal error.
const EMBEDDED_JSON_COLUMNS: &[&str] = &["scores", "metrics"];

/// Import a consolidated score CSV into the score collection.
///
/// The existing collection is dropped and recreated, documents are inserted
/// in chunks of the configured window size, and the indexes consumed
/// downstream are created at the end. Returns the number of documents
/// imported.
pub fn import_csv(conn: &Connection, config: &Config, csv_path: &Path) -> Result<usize> {
    info!("Reading CSV file: {}", csv_path.display());
    let reader = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;
    import_from_reader(conn, config, reader)
}

pub fn import_from_reader<R: Read>(
    conn: &Connection,
    config: &Config,
    mut reader: csv::Reader<R>,
) -> Result<usize> {
    let scores = ScoreStore::new(conn, &config.scores_collection)?;

    scores.reset()?;
    info!("Dropped existing collection {}", scores.collection());

    let headers = reader.headers().context("Failed to read CSV headers")?.clone();
    let imported_at = Utc::now().to_rfc3339();

    let mut chunk: Vec<(String, String)> = Vec::with_capacity(config.window_size);
    let mut total = 0usize;

    for result in reader.records() {
        let row = result.context("Failed to read CSV record")?;
        let document = row_to_document(&headers, &row, &imported_at);
        chunk.push((uuid::Uuid::new_v4().to_string(), document.to_string()));

        if chunk.len() >= config.window_size {
            total += scores.insert_batch(&chunk)?;
            info!("Inserted {} documents. Total: {}", chunk.len(), total);
            chunk.clear();
        }
    }

    if !chunk.is_empty() {
        total += scores.insert_batch(&chunk)?;
        info!("Inserted {} documents. Total: {}", chunk.len(), total);
    }

    scores.create_indexes()?;
    info!("Created indexes on student_id, category, and total_score");

    Ok(total)
}

/// Convert one CSV row into a JSON document. Every column becomes a string
/// field except the embedded JSON columns, which are decoded. The import
/// timestamp is stamped on each document for provenance.
fn row_to_document(headers: &StringRecord, row: &StringRecord, imported_at: &str) -> Value {
    let mut doc = Map::new();

    for (name, field) in headers.iter().zip(row.iter()) {
        let value = if EMBEDDED_JSON_COLUMNS.contains(&name) {
            decode_embedded_json(name, field)
        } else {
            Value::String(field.to_string())
        };
        doc.insert(name.to_string(), value);
    }

    doc.insert(
        "imported_at".to_string(),
        Value::String(imported_at.to_string()),
    );

    Value::Object(doc)
}

fn decode_embedded_json(column: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!("Malformed {column} payload, storing null: {err}");
            Value::Null
        }
    }
}
