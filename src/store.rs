// Document collections over SQLite
// One JSON document per row; collections are named by configuration

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::aggregate::Category;

/// A raw score document as fetched from the store: opaque identity plus the
/// JSON body. Field extraction happens later, inside the per-record recovery
/// boundary of the pipeline.
#[derive(Debug, Clone)]
pub struct ScoreDocument {
    pub id: String,
    pub body: String,
}

/// The fields of a score document the pipeline cares about, extracted
/// defensively from the JSON body.
#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub id: String,
    pub student_id: Option<String>,
    pub scores: Option<Value>,
}

impl ScoreRecord {
    /// Parse a score document. Fails only when the body is not valid JSON;
    /// missing or oddly-typed fields are treated as absent.
    pub fn parse(doc: &ScoreDocument) -> Result<ScoreRecord, serde_json::Error> {
        let value: Value = serde_json::from_str(&doc.body)?;

        let student_id = value.get("student_id").and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Ok(ScoreRecord {
            id: doc.id.clone(),
            student_id,
            scores: value.get("scores").cloned(),
        })
    }

    /// Category of this score, if the `scores` structure has the expected
    /// shape and carries a recognized value. Malformed upstream data is the
    /// "no category" case, never an error.
    pub fn category(&self) -> Option<Category> {
        self.scores
            .as_ref()?
            .as_object()?
            .get("category")?
            .as_str()
            .and_then(Category::parse)
    }
}

/// One education entry of a student profile.
#[derive(Debug, Clone, Default)]
pub struct EducationRecord {
    pub college_name: Option<String>,
    pub is_primary: bool,
}

impl EducationRecord {
    fn from_value(value: &Value) -> EducationRecord {
        EducationRecord {
            college_name: value
                .get("college_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            is_primary: value
                .get("is_primary")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }
    }
}

/// A student profile: the candidate's enrollment history.
#[derive(Debug, Clone, Default)]
pub struct StudentProfile {
    pub education_records: Vec<EducationRecord>,
}

impl StudentProfile {
    /// Parse a profile document. The top-level body must be valid JSON;
    /// everything below that is read leniently (a missing or non-array
    /// `education_records` becomes empty, malformed entries lose only their
    /// malformed fields).
    pub fn parse(body: &str) -> Result<StudentProfile> {
        let value: Value =
            serde_json::from_str(body).context("student document is not valid JSON")?;
        Ok(StudentProfile::from_value(&value))
    }

    pub fn from_value(value: &Value) -> StudentProfile {
        let education_records = value
            .get("education_records")
            .and_then(|v| v.as_array())
            .map(|entries| entries.iter().map(EducationRecord::from_value).collect())
            .unwrap_or_default();

        StudentProfile { education_records }
    }

    /// College name of the student's primary enrollment: the first entry in
    /// sequence order flagged primary. Deterministic when several entries
    /// carry the flag. `None` when no entry is flagged, or the flagged entry
    /// has no name.
    pub fn primary_college(&self) -> Option<&str> {
        self.education_records
            .iter()
            .find(|record| record.is_primary)
            .and_then(|record| record.college_name.as_deref())
    }
}

/// Instruction to set the `college` field on one score document.
/// A `None` college is persisted as JSON null (field present), which is
/// distinct from never having been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollegeUpdate {
    pub id: String,
    pub college: Option<String>,
}

/// Collection names come from configuration and end up inside SQL, so they
/// must be plain identifiers.
fn validate_collection_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        bail!("invalid collection name: {:?}", name);
    }
    Ok(())
}

fn ensure_collection(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {name} (
                id TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            )"
        ),
        [],
    )?;
    Ok(())
}

/// The score collection: paged reads, batched college updates, and the
/// chunked inserts used by CSV ingestion.
pub struct ScoreStore<'c> {
    conn: &'c Connection,
    collection: String,
}

impl<'c> ScoreStore<'c> {
    pub fn new(conn: &'c Connection, collection: &str) -> Result<Self> {
        validate_collection_name(collection)?;
        ensure_collection(conn, collection)?;
        Ok(ScoreStore {
            conn,
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Total number of documents in the collection.
    pub fn count(&self) -> Result<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.collection),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Fetch the next window of documents by ascending id, strictly after
    /// `after`. Cursor pagination over the immutable identity cannot skip or
    /// duplicate records the way offset pagination can.
    pub fn window_after(&self, after: Option<&str>, limit: usize) -> Result<Vec<ScoreDocument>> {
        let fetch = |sql: &str, params: &[&dyn rusqlite::ToSql]| -> Result<Vec<ScoreDocument>> {
            let mut stmt = self.conn.prepare(sql)?;
            let docs = stmt
                .query_map(params, |row| {
                    Ok(ScoreDocument {
                        id: row.get(0)?,
                        body: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(docs)
        };

        match after {
            Some(after) => fetch(
                &format!(
                    "SELECT id, doc FROM {} WHERE id > ?1 ORDER BY id LIMIT ?2",
                    self.collection
                ),
                &[&after, &(limit as i64)],
            ),
            None => fetch(
                &format!(
                    "SELECT id, doc FROM {} ORDER BY id LIMIT ?1",
                    self.collection
                ),
                &[&(limit as i64)],
            ),
        }
    }

    /// Apply a window's worth of college updates in a single transaction.
    ///
    /// Each instruction sets the `college` field of one document to a string
    /// or JSON null. Setting is idempotent, so a failed run can be retried
    /// from the start without harm. Errors are not recovered here; a failed
    /// bulk write aborts the run.
    pub fn apply_updates(&self, updates: &[CollegeUpdate]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut modified = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "UPDATE {} SET doc = json_set(doc, '$.college', ?1) WHERE id = ?2",
                self.collection
            ))?;
            for update in updates {
                modified += stmt.execute(params![update.college, update.id])?;
            }
        }
        tx.commit()?;

        Ok(modified)
    }

    /// Insert a chunk of (id, JSON body) documents in one transaction.
    pub fn insert_batch(&self, docs: &[(String, String)]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {} (id, doc) VALUES (?1, ?2)",
                self.collection
            ))?;
            for (id, doc) in docs {
                stmt.execute(params![id, doc])?;
            }
        }
        tx.commit()?;
        Ok(docs.len())
    }

    /// Drop the collection and recreate it empty.
    pub fn reset(&self) -> Result<()> {
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", self.collection), [])?;
        ensure_collection(self.conn, &self.collection)
    }

    /// Indexes used by downstream consumers of the collection.
    pub fn create_indexes(&self) -> Result<()> {
        let c = &self.collection;
        self.conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{c}_student_id
                 ON {c} (json_extract(doc, '$.student_id'))"
            ),
            [],
        )?;
        self.conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{c}_category
                 ON {c} (json_extract(doc, '$.scores.category'))"
            ),
            [],
        )?;
        self.conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{c}_total_score
                 ON {c} (json_extract(doc, '$.scores.total_score') DESC)"
            ),
            [],
        )?;
        Ok(())
    }
}

/// The student collection: single-record fetches by id.
pub struct StudentStore<'c> {
    conn: &'c Connection,
    collection: String,
}

impl<'c> StudentStore<'c> {
    pub fn new(conn: &'c Connection, collection: &str) -> Result<Self> {
        validate_collection_name(collection)?;
        ensure_collection(conn, collection)?;
        Ok(StudentStore {
            conn,
            collection: collection.to_string(),
        })
    }

    /// Fetch and parse one student profile. `Ok(None)` when no document
    /// exists under the id.
    pub fn find_by_id(&self, student_id: &str) -> Result<Option<StudentProfile>> {
        let body: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT doc FROM {} WHERE id = ?1", self.collection),
                params![student_id],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => {
                let profile = StudentProfile::parse(&body)
                    .with_context(|| format!("student document {student_id}"))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Insert a chunk of (id, JSON body) documents in one transaction.
    pub fn insert_batch(&self, docs: &[(String, String)]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {} (id, doc) VALUES (?1, ?2)",
                self.collection
            ))?;
            for (id, doc) in docs {
                stmt.execute(params![id, doc])?;
            }
        }
        tx.commit()?;
        Ok(docs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn seed_scores(store: &ScoreStore, count: usize) {
        let docs: Vec<(String, String)> = (0..count)
            .map(|i| {
                (
                    format!("{i:05}"),
                    json!({
                        "student_id": format!("s{i}"),
                        "scores": {"category": "C1", "total_score": 100 + i}
                    })
                    .to_string(),
                )
            })
            .collect();
        store.insert_batch(&docs).unwrap();
    }

    #[test]
    fn test_rejects_bad_collection_names() {
        let conn = test_conn();
        assert!(ScoreStore::new(&conn, "student_scores_temp").is_ok());
        assert!(ScoreStore::new(&conn, "scores; DROP TABLE x").is_err());
        assert!(ScoreStore::new(&conn, "1scores").is_err());
        assert!(ScoreStore::new(&conn, "").is_err());
    }

    #[test]
    fn test_window_pagination_visits_every_document_once() {
        let conn = test_conn();
        let store = ScoreStore::new(&conn, "scores").unwrap();
        seed_scores(&store, 25);

        assert_eq!(store.count().unwrap(), 25);

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        let mut window_sizes = Vec::new();
        loop {
            let window = store.window_after(cursor.as_deref(), 10).unwrap();
            if window.is_empty() {
                break;
            }
            window_sizes.push(window.len());
            cursor = window.last().map(|d| d.id.clone());
            seen.extend(window.into_iter().map(|d| d.id));
        }

        assert_eq!(window_sizes, vec![10, 10, 5]);
        assert_eq!(seen.len(), 25);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 25, "no document may be skipped or duplicated");
    }

    #[test]
    fn test_apply_updates_is_idempotent() {
        let conn = test_conn();
        let store = ScoreStore::new(&conn, "scores").unwrap();
        seed_scores(&store, 3);

        let updates = vec![
            CollegeUpdate {
                id: "00000".to_string(),
                college: Some("INDIAN INST OF TECH".to_string()),
            },
            CollegeUpdate {
                id: "00001".to_string(),
                college: None,
            },
        ];

        let first = store.apply_updates(&updates).unwrap();
        assert_eq!(first, 2);

        let snapshot = |conn: &Connection| -> Vec<(String, String)> {
            let mut stmt = conn.prepare("SELECT id, doc FROM scores ORDER BY id").unwrap();
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap()
        };

        let after_first = snapshot(&conn);
        store.apply_updates(&updates).unwrap();
        let after_second = snapshot(&conn);

        assert_eq!(after_first, after_second, "re-applying a batch must converge");
    }

    #[test]
    fn test_unresolved_college_is_stored_as_json_null() {
        let conn = test_conn();
        let store = ScoreStore::new(&conn, "scores").unwrap();
        seed_scores(&store, 2);

        store
            .apply_updates(&[CollegeUpdate {
                id: "00000".to_string(),
                college: None,
            }])
            .unwrap();

        let college_type: String = conn
            .query_row(
                "SELECT json_type(doc, '$.college') FROM scores WHERE id = '00000'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(college_type, "null", "the field must be present as JSON null");

        // The untouched document must not have the field at all
        let untouched: Option<String> = conn
            .query_row(
                "SELECT json_type(doc, '$.college') FROM scores WHERE id = '00001'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(untouched, None);
    }

    #[test]
    fn test_score_record_reads_fields_defensively() {
        let doc = ScoreDocument {
            id: "a".to_string(),
            body: json!({"student_id": "  s1  ", "scores": {"category": "C2"}}).to_string(),
        };
        let record = ScoreRecord::parse(&doc).unwrap();
        assert_eq!(record.student_id.as_deref(), Some("s1"));
        assert_eq!(record.category(), Some(Category::C2));

        // Numeric ids are stringified, empty ids are absent
        let doc = ScoreDocument {
            id: "b".to_string(),
            body: json!({"student_id": 42, "scores": {"category": "C9"}}).to_string(),
        };
        let record = ScoreRecord::parse(&doc).unwrap();
        assert_eq!(record.student_id.as_deref(), Some("42"));
        assert_eq!(record.category(), None, "unknown category values are dropped");

        let doc = ScoreDocument {
            id: "c".to_string(),
            body: json!({"student_id": "", "scores": "not an object"}).to_string(),
        };
        let record = ScoreRecord::parse(&doc).unwrap();
        assert_eq!(record.student_id, None);
        assert_eq!(record.category(), None, "malformed scores means no category");

        let doc = ScoreDocument {
            id: "d".to_string(),
            body: "not json at all".to_string(),
        };
        assert!(ScoreRecord::parse(&doc).is_err());
    }

    #[test]
    fn test_student_profile_parses_leniently() {
        let profile = StudentProfile::parse(
            &json!({
                "education_records": [
                    {"college_name": "Backup College"},
                    {"is_primary": true},
                    {"college_name": "Main College", "is_primary": true}
                ]
            })
            .to_string(),
        )
        .unwrap();

        // The first flagged entry wins even though it has no name
        assert_eq!(profile.primary_college(), None);

        let profile = StudentProfile::parse(
            &json!({
                "education_records": [
                    {"college_name": "Old College", "is_primary": false},
                    {"college_name": "Main College", "is_primary": true},
                    {"college_name": "Other College", "is_primary": true}
                ]
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(profile.primary_college(), Some("Main College"));

        // Missing or malformed education_records collapse to empty
        let profile = StudentProfile::parse("{}").unwrap();
        assert!(profile.education_records.is_empty());
        assert_eq!(profile.primary_college(), None);

        let profile =
            StudentProfile::parse(&json!({"education_records": "oops"}).to_string()).unwrap();
        assert!(profile.education_records.is_empty());
    }

    #[test]
    fn test_find_by_id_returns_none_for_missing_students() {
        let conn = test_conn();
        let students = StudentStore::new(&conn, "students").unwrap();

        assert!(students.find_by_id("ghost").unwrap().is_none());

        students
            .insert_batch(&[(
                "s1".to_string(),
                json!({
                    "education_records": [
                        {"college_name": "Main College", "is_primary": true}
                    ]
                })
                .to_string(),
            )])
            .unwrap();

        let profile = students.find_by_id("s1").unwrap().unwrap();
        assert_eq!(profile.primary_college(), Some("Main College"));
    }
}
