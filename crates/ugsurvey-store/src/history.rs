//! Ingestion history: admitted batches, fingerprint claims and the
//! append-only source-file log

use std::fmt;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use duckdb::{Connection, params};
use serde::Serialize;

use crate::hash::Fingerprint;

/// How a batch was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmitMode {
    Normal,
    Replace,
    Force,
}

impl AdmitMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Replace => "replace",
            Self::Force => "force",
        }
    }
}

impl fmt::Display for AdmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one attempt to ingest a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceOutcome {
    Admitted,
    SkippedDuplicate,
    Quarantined,
    RejectedConflict,
}

impl SourceOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::SkippedDuplicate => "skipped-duplicate",
            Self::Quarantined => "quarantined",
            Self::RejectedConflict => "rejected-conflict",
        }
    }
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One admitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionRecord {
    pub batch_id: i64,
    pub fingerprint: Fingerprint,
    pub filename: String,
    pub source_path: String,
    pub size_bytes: u64,
    pub row_count: u64,
    pub mode: String,
    pub admitted_at: String,
    pub superseded_by: Option<i64>,
}

impl IngestionRecord {
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }
}

/// Active records matching a file by content and by name.
///
/// The two lists are independent; a record may appear in both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorMatches {
    pub by_fingerprint: Vec<IngestionRecord>,
    pub by_filename: Vec<IngestionRecord>,
}

impl PriorMatches {
    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty() && self.by_filename.is_empty()
    }

    /// Distinct batch ids across both lists, ascending.
    pub fn batch_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .by_fingerprint
            .iter()
            .chain(&self.by_filename)
            .map(|r| r.batch_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Entry for the source-file log.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFileEntry {
    pub fingerprint: Fingerprint,
    pub filename: String,
    pub source_path: String,
    pub size_bytes: u64,
    pub row_count: Option<u64>,
    pub survey_type: Option<String>,
    pub term_label: Option<String>,
    pub outcome: SourceOutcome,
    pub batch_id: Option<i64>,
    pub detail: Option<String>,
    pub seen_at: String,
}

const RECORD_COLS: &str = "batch_id, fingerprint, filename, source_path, size_bytes, \
                           row_count, mode, admitted_at, superseded_by";

fn record_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<IngestionRecord> {
    Ok(IngestionRecord {
        batch_id: row.get(0)?,
        fingerprint: Fingerprint::from_hex(row.get::<_, String>(1)?),
        filename: row.get(2)?,
        source_path: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)? as u64,
        row_count: row.get::<_, i64>(5)? as u64,
        mode: row.get(6)?,
        admitted_at: row.get(7)?,
        superseded_by: row.get(8)?,
    })
}

fn active_where(conn: &Connection, column: &str, value: &str) -> Result<Vec<IngestionRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLS} FROM ingestion_record \
         WHERE {column} = ? AND superseded_by IS NULL ORDER BY batch_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![value], record_from_row)?
        .collect::<duckdb::Result<Vec<_>>>()
        .with_context(|| format!("failed to look up ingestion records by {column}"))?;
    Ok(rows)
}

/// Active records with the same content or the same file name.
pub fn find_prior(conn: &Connection, fingerprint: &Fingerprint, filename: &str) -> Result<PriorMatches> {
    Ok(PriorMatches {
        by_fingerprint: active_where(conn, "fingerprint", fingerprint.as_str())?,
        by_filename: active_where(conn, "filename", filename)?,
    })
}

/// Every batch, superseded or not, with the same content or file name.
pub fn matching_batches(
    conn: &Connection,
    fingerprint: &Fingerprint,
    filename: &str,
) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT batch_id FROM ingestion_record \
         WHERE fingerprint = ? OR filename = ? ORDER BY batch_id",
    )?;
    let ids = stmt
        .query_map(params![fingerprint.as_str(), filename], |r| r.get(0))?
        .collect::<duckdb::Result<Vec<i64>>>()
        .context("failed to look up matching batches")?;
    Ok(ids)
}

/// Draw the next batch id from the sequence.
pub fn next_batch_id(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT nextval('batch_id_seq')", [], |r| r.get(0))
        .context("failed to allocate batch id")
}

pub fn insert_record(conn: &Connection, record: &IngestionRecord) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO ingestion_record ({RECORD_COLS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"),
        params![
            record.batch_id,
            record.fingerprint.as_str(),
            record.filename,
            record.source_path,
            record.size_bytes as i64,
            record.row_count as i64,
            record.mode,
            record.admitted_at,
            record.superseded_by,
        ],
    )
    .with_context(|| format!("failed to record batch {}", record.batch_id))?;
    Ok(())
}

/// Mark prior batches as superseded by `by`.
pub fn supersede(conn: &Connection, batch_ids: &[i64], by: i64) -> Result<()> {
    for id in batch_ids {
        conn.execute(
            "UPDATE ingestion_record SET superseded_by = ? WHERE batch_id = ? AND superseded_by IS NULL",
            params![by, id],
        )
        .with_context(|| format!("failed to supersede batch {id}"))?;
    }
    Ok(())
}

/// Claim a fingerprint for `batch_id`.
///
/// Two transactions claiming the same fingerprint touch the same key, so
/// the later one fails at commit instead of double-admitting.
pub fn claim_fingerprint(conn: &Connection, fingerprint: &Fingerprint, batch_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO fingerprint_claim (fingerprint, batch_id) VALUES (?, ?) \
         ON CONFLICT (fingerprint) DO UPDATE SET batch_id = EXCLUDED.batch_id",
        params![fingerprint.as_str(), batch_id],
    )
    .with_context(|| format!("failed to claim fingerprint {}", fingerprint.short()))?;
    Ok(())
}

pub fn log_source_file(conn: &Connection, entry: &SourceFileEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO source_file (fingerprint, filename, source_path, size_bytes, row_count, \
         survey_type, term_label, outcome, batch_id, detail, seen_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            entry.fingerprint.as_str(),
            entry.filename,
            entry.source_path,
            entry.size_bytes as i64,
            entry.row_count.map(|n| n as i64),
            entry.survey_type,
            entry.term_label,
            entry.outcome.as_str(),
            entry.batch_id,
            entry.detail,
            entry.seen_at,
        ],
    )
    .with_context(|| format!("failed to log source file {}", entry.filename))?;
    Ok(())
}

/// Ingestion records, newest first.
pub fn list_records(conn: &Connection, include_superseded: bool) -> Result<Vec<IngestionRecord>> {
    let filter = if include_superseded {
        ""
    } else {
        "WHERE superseded_by IS NULL"
    };
    let sql = format!("SELECT {RECORD_COLS} FROM ingestion_record {filter} ORDER BY batch_id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], record_from_row)?
        .collect::<duckdb::Result<Vec<_>>>()
        .context("failed to list ingestion records")?;
    Ok(rows)
}

/// Source-file log entries as (filename, outcome, batch_id, detail, seen_at), newest first.
pub fn list_source_files(
    conn: &Connection,
) -> Result<Vec<(String, String, Option<i64>, Option<String>, String)>> {
    let mut stmt = conn.prepare(
        "SELECT filename, outcome, batch_id, detail, seen_at FROM source_file \
         ORDER BY seen_at DESC, filename",
    )?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)))?
        .collect::<duckdb::Result<Vec<_>>>()
        .context("failed to list source files")?;
    Ok(rows)
}

/// Active batches admitted on or before `as_of` (all active when `None`).
pub fn active_batches(conn: &Connection, as_of: Option<NaiveDate>) -> Result<Vec<i64>> {
    let cutoff = as_of.map(|d| d.format("%Y-%m-%d").to_string());
    let mut stmt = conn.prepare(
        "SELECT batch_id FROM ingestion_record \
         WHERE superseded_by IS NULL AND (?::VARCHAR IS NULL OR substr(admitted_at, 1, 10) <= ?) \
         ORDER BY batch_id",
    )?;
    let ids = stmt
        .query_map(params![cutoff, cutoff], |r| r.get(0))?
        .collect::<duckdb::Result<Vec<i64>>>()
        .context("failed to list active batches")?;
    Ok(ids)
}
