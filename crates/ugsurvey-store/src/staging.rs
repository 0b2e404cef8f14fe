//! Staged rows: write once per batch, read back per normalization scope

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use duckdb::{Connection, params};
use ugsurvey_core::{StagedRow, Term};

/// Insert every row of a batch. Field maps are stored as JSON text.
pub fn insert_rows(conn: &Connection, rows: &[StagedRow]) -> Result<usize> {
    let mut stmt = conn
        .prepare("INSERT INTO staged_row (batch_id, row_num, stud_id, term, fields) VALUES (?, ?, ?, ?, ?)")
        .context("failed to prepare staged_row insert")?;
    for row in rows {
        let fields = serde_json::to_string(&row.fields)
            .with_context(|| format!("failed to encode row {}", row.row_num))?;
        stmt.execute(params![
            row.batch_id,
            row.row_num,
            row.stud_id,
            row.term.as_str(),
            fields
        ])
        .with_context(|| format!("failed to stage row {} of batch {}", row.row_num, row.batch_id))?;
    }
    Ok(rows.len())
}

/// Delete the staged rows of the given batches. Returns rows removed.
pub fn delete_batches(conn: &Connection, batch_ids: &[i64]) -> Result<usize> {
    let mut removed = 0;
    for id in batch_ids {
        removed += conn
            .execute("DELETE FROM staged_row WHERE batch_id = ?", params![id])
            .with_context(|| format!("failed to delete staged rows of batch {id}"))?;
    }
    Ok(removed)
}

pub fn count_rows(conn: &Connection, batch_id: i64) -> Result<u64> {
    let n: i64 = conn
        .query_row(
            "SELECT count(*) FROM staged_row WHERE batch_id = ?",
            params![batch_id],
            |r| r.get(0),
        )
        .with_context(|| format!("failed to count staged rows of batch {batch_id}"))?;
    Ok(n as u64)
}

/// Latest staged row per (stud_id, term) whose batch is in `batch_ids`.
///
/// "Latest" is decided across all staged batches, so a key that also
/// exists in a newer batch outside the scope is left out entirely.
pub fn load_latest(conn: &Connection, batch_ids: &[i64]) -> Result<Vec<StagedRow>> {
    if batch_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids = batch_ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT batch_id, row_num, stud_id, term, fields FROM (
             SELECT * FROM staged_row
             QUALIFY ROW_NUMBER() OVER (
                 PARTITION BY stud_id, term ORDER BY batch_id DESC, row_num DESC
             ) = 1
         ) WHERE batch_id IN ({ids})
         ORDER BY batch_id, row_num"
    );
    let mut stmt = conn.prepare(&sql).context("failed to prepare staged row query")?;
    let raw = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })?
        .collect::<duckdb::Result<Vec<_>>>()
        .context("failed to read staged rows")?;

    raw.into_iter()
        .map(|(batch_id, row_num, stud_id, term, fields)| {
            let fields: BTreeMap<String, String> = serde_json::from_str(&fields)
                .with_context(|| format!("corrupt fields in batch {batch_id} row {row_num}"))?;
            Ok(StagedRow {
                batch_id,
                row_num,
                stud_id,
                term: Term::new(&term),
                fields,
            })
        })
        .collect()
}
