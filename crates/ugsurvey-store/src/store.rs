//! DuckDB-backed sink for staging, bookkeeping and normalized output
//!
//! Layout of one database:
//! ```text
//! source_file        every file seen, with its terminal outcome
//! ingestion_record   one per admitted batch, superseded_by set on override
//! fingerprint_claim  one row per admitted fingerprint
//! staged_row         raw rows, fields as JSON
//! ref_*              reference tables for the lookup resolver
//! ugs_*              normalized output
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use duckdb::{Connection, Transaction};
use ugsurvey_core::OutputTable;

use crate::schema;

/// Transactional sink. A single connection is shared behind a mutex, so
/// every write is serialized at the sink.
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the database file at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create db dir: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("store connection lock poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(schema::create_bookkeeping())
            .context("failed to create bookkeeping tables")?;
        conn.execute_batch(schema::create_reference())
            .context("failed to create reference tables")?;
        conn.execute_batch(schema::create_output())
            .context("failed to create output tables")?;
        Ok(())
    }

    /// Run `f` against the connection without an explicit transaction.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        let conn = self.lock()?;
        f(&*conn)
    }

    /// Run `f` inside one transaction: committed when `f` returns `Ok`,
    /// rolled back otherwise.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().context("failed to commit transaction")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    log::warn!("store: rollback failed: {rb}");
                }
                Err(e)
            }
        }
    }

    /// Row counts of the output tables.
    pub fn table_counts(&self) -> Result<Vec<(OutputTable, u64)>> {
        self.with_conn(table_counts)
    }

    /// Write every output table to `{dir}/{table}.parquet`.
    pub fn export_parquet(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create export dir: {}", dir.display()))?;
        let conn = self.lock()?;
        let mut written = Vec::new();
        for table in OutputTable::ALL
            .iter()
            .map(|t| t.table_name())
            .chain(std::iter::once("ugs_acadyear_label"))
        {
            let target = dir.join(format!("{table}.parquet"));
            let sql = format!(
                "COPY (SELECT * FROM {table} ORDER BY ALL) TO '{}' (FORMAT PARQUET)",
                sql_quote(&target.display().to_string())
            );
            conn.execute_batch(&sql)
                .with_context(|| format!("failed to export {table}"))?;
            log::info!("store: exported {table} -> {}", target.display());
            written.push(target);
        }
        Ok(written)
    }
}

/// Row counts of the output tables on an open connection.
pub fn table_counts(conn: &Connection) -> Result<Vec<(OutputTable, u64)>> {
    OutputTable::ALL
        .iter()
        .map(|&table| {
            let n: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
                .with_context(|| format!("failed to count {table}"))?;
            Ok((table, n as u64))
        })
        .collect()
}

/// Escape a string for use inside a single-quoted SQL literal.
pub(crate) fn sql_quote(s: &str) -> String {
    s.replace('\'', "''")
}

/// Current UTC time in the sink's timestamp format.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_has_empty_output() {
        let store = Store::open_in_memory().unwrap();
        let counts = store.table_counts().unwrap();
        assert_eq!(counts.len(), OutputTable::ALL.len());
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn open_file_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("ugsurvey.duckdb");
        {
            let store = Store::open(&path).unwrap();
            store
                .with_conn(|c| {
                    c.execute("INSERT INTO ref_country VALUES ('US', 'United States')", [])
                        .map_err(anyhow::Error::from)
                })
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        let n: i64 = store
            .with_conn(|c| {
                c.query_row("SELECT count(*) FROM ref_country", [], |r| r.get(0))
                    .map_err(anyhow::Error::from)
            })
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let store = Store::open_in_memory().unwrap();
        let result: Result<()> = store.transaction(|tx| {
            tx.execute("INSERT INTO ref_country VALUES ('CA', 'Canada')", [])?;
            anyhow::bail!("boom")
        });
        assert!(result.is_err());
        let n: i64 = store
            .with_conn(|c| {
                c.query_row("SELECT count(*) FROM ref_country", [], |r| r.get(0))
                    .map_err(anyhow::Error::from)
            })
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn export_writes_parquet_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let files = store.export_parquet(dir.path()).unwrap();
        assert_eq!(files.len(), OutputTable::ALL.len() + 1);
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn quote_escapes_apostrophes() {
        assert_eq!(sql_quote("o'brien"), "o''brien");
    }
}
