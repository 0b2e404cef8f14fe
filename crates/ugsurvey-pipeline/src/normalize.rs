//! Normalization run: staged rows in scope to the output tables

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use ugsurvey_core::{AcadYearLabel, EtlError, NormalizedOutputRow, RowKey, Term};
use ugsurvey_store::store::table_counts;
use ugsurvey_store::{Store, history, now_timestamp, output, staging};

use crate::fanout::fan_out;
use crate::resolve::Resolver;

/// Which staged batches a run covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// Exactly these batches.
    Batches(Vec<i64>),
    /// Every active batch admitted on or before `as_of`.
    AllActive { as_of: Option<NaiveDate> },
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Fan-out worker threads.
    pub workers: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Outcome of one normalization run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeSummary {
    pub batches: Vec<i64>,
    pub staged_rows: usize,
    pub keys: usize,
    pub rows_deleted: usize,
    pub orphans_deleted: usize,
    pub rows_inserted: usize,
    pub labels_added: usize,
    /// Rows emitted this run, per output table.
    pub emitted: BTreeMap<String, usize>,
    /// Row counts of the output tables after the write.
    pub table_counts: BTreeMap<String, u64>,
}

/// Normalize every staged row in `scope`.
///
/// Output for the keys in scope is replaced, never appended, so a re-run
/// leaves the same rows. The write is one transaction: on any failure the
/// output tables are left as they were.
pub fn normalize(
    store: &Store,
    scope: &Scope,
    opts: &NormalizeOptions,
) -> Result<NormalizeSummary, EtlError> {
    let start = Instant::now();
    let batches = match scope {
        Scope::Batches(ids) => ids.clone(),
        Scope::AllActive { as_of } => store.with_conn(|c| history::active_batches(c, *as_of))?,
    };
    log::info!("normalize: {} batch(es) in scope {:?}", batches.len(), batches);

    let rows = store.with_conn(|c| staging::load_latest(c, &batches))?;
    let resolver = Resolver::new(&store.reference_data()?);
    log::info!("normalize: {} staged rows, {} workers", rows.len(), opts.workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.workers.max(1))
        .build()
        .map_err(|e| EtlError::Normalization(format!("failed to create thread pool: {e}")))?;
    let emitted: Vec<NormalizedOutputRow> = pool.install(|| {
        rows.par_iter()
            .flat_map_iter(|row| fan_out(row, &resolver))
            .collect()
    });

    let keys: BTreeSet<RowKey> = rows
        .iter()
        .map(|r| RowKey {
            stud_id: r.stud_id.clone(),
            term: r.term.clone(),
        })
        .collect();
    let terms: BTreeSet<&Term> = rows.iter().map(|r| &r.term).collect();
    let labels: Vec<AcadYearLabel> = terms
        .into_iter()
        .filter_map(AcadYearLabel::from_term)
        .collect();

    let load_date = now_timestamp();
    let (written, labels_added, counts) = store
        .transaction(|tx| -> anyhow::Result<_> {
            let written = output::replace_output(tx, &keys, &emitted, &load_date)?;
            let added = output::insert_new_acadyear_labels(tx, &labels)?;
            let counts = table_counts(tx)?;
            Ok((written, added, counts))
        })
        .map_err(|e| EtlError::Normalization(format!("{e:#}")))?;

    let mut per_table = BTreeMap::new();
    for row in &emitted {
        *per_table.entry(row.table().to_string()).or_insert(0) += 1;
    }
    let summary = NormalizeSummary {
        batches,
        staged_rows: rows.len(),
        keys: keys.len(),
        rows_deleted: written.deleted,
        orphans_deleted: written.orphans_deleted,
        rows_inserted: written.inserted,
        labels_added,
        emitted: per_table,
        table_counts: counts
            .into_iter()
            .map(|(table, n)| (table.to_string(), n))
            .collect(),
    };

    log::info!(
        "normalize: {} keys, {} rows replaced, {} orphans dropped, {} inserted in {:.1}s",
        summary.keys,
        summary.rows_deleted,
        summary.orphans_deleted,
        summary.rows_inserted,
        start.elapsed().as_secs_f64()
    );
    for (table, n) in &summary.table_counts {
        log::info!("normalize: {table} now has {n} rows");
    }
    Ok(summary)
}
