//! `ugsurvey normalize` - staged batches to output tables

use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use ugsurvey_pipeline::{NormalizeOptions, Scope, normalize};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Batch to normalize (repeatable; default: all active batches)
    #[arg(short, long = "batch")]
    pub batches: Vec<i64>,

    /// Only batches admitted on or before this date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "batches")]
    pub as_of: Option<NaiveDate>,

    /// Worker threads (overrides config)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

pub fn run(args: NormalizeArgs, config: &Config) -> Result<ExitCode> {
    let store = super::open_store(config)?;
    let scope = if args.batches.is_empty() {
        Scope::AllActive { as_of: args.as_of }
    } else {
        Scope::Batches(args.batches)
    };
    let opts = match args.workers {
        Some(workers) => NormalizeOptions {
            workers: workers.max(1),
        },
        None => config.normalize_options(),
    };

    let summary = match normalize(&store, &scope, &opts) {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("normalize [{}]: {e}", e.kind());
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut table = super::table(&["Table", "Emitted", "Total rows"]);
    for (name, total) in &summary.table_counts {
        let emitted = summary.emitted.get(name).copied().unwrap_or(0);
        table.add_row(vec![name.clone(), emitted.to_string(), total.to_string()]);
    }
    eprintln!(
        "\nNormalized {} staged rows ({} keys) from {} batch(es); {} academic year label(s) added",
        summary.staged_rows,
        summary.keys,
        summary.batches.len(),
        summary.labels_added
    );
    eprintln!("{table}");
    Ok(ExitCode::SUCCESS)
}
