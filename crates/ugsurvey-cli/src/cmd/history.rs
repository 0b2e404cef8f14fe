//! `ugsurvey history` - ingestion records and the source-file log

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color};
use ugsurvey_store::history;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Include superseded batches
    #[arg(short, long)]
    pub all: bool,

    /// Show every file seen, including skipped and rejected ones
    #[arg(long)]
    pub files: bool,
}

pub fn run(args: HistoryArgs, config: &Config) -> Result<ExitCode> {
    let store = super::open_store(config)?;
    if args.files {
        files(&store)
    } else {
        batches(&store, args.all)
    }
}

fn batches(store: &ugsurvey_store::Store, all: bool) -> Result<ExitCode> {
    let records = store.with_conn(|c| history::list_records(c, all))?;
    if records.is_empty() {
        eprintln!("No batches loaded.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut table = super::table(&[
        "Batch",
        "File",
        "Fingerprint",
        "Rows",
        "Mode",
        "Admitted",
        "State",
    ]);
    for record in &records {
        let state = match record.superseded_by {
            None => Cell::new("active").fg(Color::Green),
            Some(by) => Cell::new(format!("superseded by {by}")).fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(record.batch_id),
            Cell::new(&record.filename),
            Cell::new(record.fingerprint.short()),
            Cell::new(record.row_count),
            Cell::new(&record.mode),
            Cell::new(&record.admitted_at),
            state,
        ]);
    }
    eprintln!("\n{table}");
    Ok(ExitCode::SUCCESS)
}

fn files(store: &ugsurvey_store::Store) -> Result<ExitCode> {
    let entries = store.with_conn(history::list_source_files)?;
    if entries.is_empty() {
        eprintln!("No files seen.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut table = super::table(&["Seen", "File", "Outcome", "Batch", "Detail"]);
    for (filename, outcome, batch_id, detail, seen_at) in &entries {
        let color = match outcome.as_str() {
            "admitted" => Color::Green,
            "skipped-duplicate" => Color::Yellow,
            _ => Color::Red,
        };
        table.add_row(vec![
            Cell::new(seen_at),
            Cell::new(filename),
            Cell::new(outcome).fg(color),
            Cell::new(batch_id.map(|b| b.to_string()).unwrap_or_default()),
            Cell::new(detail.as_deref().unwrap_or("")),
        ]);
    }
    eprintln!("\n{table}");
    Ok(ExitCode::SUCCESS)
}
