//! `ugsurvey reference` - load and inspect reference tables

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};
use ugsurvey_store::{ReferenceKind, reference};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ReferenceArgs {
    #[command(subcommand)]
    pub action: ReferenceAction,
}

#[derive(Subcommand, Debug)]
pub enum ReferenceAction {
    /// Replace a reference table with the rows of a CSV file
    Load {
        /// company, country, state, legacy-institution or org-directory
        kind: ReferenceKind,
        /// CSV file with a header row
        csv: PathBuf,
    },
    /// Show row counts of the reference tables
    List,
}

pub fn run(args: ReferenceArgs, config: &Config) -> Result<ExitCode> {
    let store = super::open_store(config)?;
    match args.action {
        ReferenceAction::Load { kind, csv } => {
            let n = store.load_reference_csv(kind, &csv)?;
            eprintln!("Loaded {n} {kind} rows from {}", csv.display());
        }
        ReferenceAction::List => {
            let mut table = super::table(&["Kind", "Table", "Columns", "Rows"]);
            for kind in ReferenceKind::ALL {
                let n = store.with_conn(|c| reference::count(c, kind))?;
                table.add_row(vec![
                    kind.to_string(),
                    kind.table_name().to_string(),
                    kind.columns().join(", "),
                    n.to_string(),
                ]);
            }
            eprintln!("\n{table}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
