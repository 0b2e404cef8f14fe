//! `ugsurvey load` - admit one extract file

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use ugsurvey_ingest::{AdmitOptions, IngestStatus, Ingestor};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Extract file (CSV)
    pub file: PathBuf,

    /// Delete staged rows of earlier loads of this file or content first
    #[arg(long)]
    pub replace: bool,

    /// Load even if already loaded, keeping earlier staged rows
    #[arg(long)]
    pub force: bool,

    /// Print the outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: LoadArgs, config: &Config) -> Result<ExitCode> {
    let store = super::open_store(config)?;
    let options = AdmitOptions {
        replace: args.replace,
        force: args.force,
    };

    let outcome = match Ingestor::new(&store, config.ingest_paths()).admit(&args.file, options) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("load [{}]: {e}", e.kind());
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(ExitCode::SUCCESS);
    }

    match outcome.status {
        IngestStatus::SkippedDuplicate => eprintln!(
            "{}: already loaded as batch {} ({}), nothing to do",
            outcome.filename,
            outcome.batch_id,
            outcome.fingerprint.short()
        ),
        status => {
            eprintln!(
                "{}: batch {} {:?}, {} rows staged",
                outcome.filename, outcome.batch_id, status, outcome.rows_staged
            );
            if !outcome.superseded.is_empty() {
                eprintln!(
                    "  superseded batch(es) {:?}, {} staged rows removed",
                    outcome.superseded, outcome.rows_removed
                );
            }
        }
    }
    if let Some(to) = &outcome.moved_to {
        eprintln!("  moved to {}", to.display());
    }
    Ok(ExitCode::SUCCESS)
}
