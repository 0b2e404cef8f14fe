//! `ugsurvey status` - dry-run admission decision for a file

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color};
use ugsurvey_ingest::{AdmitOptions, Decision, Ingestor};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Extract file (CSV)
    pub file: PathBuf,

    /// Decide as if --replace were given
    #[arg(long)]
    pub replace: bool,

    /// Decide as if --force were given
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<ExitCode> {
    let store = super::open_store(config)?;
    let options = AdmitOptions {
        replace: args.replace,
        force: args.force,
    };
    let explanation = match Ingestor::new(&store, config.ingest_paths()).explain(&args.file, options)
    {
        Ok(explanation) => explanation,
        Err(e) => {
            log::error!("status [{}]: {e}", e.kind());
            return Ok(ExitCode::FAILURE);
        }
    };

    eprintln!("\n{}", args.file.display());
    eprintln!("  fingerprint: {}", explanation.fingerprint);

    if !explanation.prior.is_empty() {
        let mut table = super::table(&["Match", "Batch", "File", "Fingerprint", "Admitted"]);
        let matches = explanation
            .prior
            .by_fingerprint
            .iter()
            .map(|r| ("content", r))
            .chain(explanation.prior.by_filename.iter().map(|r| ("filename", r)));
        for (by, record) in matches {
            table.add_row(vec![
                Cell::new(by),
                Cell::new(record.batch_id),
                Cell::new(&record.filename),
                Cell::new(record.fingerprint.short()),
                Cell::new(&record.admitted_at),
            ]);
        }
        eprintln!("{table}");
    }

    let color = match explanation.decision {
        Decision::Admit | Decision::Replace { .. } | Decision::Force { .. } => Color::Green,
        Decision::Skip { .. } => Color::Yellow,
        Decision::Conflict { .. } => Color::Red,
    };
    let mut verdict = super::table(&["Decision"]);
    verdict.add_row(vec![Cell::new(explanation.decision.label()).fg(color)]);
    eprintln!("{verdict}");
    Ok(ExitCode::SUCCESS)
}
