//! `ugsurvey run` - ingest then normalize in one coordinated run

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use ugsurvey_ingest::AdmitOptions;
use ugsurvey_pipeline::{Coordinator, EmailNotifier, LogNotifier, RunMode, SummaryFileNotifier};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run for this file only (default: every match in the incoming dir)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// With --file: delete staged rows of earlier loads first
    #[arg(long, requires = "file")]
    pub replace: bool,

    /// With --file: load even if already loaded
    #[arg(long, requires = "file")]
    pub force: bool,

    /// Periodic run: normalize batches admitted on or before this date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "file")]
    pub as_of: Option<NaiveDate>,

    /// Incoming directory (overrides config)
    #[arg(long, conflicts_with = "file")]
    pub incoming: Option<PathBuf>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: RunArgs, config: &Config) -> Result<ExitCode> {
    let store = super::open_store(config)?;

    let mode = match args.file {
        Some(path) => RunMode::SingleFile {
            path,
            options: AdmitOptions {
                replace: args.replace,
                force: args.force,
            },
        },
        None => RunMode::Periodic {
            incoming_dir: args
                .incoming
                .unwrap_or_else(|| config.paths.incoming_dir.clone()),
            pattern: config.paths.pattern.clone(),
            as_of: args.as_of,
        },
    };

    let mut coordinator =
        Coordinator::new(&store, config.ingest_paths(), config.normalize_options())
            .with_notifier(Box::new(LogNotifier));
    if let Some(dir) = &config.notify.summary_dir {
        coordinator = coordinator.with_notifier(Box::new(SummaryFileNotifier::new(dir)));
    }
    if let Some(email) = config.email_settings() {
        coordinator = coordinator.with_notifier(Box::new(EmailNotifier::new(email)));
    }

    let report = coordinator.run(&mode);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !report.files.is_empty() {
        let mut table = super::table(&["File", "Status", "Batch", "Rows", "Error"]);
        for file in &report.files {
            table.add_row(vec![
                file.file.clone(),
                file.status.clone(),
                file.batch_id.map(|b| b.to_string()).unwrap_or_default(),
                file.rows.to_string(),
                file.error.clone().unwrap_or_default(),
            ]);
        }
        eprintln!("\n{table}");
    }

    Ok(ExitCode::from(report.exit_code()))
}
