//! ugsurvey - UG survey extract loader
//!
//! Admits survey extract files exactly once into a DuckDB staging store
//! and normalizes staged responses into the reporting tables.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "ugsurvey")]
#[command(about = "Load and normalize UG survey extracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Config file path (default: ./ugsurvey.toml or ~/.config/ugsurvey/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides config and UGSURVEY_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Admit one extract file into staging
    Load(cmd::load::LoadArgs),
    /// Ingest then normalize: one file, or every match in the incoming dir
    Run(cmd::run::RunArgs),
    /// Normalize staged batches into the output tables
    Normalize(cmd::normalize::NormalizeArgs),
    /// Show what loading a file would do, without loading it
    Status(cmd::status::StatusArgs),
    /// List ingestion history
    History(cmd::history::HistoryArgs),
    /// Manage reference tables
    Reference(cmd::reference::ReferenceArgs),
    /// Check a file's header for the critical columns
    Validate(cmd::validate::ValidateArgs),
    /// Export the output tables to Parquet
    Export(cmd::export::ExportArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    let config = config.with_overrides(cli.db.clone());

    ugsurvey_core::init_logging(cli.quiet, cli.debug, config.logging.dir.as_deref())?;
    log::debug!("database: {}", config.database.path.display());

    match cli.command {
        Command::Load(args) => cmd::load::run(args, &config),
        Command::Run(args) => cmd::run::run(args, &config),
        Command::Normalize(args) => cmd::normalize::run(args, &config),
        Command::Status(args) => cmd::status::run(args, &config),
        Command::History(args) => cmd::history::run(args, &config),
        Command::Reference(args) => cmd::reference::run(args, &config),
        Command::Validate(args) => cmd::validate::run(args),
        Command::Export(args) => cmd::export::run(args, &config),
        Command::Config => {
            let mut table = cmd::table(&["Setting", "Value"]);

            let path = |p: &Option<PathBuf>| {
                p.as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "not set".to_string())
            };
            table.add_row(vec![
                "Database".to_string(),
                config.database.path.display().to_string(),
            ]);
            table.add_row(vec![
                "Incoming directory".to_string(),
                config.paths.incoming_dir.display().to_string(),
            ]);
            table.add_row(vec!["File pattern".to_string(), config.paths.pattern.clone()]);
            table.add_row(vec!["Archive directory".to_string(), path(&config.paths.archive_dir)]);
            table.add_row(vec![
                "Quarantine directory".to_string(),
                path(&config.paths.quarantine_dir),
            ]);
            table.add_row(vec![
                "Workers".to_string(),
                config.normalize_options().workers.to_string(),
            ]);
            table.add_row(vec!["Log directory".to_string(), path(&config.logging.dir)]);
            table.add_row(vec!["Summary directory".to_string(), path(&config.notify.summary_dir)]);
            let email = &config.notify.email;
            table.add_row(vec![
                "Email summary".to_string(),
                if email.enabled {
                    format!(
                        "{}:{} -> {}",
                        email.smtp_host,
                        email.smtp_port,
                        email.to.join(", ")
                    )
                } else {
                    "off".to_string()
                },
            ]);

            eprintln!("\n{table}");
            Ok(ExitCode::SUCCESS)
        }
    }
}
