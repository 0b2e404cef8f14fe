//! `ugsurvey export` - output tables to Parquet

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output directory
    pub dir: PathBuf,
}

pub fn run(args: ExportArgs, config: &Config) -> Result<ExitCode> {
    let store = super::open_store(config)?;
    let written = store.export_parquet(&args.dir)?;
    eprintln!("Exported {} tables to {}", written.len(), args.dir.display());
    Ok(ExitCode::SUCCESS)
}
