//! `ugsurvey validate` - header and row checks without touching the database

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use ugsurvey_core::{SurveyType, detect_survey_type, infer_term_label, missing_critical};
use ugsurvey_ingest::parse_extract;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Extract file (CSV)
    pub file: PathBuf,
}

pub fn run(args: ValidateArgs) -> Result<ExitCode> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    let parsed = match parse_extract(&name, &bytes) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::error!("validate [{}]: {e}", e.kind());
            return Ok(ExitCode::FAILURE);
        }
    };

    let survey = detect_survey_type(&parsed.headers);
    eprintln!("{name}: {} columns, {} rows", parsed.headers.len(), parsed.rows.len());
    eprintln!("  survey type: {survey}");
    if let Some(label) = infer_term_label(&args.file) {
        eprintln!("  period: {label}");
    }

    let missing = missing_critical(&parsed.headers);
    if !missing.is_empty() {
        log::warn!("validate: {name} is missing critical columns: {}", missing.join(", "));
    }
    if survey != SurveyType::Ug {
        log::warn!("validate: {name} does not look like a UG extract ({survey})");
    }

    if missing.is_empty() {
        eprintln!("  ok");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
