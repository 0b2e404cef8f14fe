//! Exactly-once admission of source files into the staging store

use std::path::{Path, PathBuf};

use serde::Serialize;
use ugsurvey_core::columns::missing_critical;
use ugsurvey_core::{EtlError, SurveyType, detect_survey_type, infer_term_label};
use ugsurvey_store::history::{self, SourceFileEntry};
use ugsurvey_store::{
    AdmitMode, Fingerprint, IngestionRecord, PriorMatches, SourceOutcome, Store, now_timestamp,
    staging,
};

use crate::archive;
use crate::decision::{AdmitOptions, Decision, decide};
use crate::parse::parse_extract;

/// Where handled files go. `None` leaves them in place.
#[derive(Debug, Clone, Default)]
pub struct IngestPaths {
    pub archive_dir: Option<PathBuf>,
    pub quarantine_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IngestStatus {
    Admitted,
    Replaced,
    Forced,
    SkippedDuplicate,
}

/// Result of a successful `admit`: the file was admitted or recognized as
/// already admitted.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    pub filename: String,
    pub fingerprint: Fingerprint,
    pub status: IngestStatus,
    /// New batch, or the existing batch for a skipped duplicate.
    pub batch_id: i64,
    pub rows_staged: u64,
    /// Batches whose bookkeeping this admission superseded.
    pub superseded: Vec<i64>,
    /// Staged rows deleted by `replace`.
    pub rows_removed: usize,
    pub moved_to: Option<PathBuf>,
}

impl IngestionOutcome {
    /// Whether this admission produced a new batch.
    pub fn is_new_batch(&self) -> bool {
        self.status != IngestStatus::SkippedDuplicate
    }
}

/// What `admit` would do, without doing it.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub fingerprint: Fingerprint,
    pub prior: PriorMatches,
    pub decision: Decision,
}

enum Admission {
    New {
        status: IngestStatus,
        batch_id: i64,
        rows: u64,
        superseded: Vec<i64>,
        removed: usize,
    },
    Duplicate(i64),
    Conflict(i64),
}

/// Raw ingestor.
///
/// Lookup, decision and insert run inside one [`Store::transaction`], which
/// holds the sink's connection lock for its whole duration. Two admissions
/// of the same file therefore serialize, and the second sees the first as
/// a duplicate. The fingerprint claim backs this up across processes.
pub struct Ingestor<'a> {
    store: &'a Store,
    paths: IngestPaths,
}

/// Facts read from the file before any decision is taken.
struct SourceFacts {
    filename: String,
    source_path: String,
    size_bytes: u64,
    fingerprint: Fingerprint,
}

impl SourceFacts {
    /// Facts for a file whose bytes could not be read. The fingerprint is empty.
    fn unread(path: &Path) -> Self {
        Self {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            source_path: path.display().to_string(),
            size_bytes: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            fingerprint: Fingerprint::from_hex(String::new()),
        }
    }
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a Store, paths: IngestPaths) -> Self {
        Self { store, paths }
    }

    fn read(&self, path: &Path) -> Result<(SourceFacts, Vec<u8>), EtlError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| EtlError::malformed(path.display().to_string(), "no file name"))?
            .to_string();
        let bytes = std::fs::read(path).map_err(|e| {
            EtlError::malformed(filename.clone(), format!("unreadable: {e}"))
        })?;
        let facts = SourceFacts {
            fingerprint: Fingerprint::of_bytes(&bytes),
            source_path: path.display().to_string(),
            size_bytes: bytes.len() as u64,
            filename,
        };
        Ok((facts, bytes))
    }

    /// Decide what `admit` would do with `path`. Nothing is written.
    pub fn explain(&self, path: &Path, opts: AdmitOptions) -> Result<Explanation, EtlError> {
        let (facts, _) = self.read(path)?;
        let prior = self
            .store
            .with_conn(|c| history::find_prior(c, &facts.fingerprint, &facts.filename))?;
        let decision = decide(&prior, &facts.fingerprint, opts);
        Ok(Explanation {
            fingerprint: facts.fingerprint,
            prior,
            decision,
        })
    }

    /// Admit one source file.
    ///
    /// Malformed files are quarantined and nothing is staged. A conflicting
    /// reload is refused and the file stays where it is.
    pub fn admit(&self, path: &Path, opts: AdmitOptions) -> Result<IngestionOutcome, EtlError> {
        let (facts, bytes) = match self.read(path) {
            Ok(read) => read,
            Err(e) => {
                log::error!("ingest: {e}");
                self.log_outcome(
                    &SourceFacts::unread(path),
                    None,
                    SourceOutcome::Quarantined,
                    None,
                    Some(e.to_string()),
                );
                self.move_file(path, self.paths.quarantine_dir.as_deref(), "quarantine");
                return Err(e);
            }
        };
        log::info!(
            "ingest: {} ({} bytes, {})",
            facts.filename,
            facts.size_bytes,
            facts.fingerprint.short()
        );

        let parsed = match parse_extract(&facts.filename, &bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::error!("ingest: {e}");
                self.log_outcome(&facts, None, SourceOutcome::Quarantined, None, Some(e.to_string()));
                self.move_file(path, self.paths.quarantine_dir.as_deref(), "quarantine");
                return Err(e);
            }
        };
        let survey_type = detect_survey_type(&parsed.headers);
        let term_label = infer_term_label(path);
        if survey_type != SurveyType::Ug {
            log::warn!("ingest: {} looks like a {survey_type} extract", facts.filename);
        }
        let missing = missing_critical(&parsed.headers);
        if !missing.is_empty() {
            log::warn!(
                "ingest: {} lacks {} expected column(s): {}",
                facts.filename,
                missing.len(),
                missing.join(", ")
            );
        }

        let row_count = parsed.rows.len() as u64;
        let admission = self.store.transaction(|tx| -> Result<Admission, EtlError> {
            let prior = history::find_prior(tx, &facts.fingerprint, &facts.filename)?;
            let decision = decide(&prior, &facts.fingerprint, opts);
            let entry = |outcome, batch_id| SourceFileEntry {
                fingerprint: facts.fingerprint.clone(),
                filename: facts.filename.clone(),
                source_path: facts.source_path.clone(),
                size_bytes: facts.size_bytes,
                row_count: Some(row_count),
                survey_type: Some(survey_type.to_string()),
                term_label: term_label.clone(),
                outcome,
                batch_id,
                detail: Some(decision.label().to_string()),
                seen_at: now_timestamp(),
            };

            let (mode, status, priors) = match &decision {
                Decision::Skip { batch_id } => {
                    history::log_source_file(
                        tx,
                        &entry(SourceOutcome::SkippedDuplicate, Some(*batch_id)),
                    )?;
                    return Ok(Admission::Duplicate(*batch_id));
                }
                Decision::Conflict { batch_id } => return Ok(Admission::Conflict(*batch_id)),
                Decision::Admit => (AdmitMode::Normal, IngestStatus::Admitted, Vec::new()),
                Decision::Replace { priors } => {
                    (AdmitMode::Replace, IngestStatus::Replaced, priors.clone())
                }
                Decision::Force { priors } => {
                    (AdmitMode::Force, IngestStatus::Forced, priors.clone())
                }
            };

            let batch_id = history::next_batch_id(tx)?;
            history::supersede(tx, &priors, batch_id)?;
            let removed = if mode == AdmitMode::Replace {
                let stale = history::matching_batches(tx, &facts.fingerprint, &facts.filename)?;
                staging::delete_batches(tx, &stale)?
            } else {
                0
            };
            history::insert_record(
                tx,
                &IngestionRecord {
                    batch_id,
                    fingerprint: facts.fingerprint.clone(),
                    filename: facts.filename.clone(),
                    source_path: facts.source_path.clone(),
                    size_bytes: facts.size_bytes,
                    row_count,
                    mode: mode.as_str().to_string(),
                    admitted_at: now_timestamp(),
                    superseded_by: None,
                },
            )?;
            history::claim_fingerprint(tx, &facts.fingerprint, batch_id)?;
            let rows: Vec<_> = parsed
                .rows
                .into_iter()
                .map(|r| r.into_staged(batch_id))
                .collect();
            staging::insert_rows(tx, &rows)?;
            history::log_source_file(tx, &entry(SourceOutcome::Admitted, Some(batch_id)))?;

            Ok(Admission::New {
                status,
                batch_id,
                rows: row_count,
                superseded: priors,
                removed,
            })
        })?;

        match admission {
            Admission::Conflict(batch_id) => {
                let err = EtlError::ConflictingReload {
                    filename: facts.filename.clone(),
                    batch_id,
                };
                log::error!("ingest: {err}");
                self.log_outcome(
                    &facts,
                    Some(row_count),
                    SourceOutcome::RejectedConflict,
                    Some(batch_id),
                    Some(err.to_string()),
                );
                Err(err)
            }
            Admission::Duplicate(batch_id) => {
                log::info!(
                    "ingest: {} is duplicate content of batch {batch_id}, skipped",
                    facts.filename
                );
                let moved_to = self.move_file(path, self.paths.archive_dir.as_deref(), "archive");
                Ok(IngestionOutcome {
                    filename: facts.filename,
                    fingerprint: facts.fingerprint,
                    status: IngestStatus::SkippedDuplicate,
                    batch_id,
                    rows_staged: 0,
                    superseded: Vec::new(),
                    rows_removed: 0,
                    moved_to,
                })
            }
            Admission::New {
                status,
                batch_id,
                rows,
                superseded,
                removed,
            } => {
                log::info!(
                    "ingest: {} admitted as batch {batch_id} ({rows} rows, {status:?})",
                    facts.filename
                );
                if !superseded.is_empty() {
                    log::info!(
                        "ingest: batch {batch_id} supersedes {superseded:?} ({removed} staged rows removed)"
                    );
                }
                let moved_to = self.move_file(path, self.paths.archive_dir.as_deref(), "archive");
                Ok(IngestionOutcome {
                    filename: facts.filename,
                    fingerprint: facts.fingerprint,
                    status,
                    batch_id,
                    rows_staged: rows,
                    superseded,
                    rows_removed: removed,
                    moved_to,
                })
            }
        }
    }

    /// Record an outcome outside the admission transaction. A failure here
    /// is logged, not returned: the outcome itself stands.
    fn log_outcome(
        &self,
        facts: &SourceFacts,
        row_count: Option<u64>,
        outcome: SourceOutcome,
        batch_id: Option<i64>,
        detail: Option<String>,
    ) {
        let entry = SourceFileEntry {
            fingerprint: facts.fingerprint.clone(),
            filename: facts.filename.clone(),
            source_path: facts.source_path.clone(),
            size_bytes: facts.size_bytes,
            row_count,
            survey_type: None,
            term_label: None,
            outcome,
            batch_id,
            detail,
            seen_at: now_timestamp(),
        };
        if let Err(e) = self.store.with_conn(|c| history::log_source_file(c, &entry)) {
            log::warn!("ingest: could not log {outcome} for {}: {e:#}", facts.filename);
        }
    }

    fn move_file(&self, path: &Path, dir: Option<&Path>, what: &str) -> Option<PathBuf> {
        let dir = dir?;
        match archive::move_into(path, dir) {
            Ok(target) => {
                log::info!("ingest: moved {} to {what} {}", path.display(), target.display());
                Some(target)
            }
            Err(e) => {
                log::warn!("ingest: could not move {} to {what}: {e}", path.display());
                None
            }
        }
    }
}
