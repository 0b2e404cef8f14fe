//! Run coordinator: ingestion, then normalization, for one run mode

use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use ugsurvey_core::EtlError;
use ugsurvey_ingest::{AdmitOptions, IngestPaths, IngestStatus, IngestionOutcome, Ingestor};
use ugsurvey_store::{Store, now_timestamp};

use crate::normalize::{NormalizeOptions, NormalizeSummary, Scope, normalize};
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Idle,
    Ingesting,
    Normalizing,
    Done,
    Failed,
}

impl RunState {
    /// Whether `self -> next` is a legal step. `Failed` is absorbing.
    pub fn can_enter(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Ingesting)
                | (Ingesting, Normalizing)
                | (Normalizing, Done)
                | (Ingesting, Failed)
                | (Normalizing, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ingesting => "ingesting",
            Self::Normalizing => "normalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum RunMode {
    /// Admit one file, then normalize the batch it produced.
    SingleFile { path: PathBuf, options: AdmitOptions },
    /// Admit every matching file in `incoming_dir`, then normalize every
    /// active batch admitted on or before `as_of`.
    Periodic {
        incoming_dir: PathBuf,
        pattern: String,
        as_of: Option<NaiveDate>,
    },
}

impl RunMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleFile { .. } => "single-file",
            Self::Periodic { .. } => "periodic",
        }
    }
}

/// Terminal state of one file in a run.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub status: String,
    pub batch_id: Option<i64>,
    pub rows: u64,
    pub error: Option<String>,
}

impl FileReport {
    fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Stage and file a run failed at.
#[derive(Debug, Clone, Serialize)]
pub struct StageFailure {
    pub stage: RunState,
    pub file: Option<String>,
    pub kind: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounts {
    pub admitted: usize,
    pub skipped: usize,
    pub quarantined: usize,
    pub rejected: usize,
    pub failed: usize,
    pub normalized_rows: usize,
}

/// Structured outcome of a run, handed to every notifier.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: String,
    pub state: RunState,
    pub transitions: Vec<RunState>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub files: Vec<FileReport>,
    pub counts: RunCounts,
    pub normalize: Option<NormalizeSummary>,
    pub failures: Vec<StageFailure>,
}

impl RunReport {
    fn new(mode: &RunMode) -> Self {
        Self {
            mode: mode.name().to_string(),
            state: RunState::Idle,
            transitions: vec![RunState::Idle],
            started_at: now_timestamp(),
            finished_at: None,
            files: Vec::new(),
            counts: RunCounts::default(),
            normalize: None,
            failures: Vec::new(),
        }
    }

    fn enter(&mut self, next: RunState) {
        if !self.state.can_enter(next) {
            // Only reachable through a coordinator bug; fail the run.
            log::error!("run: illegal transition {} -> {next}", self.state);
            self.state = RunState::Failed;
            self.transitions.push(RunState::Failed);
            return;
        }
        log::debug!("run: {} -> {next}", self.state);
        self.state = next;
        self.transitions.push(next);
    }

    fn fail(&mut self, file: Option<String>, err: &EtlError) {
        self.failures.push(StageFailure {
            stage: self.state,
            file,
            kind: err.kind().to_string(),
            error: err.to_string(),
        });
        self.enter(RunState::Failed);
    }

    fn record_file(&mut self, file: String, result: &Result<IngestionOutcome, EtlError>) {
        let report = match result {
            Ok(outcome) => {
                if outcome.is_new_batch() {
                    self.counts.admitted += 1;
                } else {
                    self.counts.skipped += 1;
                }
                FileReport {
                    file,
                    status: status_name(outcome.status).to_string(),
                    batch_id: Some(outcome.batch_id),
                    rows: outcome.rows_staged,
                    error: None,
                }
            }
            Err(err) => {
                let status = match err {
                    EtlError::MalformedInput { .. } => {
                        self.counts.quarantined += 1;
                        "quarantined"
                    }
                    EtlError::ConflictingReload { .. } => {
                        self.counts.rejected += 1;
                        "rejected-conflict"
                    }
                    _ => {
                        self.counts.failed += 1;
                        "failed"
                    }
                };
                FileReport {
                    file,
                    status: status.to_string(),
                    batch_id: None,
                    rows: 0,
                    error: Some(err.to_string()),
                }
            }
        };
        self.files.push(report);
    }

    /// 0 only when the run reached `Done` and no file failed.
    pub fn exit_code(&self) -> u8 {
        if self.state == RunState::Done && !self.files.iter().any(FileReport::failed) {
            0
        } else {
            1
        }
    }

    /// Human-readable summary naming any failing stage and file.
    pub fn summary_text(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "ugsurvey {} run: {} (started {})",
            self.mode, self.state, self.started_at
        );
        let c = &self.counts;
        let _ = writeln!(
            s,
            "files: {} admitted, {} skipped, {} quarantined, {} rejected, {} failed",
            c.admitted, c.skipped, c.quarantined, c.rejected, c.failed
        );
        if let Some(n) = &self.normalize {
            let _ = writeln!(
                s,
                "normalized: {} staged rows from {} batch(es), {} output rows",
                n.staged_rows,
                n.batches.len(),
                n.rows_inserted
            );
        }
        for f in self.files.iter().filter(|f| f.failed()) {
            let _ = writeln!(
                s,
                "  {} {}: {}",
                f.status,
                f.file,
                f.error.as_deref().unwrap_or("")
            );
        }
        for f in &self.failures {
            let _ = writeln!(
                s,
                "failed at {}{}: {}",
                f.stage,
                f.file
                    .as_deref()
                    .map(|n| format!(" ({n})"))
                    .unwrap_or_default(),
                f.error
            );
        }
        s
    }
}

fn status_name(status: IngestStatus) -> &'static str {
    match status {
        IngestStatus::Admitted => "admitted",
        IngestStatus::Replaced => "replaced",
        IngestStatus::Forced => "forced",
        IngestStatus::SkippedDuplicate => "skipped-duplicate",
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Files in `dir` matching `pattern`, sorted by name.
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, EtlError> {
    if !dir.is_dir() {
        return Err(EtlError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("incoming directory not found: {}", dir.display()),
        )));
    }
    let full = dir.join(pattern);
    let full = full.to_string_lossy();
    let paths = glob::glob(&full)
        .map_err(|e| {
            EtlError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("bad file pattern {pattern:?}: {e}"),
            ))
        })?;
    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| EtlError::Io(e.into_error()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by_key(|p| file_name(p));
    Ok(files)
}

/// Sequences ingestion and normalization and reports the outcome.
pub struct Coordinator<'a> {
    store: &'a Store,
    paths: IngestPaths,
    normalize: NormalizeOptions,
    notifiers: Vec<Box<dyn Notifier>>,
}

impl<'a> Coordinator<'a> {
    pub fn new(store: &'a Store, paths: IngestPaths, normalize: NormalizeOptions) -> Self {
        Self {
            store,
            paths,
            normalize,
            notifiers: Vec::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Run `mode` to completion. Failures are part of the report, not
    /// errors.
    pub fn run(&self, mode: &RunMode) -> RunReport {
        let mut report = RunReport::new(mode);
        log::info!("run: starting {} run", mode.name());

        report.enter(RunState::Ingesting);
        let scope = match self.ingest(mode, &mut report) {
            Some(scope) => scope,
            None => return self.finish(report),
        };

        report.enter(RunState::Normalizing);
        if let Some(scope) = scope {
            match normalize(self.store, &scope, &self.normalize) {
                Ok(summary) => {
                    report.counts.normalized_rows = summary.rows_inserted;
                    report.normalize = Some(summary);
                }
                Err(err) => {
                    log::error!("run: normalization failed: {err}");
                    report.fail(None, &err);
                    return self.finish(report);
                }
            }
        } else {
            log::info!("run: nothing new to normalize");
        }
        report.enter(RunState::Done);
        self.finish(report)
    }

    /// Ingestion stage. `None` means the stage failed; `Some(None)` means
    /// there is nothing to normalize.
    fn ingest(&self, mode: &RunMode, report: &mut RunReport) -> Option<Option<Scope>> {
        let ingestor = Ingestor::new(self.store, self.paths.clone());
        match mode {
            RunMode::SingleFile { path, options } => {
                let name = file_name(path);
                let result = ingestor.admit(path, *options);
                report.record_file(name.clone(), &result);
                match result {
                    Ok(outcome) if outcome.is_new_batch() => {
                        Some(Some(Scope::Batches(vec![outcome.batch_id])))
                    }
                    Ok(_) => Some(None),
                    Err(err) => {
                        report.fail(Some(name), &err);
                        None
                    }
                }
            }
            RunMode::Periodic {
                incoming_dir,
                pattern,
                as_of,
            } => {
                let files = match discover(incoming_dir, pattern) {
                    Ok(files) => files,
                    Err(err) => {
                        log::error!("run: discovery failed: {err}");
                        report.fail(None, &err);
                        return None;
                    }
                };
                log::info!(
                    "run: {} file(s) matching {pattern} in {}",
                    files.len(),
                    incoming_dir.display()
                );
                for path in &files {
                    let result = ingestor.admit(path, AdmitOptions::default());
                    report.record_file(file_name(path), &result);
                }
                Some(Some(Scope::AllActive { as_of: *as_of }))
            }
        }
    }

    fn finish(&self, mut report: RunReport) -> RunReport {
        report.finished_at = Some(now_timestamp());
        log::info!("run: finished in state {}", report.state);
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(&report) {
                log::warn!("notify: {} failed: {e:#}", notifier.name());
            }
        }
        report
    }
}
