//! Error taxonomy for ingestion and normalization

use thiserror::Error;

/// Failure of a single file or a whole normalization run.
///
/// Duplicate content and resolver misses are not errors: the first is an
/// ingestion outcome, the second a null output field.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Unreadable, unparseable or incomplete extract. The file is quarantined.
    #[error("malformed input {file}: {reason}")]
    MalformedInput { file: String, reason: String },

    /// Filename already admitted with different content.
    #[error("conflicting reload of {filename}: already admitted as batch {batch_id} with different content")]
    ConflictingReload { filename: String, batch_id: i64 },

    /// Output write failed; the run's transaction was rolled back.
    #[error("normalization failed: {0}")]
    Normalization(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sink(#[from] anyhow::Error),
}

impl EtlError {
    pub fn malformed(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Stable tag used in reports and the source-file log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "malformed-input",
            Self::ConflictingReload { .. } => "conflicting-reload",
            Self::Normalization(_) => "normalization",
            Self::Io(_) => "io",
            Self::Sink(_) => "sink",
        }
    }

    /// Whether the offending source file belongs in quarantine.
    pub fn quarantines(&self) -> bool {
        matches!(self, Self::MalformedInput { .. })
    }
}
