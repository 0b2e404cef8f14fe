//! ugsurvey-store: DuckDB sink for the survey ETL
//!
//! Owns the database schema and every SQL statement: ingestion
//! bookkeeping, staged rows, reference tables and normalized output.
//! Callers compose the free functions inside [`Store::transaction`].

pub mod hash;
pub mod history;
pub mod output;
pub mod reference;
pub mod schema;
pub mod staging;
pub mod store;

pub use hash::Fingerprint;
pub use history::{AdmitMode, IngestionRecord, PriorMatches, SourceFileEntry, SourceOutcome};
pub use output::WriteCounts;
pub use reference::{ReferenceData, ReferenceKind};
pub use store::{Store, now_timestamp};
