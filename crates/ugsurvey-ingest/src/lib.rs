//! ugsurvey-ingest: exactly-once admission of survey extracts
//!
//! A file is fingerprinted, checked against active ingestion records by
//! content and by name, and then admitted, skipped or refused. Admitted
//! rows land in the staging store in one transaction.

pub mod archive;
pub mod decision;
pub mod ingestor;
pub mod parse;

pub use decision::{AdmitOptions, Decision, decide, is_conflicting_reload, is_duplicate_content};
pub use ingestor::{Explanation, IngestPaths, IngestStatus, IngestionOutcome, Ingestor};
pub use parse::{ParsedExtract, ParsedRow, parse_extract};
