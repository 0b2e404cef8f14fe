//! ugsurvey-pipeline: classification, lookup resolution, fan-out and the
//! run coordinator
//!
//! # Flow
//!
//! ```text
//! staged rows ─► classify / resolve ─► fan_out ─► replace_output (one tx)
//!      ▲
//!  Ingestor ◄── Coordinator ──► Notifier
//! ```

pub mod classify;
pub mod coordinator;
pub mod fanout;
pub mod normalize;
pub mod notify;
pub mod resolve;

pub use classify::{CategoryGroup, CategoryRule, Predicate, RULES, classify};
pub use coordinator::{Coordinator, RunMode, RunReport, RunState};
pub use fanout::fan_out;
pub use normalize::{NormalizeOptions, NormalizeSummary, Scope, normalize};
pub use notify::{EmailNotifier, EmailSettings, LogNotifier, Notifier, SummaryFileNotifier};
pub use resolve::{INSTITUTION_CUTOVER_TERM, LookupKind, Resolver};
