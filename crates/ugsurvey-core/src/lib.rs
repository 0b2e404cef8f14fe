//! ugsurvey-core: shared model for the undergraduate survey ETL
//!
//! Holds the staged row shape, the normalized output variants, the
//! error taxonomy and logging setup used by every other crate.

pub mod columns;
pub mod error;
pub mod logging;
pub mod model;
pub mod output;
pub mod source;

pub use error::EtlError;
pub use logging::init_logging;
pub use model::{StagedRow, Term, normalize_stud_id};
pub use output::{
    AcadYearLabel, AttributesRow, ConnectionRow, InternLearnedRow, InternshipRow,
    IntlExperienceRow, JobLearnedRow, NormalizedOutputRow, OutputTable, ResponseRow, RowKey,
};
pub use columns::{CRITICAL_COLUMNS, missing_critical};
pub use source::{SurveyType, detect_survey_type, infer_term_label};
