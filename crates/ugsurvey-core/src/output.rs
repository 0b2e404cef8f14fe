//! Normalized output rows, one variant per target table

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Term;

/// Identity shared by every output row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub stud_id: String,
    pub term: Term,
}

/// Target tables of the normalized schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTable {
    Attributes,
    Response,
    IntlExperience,
    Internship,
    Connection,
    JobLearned,
    InternLearned,
}

impl OutputTable {
    pub const ALL: [OutputTable; 7] = [
        Self::Attributes,
        Self::Response,
        Self::IntlExperience,
        Self::Internship,
        Self::Connection,
        Self::JobLearned,
        Self::InternLearned,
    ];

    /// Table name in the sink.
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Attributes => "ugs_stud_attr",
            Self::Response => "ugs_response",
            Self::IntlExperience => "ugs_intl_exp",
            Self::Internship => "ugs_intern",
            Self::Connection => "ugs_conn_to_inst",
            Self::JobLearned => "ugs_empl_job_lrned",
            Self::InternLearned => "ugs_intern_lrned",
        }
    }
}

impl fmt::Display for OutputTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// One row per respondent/term: collection facts and plan indicators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributesRow {
    pub stud_id: String,
    pub term: String,
    pub acad_year: Option<i32>,
    /// `Y` when the term is not a four digit code.
    pub invalid_term_indc: String,
    pub intern_numb: Option<i32>,
    pub coltn_mthd: Option<String>,
    pub indc_have_information: Option<String>,
    pub post_graduation_stat_cd: Option<i32>,
    pub post_graduation_stat: Option<String>,
    pub post_graduation_other: Option<String>,
    pub indc_intern: Option<String>,
    pub indc_intl_exp: Option<String>,
    pub indc_ug_rsrch: Option<String>,
    pub indc_job_asst: Option<String>,
    pub indc_conn_to_inst: Option<String>,
    pub indc_ft_empl: Option<String>,
    pub indc_pt_empl: Option<String>,
    pub indc_any_empl: Option<String>,
    pub indc_fut_edu: Option<String>,
    pub indc_fell: Option<String>,
    pub indc_post_intern_resid: Option<String>,
    pub indc_still_seeking: Option<String>,
    pub indc_mil: Option<String>,
    pub indc_entre: Option<String>,
    pub indc_other_plans: Option<String>,
}

/// Free-text employment and further-education answers.
///
/// Fields ending in `_nm`, `_state` and `_country` hold resolved values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRow {
    pub stud_id: String,
    pub term: String,
    pub ps_commitment: Option<String>,
    pub ps_commitment_def: Option<String>,
    pub ps_commitment_other: Option<String>,
    pub fs_program: Option<String>,
    pub fs_city: Option<String>,
    pub fs_state: Option<String>,
    pub fs_country: Option<String>,
    pub fe_type: Option<String>,
    pub fe_type_def: Option<String>,
    pub fe_college: Option<String>,
    pub fe_inst_cd: Option<String>,
    pub fe_inst_nm: Option<String>,
    pub fe_stage: Option<String>,
    pub fe_program: Option<String>,
    pub emp_month: Option<String>,
    pub emp_year: Option<String>,
    pub offers_count: Option<String>,
    pub emp_co_nm: Option<String>,
    pub emp_dept: Option<String>,
    pub emp_title: Option<String>,
    pub emp_relate: Option<String>,
    pub emp_city: Option<String>,
    pub emp_state: Option<String>,
    pub emp_country: Option<String>,
    pub emp_salary: Option<String>,
    pub emp_bonus_amount: Option<String>,
    pub emp_relocate_amount: Option<String>,
    pub emp_functional: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntlExperienceRow {
    pub stud_id: String,
    pub term: String,
    pub intl_exp_type: String,
    pub intl_exp_detail: Option<String>,
}

/// One internship slot (1..=3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternshipRow {
    pub stud_id: String,
    pub term: String,
    pub intern_numb: u8,
    pub intern_co_nm: Option<String>,
    pub intern_dept: Option<String>,
    pub intern_job_title: Option<String>,
    pub indc_intern_paid: Option<String>,
    pub intern_amt_paid: Option<String>,
    pub intern_country: Option<String>,
    pub intern_state: Option<String>,
    pub intern_province: Option<String>,
    pub intern_college_credit: Option<String>,
    pub intern_semesters: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRow {
    pub stud_id: String,
    pub term: String,
    pub conn_to_inst: String,
}

/// One way a respondent learned about their job.
///
/// Codes 1..=14 are the numbered options; 99 is "Other".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLearnedRow {
    pub stud_id: String,
    pub term: String,
    pub empl_lrned_abt_job_cd: i32,
    pub empl_lrned_abt_job: String,
}

/// One way a respondent learned about internship slot `intern_nbr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternLearnedRow {
    pub stud_id: String,
    pub term: String,
    pub intern_nbr: u8,
    pub intern_lrned_abt_cd: i32,
    pub intern_lrned_abt: String,
}

/// A normalized row together with the batch that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum NormalizedOutputRow {
    Attributes { batch_id: i64, row: AttributesRow },
    Response { batch_id: i64, row: ResponseRow },
    IntlExperience { batch_id: i64, row: IntlExperienceRow },
    Internship { batch_id: i64, row: InternshipRow },
    Connection { batch_id: i64, row: ConnectionRow },
    JobLearned { batch_id: i64, row: JobLearnedRow },
    InternLearned { batch_id: i64, row: InternLearnedRow },
}

impl NormalizedOutputRow {
    pub fn table(&self) -> OutputTable {
        match self {
            Self::Attributes { .. } => OutputTable::Attributes,
            Self::Response { .. } => OutputTable::Response,
            Self::IntlExperience { .. } => OutputTable::IntlExperience,
            Self::Internship { .. } => OutputTable::Internship,
            Self::Connection { .. } => OutputTable::Connection,
            Self::JobLearned { .. } => OutputTable::JobLearned,
            Self::InternLearned { .. } => OutputTable::InternLearned,
        }
    }

    pub fn batch_id(&self) -> i64 {
        match self {
            Self::Attributes { batch_id, .. }
            | Self::Response { batch_id, .. }
            | Self::IntlExperience { batch_id, .. }
            | Self::Internship { batch_id, .. }
            | Self::Connection { batch_id, .. }
            | Self::JobLearned { batch_id, .. }
            | Self::InternLearned { batch_id, .. } => *batch_id,
        }
    }

    pub fn key(&self) -> RowKey {
        let (stud_id, term) = match self {
            Self::Attributes { row, .. } => (&row.stud_id, &row.term),
            Self::Response { row, .. } => (&row.stud_id, &row.term),
            Self::IntlExperience { row, .. } => (&row.stud_id, &row.term),
            Self::Internship { row, .. } => (&row.stud_id, &row.term),
            Self::Connection { row, .. } => (&row.stud_id, &row.term),
            Self::JobLearned { row, .. } => (&row.stud_id, &row.term),
            Self::InternLearned { row, .. } => (&row.stud_id, &row.term),
        };
        RowKey {
            stud_id: stud_id.clone(),
            term: Term::new(term),
        }
    }
}

/// Academic-year dimension entry for one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcadYearLabel {
    pub term: String,
    pub acad_year: i32,
    pub report_label: String,
}

impl AcadYearLabel {
    /// `None` for terms that are not four digit codes.
    pub fn from_term(term: &Term) -> Option<Self> {
        Some(Self {
            term: term.as_str().to_string(),
            acad_year: term.academic_year()?,
            report_label: term.report_label()?,
        })
    }
}
