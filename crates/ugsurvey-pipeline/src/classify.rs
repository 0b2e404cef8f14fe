//! Category classifier.
//!
//! The rules are static data: one [`CategoryRule`] per (group, label),
//! evaluated in table order. A row may match any number of rules in a
//! group; no match is an empty result, not an error.

use serde::Serialize;
use ugsurvey_core::StagedRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryGroup {
    IntlExperience,
    PostGradPlan,
    Connection,
}

/// Condition over a row's indicator columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Column holds `Y`.
    Flag(&'static str),
    /// Column holds `Y`, or the paired free-text column is non-empty.
    FlagOrText {
        flag: &'static str,
        text: &'static str,
    },
    /// Column is non-empty and not a negative answer (`N`, `No`).
    Answered(&'static str),
    /// Like `Answered`, for the first of several alias columns that is present.
    AnsweredAny(&'static [&'static str]),
}

fn answered(row: &StagedRow, col: &str) -> bool {
    row.field(col)
        .is_some_and(|v| !v.eq_ignore_ascii_case("n") && !v.eq_ignore_ascii_case("no"))
}

impl Predicate {
    pub fn eval(&self, row: &StagedRow) -> bool {
        match *self {
            Self::Flag(col) => row.is_flag_set(col),
            Self::FlagOrText { flag, text } => row.is_flag_set(flag) || row.is_populated(text),
            Self::Answered(col) => answered(row, col),
            Self::AnsweredAny(cols) => cols
                .iter()
                .find(|c| row.field(c).is_some())
                .is_some_and(|c| answered(row, c)),
        }
    }

    /// Free-text column carrying detail for a match, if any.
    pub fn text_column(&self) -> Option<&'static str> {
        match *self {
            Self::FlagOrText { text, .. } => Some(text),
            Self::Flag(_) | Self::Answered(_) | Self::AnsweredAny(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryRule {
    pub group: CategoryGroup,
    pub label: &'static str,
    /// Status code reported for the post-graduation plan group.
    pub code: Option<i32>,
    pub predicate: Predicate,
}

const fn intl(flag: &'static str, text: &'static str, label: &'static str) -> CategoryRule {
    CategoryRule {
        group: CategoryGroup::IntlExperience,
        label,
        code: None,
        predicate: Predicate::FlagOrText { flag, text },
    }
}

const fn plan(flag: &'static str, label: &'static str, code: i32) -> CategoryRule {
    CategoryRule {
        group: CategoryGroup::PostGradPlan,
        label,
        code: Some(code),
        predicate: Predicate::Flag(flag),
    }
}

const fn conn(col: &'static str, label: &'static str) -> CategoryRule {
    CategoryRule {
        group: CategoryGroup::Connection,
        label,
        code: None,
        predicate: Predicate::Answered(col),
    }
}

/// Cell phone column. Older extracts name it `connect_cell`.
const CELL_PHONE_COLUMNS: &[&str] = &["connect_cell_phone", "connect_cell"];

/// Sentinel label for an affirmative "no international experience".
pub const NO_INTL_EXPERIENCE: &str = "No International Experience";

pub static RULES: &[CategoryRule] = &[
    // international experience
    intl("int_exp_semAbroad", "int_exp_semAbroad_definition", "Semester Education Abroad"),
    intl("int_exp_AYEA", "int_exp_AYEA_definition", "Academic Year Education Abroad"),
    intl("int_exp_embedded", "int_exp_embedded_definition", "Embedded Course Abroad"),
    intl("int_exp_studorg", "int_exp_studorg_definition", "Student Organization Abroad"),
    intl("int_exp_other", "int_exp_other_fill", "Other International Experience"),
    intl("int_exp_long_via_psu", "int_exp_long_via_psu_defin", "Long-Term Program Abroad"),
    intl("int_exp_short_psu_course", "int_exp_short_psu_course_defin", "Short-Term Course Abroad"),
    intl(
        "int_exp_short_psu_club_org",
        "int_exp_short_psu_club_org_def",
        "Short-Term Club or Organization Abroad",
    ),
    intl(
        "int_exp_educ_prog_not_psu",
        "int_exp_educ_prog_not_psu_defin",
        "Education Abroad via Other Provider",
    ),
    intl("int_exp_internship", "int_exp_internship_definition", "International Internship"),
    CategoryRule {
        group: CategoryGroup::IntlExperience,
        label: NO_INTL_EXPERIENCE,
        code: None,
        predicate: Predicate::Flag("int_exp_none"),
    },
    intl("int_exp_did_not_have", "int_exp_did_not_have_defin", "None"),
    // post-graduation plan, in status code precedence
    plan("indicator_fulltime_employment", "Full-Time Employment", 1),
    plan("indicator_parttime_employment", "Part-Time Employment", 2),
    plan("indicator_further_education", "Further Education", 3),
    plan("indicator_fellowship", "Fellowship", 4),
    plan("indicator_military", "Military", 5),
    plan("indicator_still_seeking", "Still Seeking", 6),
    plan("indicator_other_plans", "Other Plans", 9),
    // connection to the institution
    conn("connect_mentor", "Mentor"),
    conn("connect_emp_panel", "Employer Panel"),
    conn("connect_network", "Networking"),
    conn("connect_assist", "Job Assistance"),
    conn("connect_ldship", "Leadership"),
    conn("connect_no", "No"),
    conn("connect_email", "Email"),
    CategoryRule {
        group: CategoryGroup::Connection,
        label: "Cell Phone",
        code: None,
        predicate: Predicate::AnsweredAny(CELL_PHONE_COLUMNS),
    },
    conn("indicator_stay_connected_PSU", "Stay Connected to PSU"),
];

/// Rules of `group`, in table order.
pub fn rules(group: CategoryGroup) -> impl Iterator<Item = &'static CategoryRule> {
    RULES.iter().filter(move |r| r.group == group)
}

/// Rules of `group` that match `row`, one per label, in table order.
pub fn matching_rules(row: &StagedRow, group: CategoryGroup) -> Vec<&'static CategoryRule> {
    let mut matched: Vec<&'static CategoryRule> = Vec::new();
    for rule in rules(group) {
        if rule.predicate.eval(row) && !matched.iter().any(|m| m.label == rule.label) {
            matched.push(rule);
        }
    }
    matched
}

/// Labels of `group` that apply to `row`.
pub fn classify(row: &StagedRow, group: CategoryGroup) -> Vec<&'static str> {
    matching_rules(row, group)
        .into_iter()
        .map(|r| r.label)
        .collect()
}

/// Post-graduation status code: the first matching plan in precedence order.
pub fn post_graduation_code(row: &StagedRow) -> Option<i32> {
    rules(CategoryGroup::PostGradPlan)
        .find(|r| r.predicate.eval(row))
        .and_then(|r| r.code)
}
