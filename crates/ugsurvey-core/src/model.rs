//! Staged respondent rows and term codes

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Width of a normalized student id.
pub const STUD_ID_WIDTH: usize = 9;

/// Normalize a raw student id: trim, keep the last 9 characters, left-pad
/// with zeros. Returns `None` for blank input.
pub fn normalize_stud_id(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let chars: Vec<char> = s.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(STUD_ID_WIDTH)..]
        .iter()
        .collect();
    Some(format!("{tail:0>width$}", width = STUD_ID_WIDTH))
}

/// Term code as supplied by the extract, e.g. `2238` (fall 2023).
///
/// Layout is `yyyT`: a three digit year code and a season digit
/// (1 spring, 5 summer, 8 fall). Non-conforming values are kept verbatim
/// and flagged downstream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Term(String);

impl Term {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric code when the term is exactly four digits.
    pub fn code(&self) -> Option<u32> {
        if self.0.len() == 4 && self.0.bytes().all(|b| b.is_ascii_digit()) {
            self.0.parse().ok()
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        self.code().is_some()
    }

    /// Academic year the term reports under. Spring belongs to the prior year.
    pub fn academic_year(&self) -> Option<i32> {
        let code = self.code()? as i32;
        let mut base = code / 10 - 200;
        if code % 10 == 1 {
            base -= 1;
        }
        Some(2000 + base)
    }

    /// Report label such as `2023-24`.
    pub fn report_label(&self) -> Option<String> {
        let year = self.academic_year()?;
        Some(format!("{year}-{:02}", (year + 1).rem_euclid(100)))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One respondent/term row of an admitted extract.
///
/// `fields` holds every non-key column with a non-blank value, keyed by
/// lowercased header name. Blank cells are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedRow {
    pub batch_id: i64,
    pub row_num: i64,
    pub stud_id: String,
    pub term: Term,
    pub fields: BTreeMap<String, String>,
}

impl StagedRow {
    /// Non-blank value of a column, looked up case-insensitively.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_populated(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// `true` when the column holds `Y` (any case).
    pub fn is_flag_set(&self, name: &str) -> bool {
        self.field(name)
            .is_some_and(|v| v.eq_ignore_ascii_case("y"))
    }

    /// Whether the respondent supplied anything beyond the key columns.
    pub fn has_information(&self) -> bool {
        self.fields.values().any(|v| !v.trim().is_empty())
    }
}
