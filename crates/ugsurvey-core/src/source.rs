//! Facts derived from a source file's name and header

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Which survey an extract belongs to, judged from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SurveyType {
    Ug,
    Pg,
    Unknown,
}

impl SurveyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ug => "UG",
            Self::Pg => "PG",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SurveyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const UG_MARKERS: &[&str] = &["plans_cleaned", "fe_college", "indicator_internship"];
const PG_MARKERS: &[&str] = &["wc_postgrad", "postgrad", "pg_"];

/// Classify a header by marker substrings. UG markers win over PG ones.
pub fn detect_survey_type<S: AsRef<str>>(headers: &[S]) -> SurveyType {
    let lower: Vec<String> = headers
        .iter()
        .map(|h| h.as_ref().to_ascii_lowercase())
        .collect();
    let has_any = |markers: &[&str]| {
        lower
            .iter()
            .any(|h| markers.iter().any(|m| h.contains(m)))
    };
    if has_any(UG_MARKERS) {
        SurveyType::Ug
    } else if has_any(PG_MARKERS) {
        SurveyType::Pg
    } else {
        SurveyType::Unknown
    }
}

/// Human label for the reporting period embedded in a file name.
///
/// `UGSurveyData_202324SP_11_5_25.csv` gives `2023-24 Spring`. This is a
/// display label only, not a term code.
pub fn infer_term_label(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.as_bytes().windows(8).find_map(|w| {
        let (digits, season) = w.split_at(6);
        if !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let season = match season.to_ascii_uppercase().as_slice() {
            b"SP" => "Spring",
            b"FA" => "Fall",
            b"SU" => "Summer",
            b"WN" => "Winter",
            _ => return None,
        };
        let digits = std::str::from_utf8(digits).ok()?;
        Some(format!("{}-{} {season}", &digits[..4], &digits[4..]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ug_header_detected() {
        assert_eq!(
            detect_survey_type(&["student_id", "Plans_Cleaned", "term"]),
            SurveyType::Ug
        );
    }

    #[test]
    fn pg_header_detected() {
        assert_eq!(
            detect_survey_type(&["student_id", "WC_PostGrad_status"]),
            SurveyType::Pg
        );
    }

    #[test]
    fn unknown_header() {
        assert_eq!(detect_survey_type(&["a", "b"]), SurveyType::Unknown);
    }

    #[test]
    fn term_label_from_filename() {
        let label = infer_term_label(Path::new("/in/UGSurveyData_202324SP_11_5_25.csv"));
        assert_eq!(label.as_deref(), Some("2023-24 Spring"));
    }

    #[test]
    fn term_label_lowercase_season() {
        let label = infer_term_label(Path::new("UGSurveyData_202425fa.csv"));
        assert_eq!(label.as_deref(), Some("2024-25 Fall"));
    }

    #[test]
    fn term_label_absent() {
        assert_eq!(infer_term_label(Path::new("UGSurveyData.csv")), None);
        assert_eq!(infer_term_label(Path::new("UGSurveyData_202324XX.csv")), None);
    }
}
