//! Extract parsing and row validation.
//!
//! A file is accepted whole or not at all: the first bad row rejects it.

use std::collections::{BTreeMap, HashSet};

use ugsurvey_core::{EtlError, StagedRow, Term, normalize_stud_id};

/// Header names accepted for the student key, in preference order.
const STUDENT_KEY_COLUMNS: &[&str] = &["student_id", "stud_id"];
const TERM_COLUMN: &str = "term";

/// A validated row awaiting a batch id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// 1-based data row number (header excluded).
    pub row_num: i64,
    pub stud_id: String,
    pub term: Term,
    pub fields: BTreeMap<String, String>,
}

impl ParsedRow {
    pub fn into_staged(self, batch_id: i64) -> StagedRow {
        StagedRow {
            batch_id,
            row_num: self.row_num,
            stud_id: self.stud_id,
            term: self.term,
            fields: self.fields,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedExtract {
    /// Header names as they appear in the file, trimmed.
    pub headers: Vec<String>,
    pub rows: Vec<ParsedRow>,
}

/// Parse and validate a comma-delimited extract.
///
/// `file` names the source in error messages.
pub fn parse_extract(file: &str, bytes: &[u8]) -> Result<ParsedExtract, EtlError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| EtlError::malformed(file, format!("not valid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(EtlError::malformed(file, "empty file"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EtlError::malformed(file, format!("unreadable header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let lower: Vec<String> = headers.iter().map(|h| h.to_ascii_lowercase()).collect();

    let stud_idx = STUDENT_KEY_COLUMNS
        .iter()
        .find_map(|k| lower.iter().position(|h| h == k))
        .ok_or_else(|| EtlError::malformed(file, "missing required column student_id"))?;
    let term_idx = lower
        .iter()
        .position(|h| h == TERM_COLUMN)
        .ok_or_else(|| EtlError::malformed(file, "missing required column term"))?;

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    for (i, record) in reader.records().enumerate() {
        let row_num = i as i64 + 1;
        let record =
            record.map_err(|e| EtlError::malformed(file, format!("row {row_num}: {e}")))?;

        let stud_id = record
            .get(stud_idx)
            .and_then(normalize_stud_id)
            .ok_or_else(|| EtlError::malformed(file, format!("row {row_num}: empty student id")))?;
        let term = record.get(term_idx).map(Term::new).unwrap_or_else(|| Term::new(""));
        if term.as_str().is_empty() {
            return Err(EtlError::malformed(file, format!("row {row_num}: empty term")));
        }
        if !seen.insert((stud_id.clone(), term.clone())) {
            return Err(EtlError::malformed(
                file,
                format!("row {row_num}: duplicate student {stud_id} for term {term}"),
            ));
        }

        let fields = record
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != stud_idx && *idx != term_idx)
            .filter_map(|(idx, value)| {
                let value = value.trim();
                (!value.is_empty()).then(|| (lower[idx].clone(), value.to_string()))
            })
            .collect();

        rows.push(ParsedRow {
            row_num,
            stud_id,
            term,
            fields,
        });
    }

    if rows.is_empty() {
        return Err(EtlError::malformed(file, "no data rows"));
    }
    Ok(ParsedExtract { headers, rows })
}
