//! Admission decision table.
//!
//! Content identity (fingerprint) and name identity (filename) are kept as
//! two separate predicates; `decide` only combines their answers.

use serde::Serialize;
use ugsurvey_store::{Fingerprint, IngestionRecord, PriorMatches};

/// Override flags for one admission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdmitOptions {
    /// Delete the staged rows of matching batches before admitting.
    pub replace: bool,
    /// Admit even if a match exists; prior rows are kept.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum Decision {
    /// No prior match.
    Admit,
    /// Same content already admitted as `batch_id`.
    Skip { batch_id: i64 },
    /// Same filename admitted as `batch_id` with different content.
    Conflict { batch_id: i64 },
    /// Admit after deleting the staged rows of `priors`.
    Replace { priors: Vec<i64> },
    /// Admit next to `priors`, superseding only their bookkeeping.
    Force { priors: Vec<i64> },
}

impl Decision {
    pub fn admits(&self) -> bool {
        matches!(self, Self::Admit | Self::Replace { .. } | Self::Force { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Admit => "admit",
            Self::Skip { .. } => "skip (duplicate-content)",
            Self::Conflict { .. } => "fail (conflicting-reload)",
            Self::Replace { .. } => "replace",
            Self::Force { .. } => "force",
        }
    }
}

/// Prior active record with byte-identical content, if any.
pub fn is_duplicate_content<'a>(
    prior: &'a PriorMatches,
    fingerprint: &Fingerprint,
) -> Option<&'a IngestionRecord> {
    prior
        .by_fingerprint
        .iter()
        .find(|r| &r.fingerprint == fingerprint)
}

/// Prior active record with the same filename but different content, if any.
pub fn is_conflicting_reload<'a>(
    prior: &'a PriorMatches,
    fingerprint: &Fingerprint,
) -> Option<&'a IngestionRecord> {
    prior
        .by_filename
        .iter()
        .find(|r| &r.fingerprint != fingerprint)
}

/// Decide what to do with a file given its prior matches.
///
/// Precedence: no match admits; `replace` beats `force`; without either,
/// duplicate content is reported before a filename conflict.
pub fn decide(prior: &PriorMatches, fingerprint: &Fingerprint, opts: AdmitOptions) -> Decision {
    if prior.is_empty() {
        return Decision::Admit;
    }
    if opts.replace {
        return Decision::Replace {
            priors: prior.batch_ids(),
        };
    }
    if opts.force {
        return Decision::Force {
            priors: prior.batch_ids(),
        };
    }
    if let Some(record) = is_duplicate_content(prior, fingerprint) {
        return Decision::Skip {
            batch_id: record.batch_id,
        };
    }
    if let Some(record) = is_conflicting_reload(prior, fingerprint) {
        return Decision::Conflict {
            batch_id: record.batch_id,
        };
    }
    // A filename match with identical content is also a duplicate.
    match prior.by_filename.first() {
        Some(record) => Decision::Skip {
            batch_id: record.batch_id,
        },
        None => Decision::Admit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(batch_id: i64, fp: &str, name: &str) -> IngestionRecord {
        IngestionRecord {
            batch_id,
            fingerprint: Fingerprint::from_hex(fp),
            filename: name.to_string(),
            source_path: name.to_string(),
            size_bytes: 1,
            row_count: 1,
            mode: "normal".to_string(),
            admitted_at: "2025-01-01T00:00:00Z".to_string(),
            superseded_by: None,
        }
    }

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::from_hex(s)
    }

    const NONE: AdmitOptions = AdmitOptions {
        replace: false,
        force: false,
    };
    const REPLACE: AdmitOptions = AdmitOptions {
        replace: true,
        force: false,
    };
    const FORCE: AdmitOptions = AdmitOptions {
        replace: false,
        force: true,
    };

    #[test]
    fn no_match_admits_whatever_the_flags() {
        let prior = PriorMatches::default();
        for opts in [NONE, REPLACE, FORCE] {
            assert_eq!(decide(&prior, &fp("a"), opts), Decision::Admit);
        }
    }

    #[test]
    fn content_match_under_new_name_is_skipped() {
        let prior = PriorMatches {
            by_fingerprint: vec![rec(1, "a", "old.csv")],
            by_filename: vec![],
        };
        assert_eq!(decide(&prior, &fp("a"), NONE), Decision::Skip { batch_id: 1 });
    }

    #[test]
    fn same_name_different_content_conflicts() {
        let prior = PriorMatches {
            by_fingerprint: vec![],
            by_filename: vec![rec(2, "old", "x.csv")],
        };
        assert_eq!(decide(&prior, &fp("new"), NONE), Decision::Conflict { batch_id: 2 });
    }

    #[test]
    fn duplicate_reported_before_conflict() {
        let prior = PriorMatches {
            by_fingerprint: vec![rec(1, "a", "first.csv")],
            by_filename: vec![rec(2, "b", "x.csv")],
        };
        assert_eq!(decide(&prior, &fp("a"), NONE), Decision::Skip { batch_id: 1 });
    }

    #[test]
    fn replace_covers_both_signals() {
        let prior = PriorMatches {
            by_fingerprint: vec![rec(3, "a", "y.csv")],
            by_filename: vec![rec(1, "b", "x.csv")],
        };
        assert_eq!(
            decide(&prior, &fp("a"), REPLACE),
            Decision::Replace { priors: vec![1, 3] }
        );
    }

    #[test]
    fn replace_beats_force() {
        let prior = PriorMatches {
            by_fingerprint: vec![rec(1, "a", "x.csv")],
            by_filename: vec![rec(1, "a", "x.csv")],
        };
        let both = AdmitOptions {
            replace: true,
            force: true,
        };
        assert_eq!(decide(&prior, &fp("a"), both), Decision::Replace { priors: vec![1] });
    }

    #[test]
    fn force_on_duplicate_keeps_priors() {
        let prior = PriorMatches {
            by_fingerprint: vec![rec(1, "a", "x.csv")],
            by_filename: vec![rec(1, "a", "x.csv")],
        };
        let decision = decide(&prior, &fp("a"), FORCE);
        assert_eq!(decision, Decision::Force { priors: vec![1] });
        assert!(decision.admits());
    }

    #[test]
    fn predicates_are_independent() {
        let prior = PriorMatches {
            by_fingerprint: vec![rec(1, "a", "x.csv")],
            by_filename: vec![rec(1, "a", "x.csv")],
        };
        assert!(is_duplicate_content(&prior, &fp("a")).is_some());
        assert!(is_conflicting_reload(&prior, &fp("a")).is_none());
        assert!(is_duplicate_content(&prior, &fp("z")).is_none());
        assert!(is_conflicting_reload(&prior, &fp("z")).is_some());
    }
}
