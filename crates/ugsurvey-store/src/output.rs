//! Replace-by-key writes of normalized output

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use duckdb::{Connection, params};
use ugsurvey_core::{AcadYearLabel, NormalizedOutputRow, OutputTable, RowKey};

/// Rows removed and inserted by one output write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub deleted: usize,
    pub orphans_deleted: usize,
    pub inserted: usize,
}

/// Replace all output for `keys` with `rows`.
///
/// Every output table loses its rows for the given keys, and rows whose
/// producing batch no longer has staged rows are dropped, before the new
/// rows are inserted. Call inside a transaction: a partial write must never
/// be committed.
pub fn replace_output(
    conn: &Connection,
    keys: &BTreeSet<RowKey>,
    rows: &[NormalizedOutputRow],
    load_date: &str,
) -> Result<WriteCounts> {
    let mut counts = WriteCounts::default();

    conn.execute_batch(
        "CREATE OR REPLACE TEMP TABLE norm_keys (stud_id VARCHAR NOT NULL, term VARCHAR NOT NULL)",
    )
    .context("failed to create key table")?;
    {
        let mut stmt = conn.prepare("INSERT INTO norm_keys VALUES (?, ?)")?;
        for key in keys {
            stmt.execute(params![key.stud_id, key.term.as_str()])
                .context("failed to stage output key")?;
        }
    }

    for table in OutputTable::ALL {
        counts.deleted += conn
            .execute(
                &format!(
                    "DELETE FROM {table} WHERE EXISTS (
                         SELECT 1 FROM norm_keys k
                         WHERE k.stud_id = {table}.stud_id AND k.term = {table}.term
                     )"
                ),
                [],
            )
            .with_context(|| format!("failed to clear {table} for rerun"))?;
        counts.orphans_deleted += conn
            .execute(
                &format!(
                    "DELETE FROM {table} WHERE batch_id NOT IN (SELECT DISTINCT batch_id FROM staged_row)"
                ),
                [],
            )
            .with_context(|| format!("failed to drop orphaned rows from {table}"))?;
    }
    conn.execute_batch("DROP TABLE norm_keys")
        .context("failed to drop key table")?;

    for row in rows {
        insert_row(conn, row, load_date)?;
        counts.inserted += 1;
    }
    Ok(counts)
}

fn insert_row(conn: &Connection, row: &NormalizedOutputRow, load_date: &str) -> Result<()> {
    let table = row.table();
    let result = match row {
        NormalizedOutputRow::Attributes { batch_id, row: r } => conn.execute(
            "INSERT INTO ugs_stud_attr VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                r.stud_id,
                r.term,
                r.acad_year,
                r.invalid_term_indc,
                r.intern_numb,
                r.coltn_mthd,
                r.indc_have_information,
                r.post_graduation_stat_cd,
                r.post_graduation_stat,
                r.post_graduation_other,
                r.indc_intern,
                r.indc_intl_exp,
                r.indc_ug_rsrch,
                r.indc_job_asst,
                r.indc_conn_to_inst,
                r.indc_ft_empl,
                r.indc_pt_empl,
                r.indc_any_empl,
                r.indc_fut_edu,
                r.indc_fell,
                r.indc_post_intern_resid,
                r.indc_still_seeking,
                r.indc_mil,
                r.indc_entre,
                r.indc_other_plans,
                batch_id,
                load_date,
            ],
        ),
        NormalizedOutputRow::Response { batch_id, row: r } => conn.execute(
            "INSERT INTO ugs_response VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                r.stud_id,
                r.term,
                r.ps_commitment,
                r.ps_commitment_def,
                r.ps_commitment_other,
                r.fs_program,
                r.fs_city,
                r.fs_state,
                r.fs_country,
                r.fe_type,
                r.fe_type_def,
                r.fe_college,
                r.fe_inst_cd,
                r.fe_inst_nm,
                r.fe_stage,
                r.fe_program,
                r.emp_month,
                r.emp_year,
                r.offers_count,
                r.emp_co_nm,
                r.emp_dept,
                r.emp_title,
                r.emp_relate,
                r.emp_city,
                r.emp_state,
                r.emp_country,
                r.emp_salary,
                r.emp_bonus_amount,
                r.emp_relocate_amount,
                r.emp_functional,
                batch_id,
                load_date,
            ],
        ),
        NormalizedOutputRow::IntlExperience { batch_id, row: r } => conn.execute(
            "INSERT INTO ugs_intl_exp VALUES (?, ?, ?, ?, ?, ?)",
            params![
                r.stud_id,
                r.term,
                r.intl_exp_type,
                r.intl_exp_detail,
                batch_id,
                load_date
            ],
        ),
        NormalizedOutputRow::Internship { batch_id, row: r } => conn.execute(
            "INSERT INTO ugs_intern VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                r.stud_id,
                r.term,
                r.intern_numb,
                r.intern_co_nm,
                r.intern_dept,
                r.intern_job_title,
                r.indc_intern_paid,
                r.intern_amt_paid,
                r.intern_country,
                r.intern_state,
                r.intern_province,
                r.intern_college_credit,
                r.intern_semesters,
                batch_id,
                load_date,
            ],
        ),
        NormalizedOutputRow::Connection { batch_id, row: r } => conn.execute(
            "INSERT INTO ugs_conn_to_inst VALUES (?, ?, ?, ?, ?)",
            params![r.stud_id, r.term, r.conn_to_inst, batch_id, load_date],
        ),
        NormalizedOutputRow::JobLearned { batch_id, row: r } => conn.execute(
            "INSERT INTO ugs_empl_job_lrned VALUES (?, ?, ?, ?, ?, ?)",
            params![
                r.stud_id,
                r.term,
                r.empl_lrned_abt_job_cd,
                r.empl_lrned_abt_job,
                batch_id,
                load_date
            ],
        ),
        NormalizedOutputRow::InternLearned { batch_id, row: r } => conn.execute(
            "INSERT INTO ugs_intern_lrned VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                r.stud_id,
                r.term,
                r.intern_nbr,
                r.intern_lrned_abt_cd,
                r.intern_lrned_abt,
                batch_id,
                load_date
            ],
        ),
    };
    result.with_context(|| {
        let key = row.key();
        format!("failed to insert {table} row for {} {}", key.stud_id, key.term)
    })?;
    Ok(())
}

/// Add academic-year labels for terms not yet in the dimension. Existing
/// terms are left untouched. Returns the number of labels added.
pub fn insert_new_acadyear_labels(conn: &Connection, labels: &[AcadYearLabel]) -> Result<usize> {
    let mut added = 0;
    for label in labels {
        added += conn
            .execute(
                "INSERT INTO ugs_acadyear_label
                 SELECT ?::VARCHAR, ?::INTEGER, ?::VARCHAR WHERE NOT EXISTS (SELECT 1 FROM ugs_acadyear_label WHERE term = ?)",
                params![label.term, label.acad_year, label.report_label, label.term],
            )
            .with_context(|| format!("failed to add academic year label for {}", label.term))?;
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use ugsurvey_core::{
        ConnectionRow, InternLearnedRow, IntlExperienceRow, JobLearnedRow, StagedRow, Term,
    };

    fn key(stud_id: &str) -> RowKey {
        RowKey {
            stud_id: stud_id.to_string(),
            term: Term::new("2238"),
        }
    }

    fn intl(stud_id: &str, label: &str, batch_id: i64) -> NormalizedOutputRow {
        NormalizedOutputRow::IntlExperience {
            batch_id,
            row: IntlExperienceRow {
                stud_id: stud_id.to_string(),
                term: "2238".to_string(),
                intl_exp_type: label.to_string(),
                intl_exp_detail: None,
            },
        }
    }

    fn stage(store: &Store, batch_id: i64, stud_id: &str) {
        let row = StagedRow {
            batch_id,
            row_num: 1,
            stud_id: stud_id.to_string(),
            term: Term::new("2238"),
            fields: Default::default(),
        };
        store
            .transaction(|tx| crate::staging::insert_rows(tx, &[row]))
            .unwrap();
    }

    fn count(store: &Store, table: &str) -> i64 {
        store
            .with_conn(|c| {
                c.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
                    .map_err(anyhow::Error::from)
            })
            .unwrap()
    }

    #[test]
    fn rerun_replaces_instead_of_appending() {
        let store = Store::open_in_memory().unwrap();
        stage(&store, 1, "000000001");
        let keys = BTreeSet::from([key("000000001")]);
        let rows = vec![intl("000000001", "Semester Education Abroad", 1)];

        for _ in 0..2 {
            store
                .transaction(|tx| replace_output(tx, &keys, &rows, "2025-01-01T00:00:00Z"))
                .unwrap();
        }
        assert_eq!(count(&store, "ugs_intl_exp"), 1);
    }

    #[test]
    fn keys_not_in_scope_survive() {
        let store = Store::open_in_memory().unwrap();
        stage(&store, 1, "000000001");
        stage(&store, 1, "000000002");
        let both = BTreeSet::from([key("000000001"), key("000000002")]);
        let rows = vec![
            intl("000000001", "A", 1),
            NormalizedOutputRow::Connection {
                batch_id: 1,
                row: ConnectionRow {
                    stud_id: "000000002".to_string(),
                    term: "2238".to_string(),
                    conn_to_inst: "Mentor".to_string(),
                },
            },
        ];
        store
            .transaction(|tx| replace_output(tx, &both, &rows, "t"))
            .unwrap();

        // Re-normalize only the first key with no output: second stays.
        let first = BTreeSet::from([key("000000001")]);
        let counts = store
            .transaction(|tx| replace_output(tx, &first, &[], "t"))
            .unwrap();
        assert_eq!(counts.deleted, 1);
        assert_eq!(count(&store, "ugs_intl_exp"), 0);
        assert_eq!(count(&store, "ugs_conn_to_inst"), 1);
    }

    #[test]
    fn learned_rows_are_replaced_by_key() {
        let store = Store::open_in_memory().unwrap();
        stage(&store, 1, "000000001");
        let keys = BTreeSet::from([key("000000001")]);
        let rows = vec![
            NormalizedOutputRow::JobLearned {
                batch_id: 1,
                row: JobLearnedRow {
                    stud_id: "000000001".to_string(),
                    term: "2238".to_string(),
                    empl_lrned_abt_job_cd: 99,
                    empl_lrned_abt_job: "Other: Career fair".to_string(),
                },
            },
            NormalizedOutputRow::InternLearned {
                batch_id: 1,
                row: InternLearnedRow {
                    stud_id: "000000001".to_string(),
                    term: "2238".to_string(),
                    intern_nbr: 2,
                    intern_lrned_abt_cd: 4,
                    intern_lrned_abt: "Internship obtained via option 04".to_string(),
                },
            },
        ];
        for _ in 0..2 {
            store
                .transaction(|tx| replace_output(tx, &keys, &rows, "t"))
                .unwrap();
        }
        assert_eq!(count(&store, "ugs_empl_job_lrned"), 1);
        assert_eq!(count(&store, "ugs_intern_lrned"), 1);

        let counts = store
            .transaction(|tx| replace_output(tx, &keys, &[], "t"))
            .unwrap();
        assert_eq!(counts.deleted, 2);
    }

    #[test]
    fn orphaned_batches_are_dropped() {
        let store = Store::open_in_memory().unwrap();
        stage(&store, 1, "000000001");
        store
            .transaction(|tx| {
                replace_output(tx, &BTreeSet::from([key("000000001")]), &[intl("000000001", "A", 1)], "t")
            })
            .unwrap();
        store
            .transaction(|tx| crate::staging::delete_batches(tx, &[1]))
            .unwrap();
        stage(&store, 2, "000000009");

        let counts = store
            .transaction(|tx| {
                replace_output(tx, &BTreeSet::from([key("000000009")]), &[intl("000000009", "B", 2)], "t")
            })
            .unwrap();
        assert_eq!(counts.orphans_deleted, 1);
        assert_eq!(count(&store, "ugs_intl_exp"), 1);
    }

    #[test]
    fn acadyear_labels_insert_only_new_terms() {
        let store = Store::open_in_memory().unwrap();
        let label = AcadYearLabel::from_term(&Term::new("2238")).unwrap();
        assert_eq!(
            store
                .transaction(|tx| insert_new_acadyear_labels(tx, &[label.clone()]))
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .transaction(|tx| insert_new_acadyear_labels(tx, &[label]))
                .unwrap(),
            0
        );
        assert_eq!(count(&store, "ugs_acadyear_label"), 1);
    }
}
