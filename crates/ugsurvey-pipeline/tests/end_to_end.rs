//! Coordinator runs from extract file to output tables

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ugsurvey_core::OutputTable;
use ugsurvey_ingest::{AdmitOptions, IngestPaths};
use ugsurvey_pipeline::{
    Coordinator, NormalizeOptions, RunMode, RunState, Scope, SummaryFileNotifier, normalize,
};
use ugsurvey_store::reference::insert_reference;
use ugsurvey_store::{ReferenceKind, Store};

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn counts(store: &Store) -> BTreeMap<OutputTable, u64> {
    store.table_counts().unwrap().into_iter().collect()
}

fn strings(store: &Store, sql: &str) -> Vec<Option<String>> {
    store
        .with_conn(|c| -> anyhow::Result<Vec<Option<String>>> {
            let mut stmt = c.prepare(sql)?;
            let rows = stmt
                .query_map([], |r| r.get(0))?
                .collect::<Result<Vec<Option<String>>, _>>()?;
            Ok(rows)
        })
        .unwrap()
}

fn coordinator(store: &Store) -> Coordinator<'_> {
    Coordinator::new(store, IngestPaths::default(), NormalizeOptions { workers: 2 })
}

fn single(path: &Path, options: AdmitOptions) -> RunMode {
    RunMode::SingleFile {
        path: path.to_path_buf(),
        options,
    }
}

#[test]
fn intl_only_row_fans_out() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    let path = write(
        dir.path(),
        "UGSurveyData_202324FA.csv",
        "student_id,term,int_exp_AYEA,int_exp_semAbroad_definition,intern_organization1,EMP_company\n\
         12345,2238,Y,Fall 2023,,\n",
    );

    let report = coordinator(&store).run(&single(&path, AdmitOptions::default()));
    assert_eq!(report.state, RunState::Done, "{}", report.summary_text());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        report.transitions,
        vec![
            RunState::Idle,
            RunState::Ingesting,
            RunState::Normalizing,
            RunState::Done
        ]
    );

    let c = counts(&store);
    assert_eq!(c[&OutputTable::Attributes], 1);
    assert_eq!(c[&OutputTable::Response], 0);
    assert_eq!(c[&OutputTable::IntlExperience], 2);
    assert_eq!(c[&OutputTable::Internship], 0);

    let labels = strings(&store, "SELECT intl_exp_type FROM ugs_intl_exp ORDER BY intl_exp_type");
    assert_eq!(
        labels,
        vec![
            Some("Academic Year Education Abroad".to_string()),
            Some("Semester Education Abroad".to_string()),
        ]
    );
    let ids = strings(&store, "SELECT DISTINCT stud_id FROM ugs_intl_exp");
    assert_eq!(ids, vec![Some("000012345".to_string())]);
    let years = strings(&store, "SELECT report_label FROM ugs_acadyear_label");
    assert_eq!(years, vec![Some("2023-24".to_string())]);
}

#[test]
fn institution_lookup_switches_at_cutover() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    store
        .with_conn(|c| -> anyhow::Result<()> {
            insert_reference(c, ReferenceKind::LegacyInstitution, &["123456AB", "Legacy College"])?;
            insert_reference(c, ReferenceKind::OrgDirectory, &["123456", "INST", "Directory University"])?;
            Ok(())
        })
        .unwrap();
    let path = write(
        dir.path(),
        "boundary.csv",
        "student_id,term,FE_college_code\n1,2164,123456\n2,2165,123456\n",
    );

    let report = coordinator(&store).run(&single(&path, AdmitOptions::default()));
    assert_eq!(report.exit_code(), 0, "{}", report.summary_text());

    let names = strings(&store, "SELECT fe_inst_nm FROM ugs_response ORDER BY term");
    assert_eq!(
        names,
        vec![
            Some("Legacy College".to_string()),
            Some("Directory University".to_string()),
        ]
    );
}

#[test]
fn rerun_leaves_identical_counts() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    let path = write(
        dir.path(),
        "a.csv",
        "student_id,term,intern_title1,intern_title2,connect_network,EMP_title\n\
         1,2238,Intern,Analyst,Y,Engineer\n\
         2,2238,,,,\n\
         3,2241,Tutor,,,\n",
    );
    let report = coordinator(&store).run(&single(&path, AdmitOptions::default()));
    assert_eq!(report.exit_code(), 0);
    let first = counts(&store);
    assert_eq!(first[&OutputTable::Internship], 3);
    assert_eq!(first[&OutputTable::Connection], 1);
    assert_eq!(first[&OutputTable::Attributes], 2, "row 2 carries no information");

    let scope = Scope::AllActive { as_of: None };
    let opts = NormalizeOptions { workers: 3 };
    normalize(&store, &scope, &opts).unwrap();
    normalize(&store, &scope, &opts).unwrap();
    assert_eq!(counts(&store), first);
}

#[test]
fn how_obtained_answers_reach_learned_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    let path = write(
        dir.path(),
        "UGSurveyData_202324SP.csv",
        "student_id,term,Have_PostGrad_Info,EMP_how_obtain_03,EMP_how_obtain_other,EMP_how_obtain_other_fill,\
         intern_count,intern1_how_obtain_01,intern2_how_obtain_04,intern3_how_obtain_02\n\
         1,2241,Y,Y,Y,Career fair,2,Y,Y,Y\n\
         2,2241,,Y,,,,,,\n",
    );
    let report = coordinator(&store).run(&single(&path, AdmitOptions::default()));
    assert_eq!(report.exit_code(), 0, "{}", report.summary_text());

    let c = counts(&store);
    assert_eq!(c[&OutputTable::JobLearned], 2);
    assert_eq!(c[&OutputTable::InternLearned], 2, "slot 3 is beyond intern_count");

    let jobs = strings(
        &store,
        "SELECT empl_lrned_abt_job FROM ugs_empl_job_lrned ORDER BY empl_lrned_abt_job_cd",
    );
    assert_eq!(
        jobs,
        vec![
            Some("EMP_how_obtain_03".to_string()),
            Some("Other: Career fair".to_string()),
        ]
    );
    let interns = strings(
        &store,
        "SELECT intern_lrned_abt FROM ugs_intern_lrned ORDER BY intern_nbr",
    );
    assert_eq!(
        interns,
        vec![
            Some("Internship obtained via option 01".to_string()),
            Some("Internship obtained via option 04".to_string()),
        ]
    );

    normalize(&store, &Scope::AllActive { as_of: None }, &NormalizeOptions::default()).unwrap();
    assert_eq!(counts(&store), c);
}

#[test]
fn failed_ingestion_never_normalizes() {
    let dir = tempfile::tempdir().unwrap();
    let quarantine = dir.path().join("quarantine");
    let store = Store::open_in_memory().unwrap();
    let path = write(dir.path(), "bad.csv", "student_id,term\n1,\n");
    let paths = IngestPaths {
        archive_dir: None,
        quarantine_dir: Some(quarantine.clone()),
    };

    let report = Coordinator::new(&store, paths, NormalizeOptions::default())
        .run(&single(&path, AdmitOptions::default()));
    assert_eq!(report.state, RunState::Failed);
    assert_eq!(
        report.transitions,
        vec![RunState::Idle, RunState::Ingesting, RunState::Failed]
    );
    assert!(report.normalize.is_none());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.counts.quarantined, 1);
    assert_eq!(report.failures[0].stage, RunState::Ingesting);
    assert_eq!(report.failures[0].kind, "malformed-input");
    assert!(report.summary_text().contains("bad.csv"));
    assert!(quarantine.join("bad.csv").exists());
}

#[test]
fn duplicate_run_succeeds_with_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    let path = write(dir.path(), "a.csv", "student_id,term,int_exp_none\n1,2238,Y\n");
    let c = coordinator(&store);
    assert_eq!(c.run(&single(&path, AdmitOptions::default())).exit_code(), 0);

    let again = c.run(&single(&path, AdmitOptions::default()));
    assert_eq!(again.state, RunState::Done);
    assert_eq!(again.counts.skipped, 1);
    assert_eq!(again.counts.admitted, 0);
    assert!(again.normalize.is_none());
}

#[test]
fn replace_leaves_only_second_version() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    let path = write(dir.path(), "x.csv", "student_id,term,int_exp_AYEA\n1,2238,Y\n2,2238,Y\n");
    let c = coordinator(&store);
    assert_eq!(c.run(&single(&path, AdmitOptions::default())).exit_code(), 0);

    fs::write(&path, "student_id,term,int_exp_embedded\n3,2241,Y\n").unwrap();
    let conflict = c.run(&single(&path, AdmitOptions::default()));
    assert_eq!(conflict.state, RunState::Failed);
    assert_eq!(conflict.failures[0].kind, "conflicting-reload");

    let replace = AdmitOptions {
        replace: true,
        force: false,
    };
    let report = c.run(&single(&path, replace));
    assert_eq!(report.exit_code(), 0, "{}", report.summary_text());

    let ids = strings(&store, "SELECT stud_id FROM ugs_stud_attr ORDER BY stud_id");
    assert_eq!(ids, vec![Some("000000003".to_string())]);
    let labels = strings(&store, "SELECT intl_exp_type FROM ugs_intl_exp");
    assert_eq!(labels, vec![Some("Embedded Course Abroad".to_string())]);
}

#[test]
fn forced_duplicate_keeps_one_output_set() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    let path = write(dir.path(), "x.csv", "student_id,term,int_exp_AYEA\n1,2238,Y\n");
    let c = coordinator(&store);
    c.run(&single(&path, AdmitOptions::default()));

    let force = AdmitOptions {
        replace: false,
        force: true,
    };
    let report = c.run(&single(&path, force));
    assert_eq!(report.exit_code(), 0);

    let staged = store
        .with_conn(|c| -> anyhow::Result<i64> {
            Ok(c.query_row("SELECT count(*) FROM staged_row", [], |r| r.get(0))?)
        })
        .unwrap();
    assert_eq!(staged, 2);
    let c = counts(&store);
    assert_eq!(c[&OutputTable::Attributes], 1);
    assert_eq!(c[&OutputTable::IntlExperience], 1);
}

#[test]
fn periodic_run_isolates_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let incoming = dir.path().join("incoming");
    fs::create_dir_all(&incoming).unwrap();
    write(&incoming, "UGSurveyData_1.csv", "student_id,term,int_exp_AYEA\n1,2238,Y\n");
    write(&incoming, "UGSurveyData_2.csv", "student_id,term\n");
    write(&incoming, "UGSurveyData_3.csv", "student_id,term,int_exp_AYEA\n2,2241,Y\n");
    write(&incoming, "notes.txt", "ignored");
    let summaries = dir.path().join("summaries");

    let report = coordinator(&store_for(&dir))
        .with_notifier(Box::new(SummaryFileNotifier::new(&summaries)))
        .run(&RunMode::Periodic {
            incoming_dir: incoming.clone(),
            pattern: "UGSurveyData_*.csv".to_string(),
            as_of: None,
        });

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.exit_code(), 1, "a failed file fails the run");
    assert_eq!(report.counts.admitted, 2);
    assert_eq!(report.counts.quarantined, 1);
    let normalized = report.normalize.as_ref().unwrap();
    assert_eq!(normalized.staged_rows, 2);
    assert_eq!(report.files[1].file, "UGSurveyData_2.csv");
    assert_eq!(report.files[1].status, "quarantined");

    let written: Vec<_> = fs::read_dir(&summaries).unwrap().collect();
    assert_eq!(written.len(), 1);
}

#[test]
fn periodic_run_without_incoming_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in_memory().unwrap();
    let report = coordinator(&store).run(&RunMode::Periodic {
        incoming_dir: dir.path().join("missing"),
        pattern: "*.csv".to_string(),
        as_of: None,
    });
    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.failures[0].stage, RunState::Ingesting);
    assert!(report.normalize.is_none());
}

fn store_for(dir: &tempfile::TempDir) -> Store {
    Store::open(&dir.path().join("db").join("ugsurvey.duckdb")).unwrap()
}
