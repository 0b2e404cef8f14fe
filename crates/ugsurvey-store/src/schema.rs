//! DDL for the sink.
//!
//! Output tables carry no key constraints: DuckDB checks them eagerly, so a
//! delete-then-insert of the same key inside one transaction would fail.
//! Key uniqueness is enforced by the write path instead.

/// Bookkeeping: batch sequence, source-file log, ingestion records,
/// fingerprint claims and staged rows.
pub fn create_bookkeeping() -> &'static str {
    "CREATE SEQUENCE IF NOT EXISTS batch_id_seq START 1;

     CREATE TABLE IF NOT EXISTS source_file (
         fingerprint  VARCHAR NOT NULL,
         filename     VARCHAR NOT NULL,
         source_path  VARCHAR NOT NULL,
         size_bytes   BIGINT  NOT NULL,
         row_count    BIGINT,
         survey_type  VARCHAR,
         term_label   VARCHAR,
         outcome      VARCHAR NOT NULL,
         batch_id     BIGINT,
         detail       VARCHAR,
         seen_at      VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ingestion_record (
         batch_id      BIGINT  NOT NULL,
         fingerprint   VARCHAR NOT NULL,
         filename      VARCHAR NOT NULL,
         source_path   VARCHAR NOT NULL,
         size_bytes    BIGINT  NOT NULL,
         row_count     BIGINT  NOT NULL,
         mode          VARCHAR NOT NULL,
         admitted_at   VARCHAR NOT NULL,
         superseded_by BIGINT
     );

     CREATE TABLE IF NOT EXISTS fingerprint_claim (
         fingerprint VARCHAR PRIMARY KEY,
         batch_id    BIGINT NOT NULL
     );

     CREATE TABLE IF NOT EXISTS staged_row (
         batch_id BIGINT  NOT NULL,
         row_num  BIGINT  NOT NULL,
         stud_id  VARCHAR NOT NULL,
         term     VARCHAR NOT NULL,
         fields   VARCHAR NOT NULL
     );"
}

/// Reference tables consulted by the lookup resolver.
pub fn create_reference() -> &'static str {
    "CREATE TABLE IF NOT EXISTS ref_company (
         variant      VARCHAR NOT NULL,
         standardized VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ref_country (
         code        VARCHAR NOT NULL,
         description VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ref_state (
         country_code VARCHAR NOT NULL,
         code         VARCHAR NOT NULL,
         description  VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ref_legacy_institution (
         code VARCHAR NOT NULL,
         name VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ref_org_directory (
         org_id   VARCHAR NOT NULL,
         org_type VARCHAR NOT NULL,
         name     VARCHAR NOT NULL
     );"
}

/// The normalized output tables plus the academic-year dimension.
pub fn create_output() -> &'static str {
    "CREATE TABLE IF NOT EXISTS ugs_stud_attr (
         stud_id                 VARCHAR NOT NULL,
         term                    VARCHAR NOT NULL,
         acad_year               INTEGER,
         invalid_term_indc       VARCHAR NOT NULL,
         intern_numb             INTEGER,
         coltn_mthd              VARCHAR,
         indc_have_information   VARCHAR,
         post_graduation_stat_cd INTEGER,
         post_graduation_stat    VARCHAR,
         post_graduation_other   VARCHAR,
         indc_intern             VARCHAR,
         indc_intl_exp           VARCHAR,
         indc_ug_rsrch           VARCHAR,
         indc_job_asst           VARCHAR,
         indc_conn_to_inst       VARCHAR,
         indc_ft_empl            VARCHAR,
         indc_pt_empl            VARCHAR,
         indc_any_empl           VARCHAR,
         indc_fut_edu            VARCHAR,
         indc_fell               VARCHAR,
         indc_post_intern_resid  VARCHAR,
         indc_still_seeking      VARCHAR,
         indc_mil                VARCHAR,
         indc_entre              VARCHAR,
         indc_other_plans        VARCHAR,
         batch_id                BIGINT  NOT NULL,
         load_date               VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ugs_response (
         stud_id             VARCHAR NOT NULL,
         term                VARCHAR NOT NULL,
         ps_commitment       VARCHAR,
         ps_commitment_def   VARCHAR,
         ps_commitment_other VARCHAR,
         fs_program          VARCHAR,
         fs_city             VARCHAR,
         fs_state            VARCHAR,
         fs_country          VARCHAR,
         fe_type             VARCHAR,
         fe_type_def         VARCHAR,
         fe_college          VARCHAR,
         fe_inst_cd          VARCHAR,
         fe_inst_nm          VARCHAR,
         fe_stage            VARCHAR,
         fe_program          VARCHAR,
         emp_month           VARCHAR,
         emp_year            VARCHAR,
         offers_count        VARCHAR,
         emp_co_nm           VARCHAR,
         emp_dept            VARCHAR,
         emp_title           VARCHAR,
         emp_relate          VARCHAR,
         emp_city            VARCHAR,
         emp_state           VARCHAR,
         emp_country         VARCHAR,
         emp_salary          VARCHAR,
         emp_bonus_amount    VARCHAR,
         emp_relocate_amount VARCHAR,
         emp_functional      VARCHAR,
         batch_id            BIGINT  NOT NULL,
         load_date           VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ugs_intl_exp (
         stud_id         VARCHAR NOT NULL,
         term            VARCHAR NOT NULL,
         intl_exp_type   VARCHAR NOT NULL,
         intl_exp_detail VARCHAR,
         batch_id        BIGINT  NOT NULL,
         load_date       VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ugs_intern (
         stud_id               VARCHAR  NOT NULL,
         term                  VARCHAR  NOT NULL,
         intern_numb           UTINYINT NOT NULL,
         intern_co_nm          VARCHAR,
         intern_dept           VARCHAR,
         intern_job_title      VARCHAR,
         indc_intern_paid      VARCHAR,
         intern_amt_paid       VARCHAR,
         intern_country        VARCHAR,
         intern_state          VARCHAR,
         intern_province       VARCHAR,
         intern_college_credit VARCHAR,
         intern_semesters      INTEGER,
         batch_id              BIGINT   NOT NULL,
         load_date             VARCHAR  NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ugs_conn_to_inst (
         stud_id      VARCHAR NOT NULL,
         term         VARCHAR NOT NULL,
         conn_to_inst VARCHAR NOT NULL,
         batch_id     BIGINT  NOT NULL,
         load_date    VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ugs_empl_job_lrned (
         stud_id               VARCHAR NOT NULL,
         term                  VARCHAR NOT NULL,
         empl_lrned_abt_job_cd INTEGER NOT NULL,
         empl_lrned_abt_job    VARCHAR NOT NULL,
         batch_id              BIGINT  NOT NULL,
         load_date             VARCHAR NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ugs_intern_lrned (
         stud_id             VARCHAR  NOT NULL,
         term                VARCHAR  NOT NULL,
         intern_nbr          UTINYINT NOT NULL,
         intern_lrned_abt_cd INTEGER  NOT NULL,
         intern_lrned_abt    VARCHAR  NOT NULL,
         batch_id            BIGINT   NOT NULL,
         load_date           VARCHAR  NOT NULL
     );

     CREATE TABLE IF NOT EXISTS ugs_acadyear_label (
         term         VARCHAR NOT NULL,
         acad_year    INTEGER NOT NULL,
         report_label VARCHAR NOT NULL
     );"
}
