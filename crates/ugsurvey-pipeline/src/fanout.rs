//! Fan-out of one staged wide row into narrow output rows

use ugsurvey_core::{
    AttributesRow, ConnectionRow, InternLearnedRow, InternshipRow, IntlExperienceRow,
    JobLearnedRow, NormalizedOutputRow, ResponseRow, StagedRow,
};

use crate::classify::{CategoryGroup, classify, matching_rules, post_graduation_code};
use crate::resolve::Resolver;

/// Internship slots carried by an extract.
pub const INTERN_SLOTS: [u8; 3] = [1, 2, 3];

const COLLECTION_METHOD_MAX: usize = 50;

/// Numbered "how did you learn about it" options, coded 1..=14.
const HOW_OBTAIN_OPTIONS: u8 = 14;

/// Code of the free-text "Other" option.
pub const HOW_OBTAIN_OTHER_CD: i32 = 99;

const LEARNED_DESC_MAX: usize = 300;

/// Source columns of the response table. A row with none of them populated
/// produces no response row.
pub const RESPONSE_COLUMNS: &[&str] = &[
    "PS_committment",
    "ps_committment_definition",
    "PS_committment_other",
    "FS_program",
    "FS_city",
    "FS_state",
    "FS_country",
    "FE_type",
    "FE_type_definition",
    "FE_college",
    "FE_college_code",
    "FE_stage",
    "FE_program",
    "EMP_Month",
    "EMP_Year",
    "offers_count",
    "EMP_company",
    "EMP_department",
    "EMP_title",
    "EMP_relate",
    "EMP_city",
    "EMP_state",
    "EMP_country",
    "EMP_salary",
    "EMP_bonus_amount",
    "EMP_relocate_amount",
    "EMP_functional",
];

/// Every output row produced by `row`.
///
/// Pure: depends only on the row and the resolver, never on other rows.
pub fn fan_out(row: &StagedRow, resolver: &Resolver) -> Vec<NormalizedOutputRow> {
    let batch_id = row.batch_id;
    let mut out = Vec::new();

    if let Some(attr) = attributes(row) {
        out.push(NormalizedOutputRow::Attributes { batch_id, row: attr });
    }
    if let Some(resp) = response(row, resolver) {
        out.push(NormalizedOutputRow::Response { batch_id, row: resp });
    }
    out.extend(
        intl_experience(row)
            .into_iter()
            .map(|r| NormalizedOutputRow::IntlExperience { batch_id, row: r }),
    );
    out.extend(
        internships(row, resolver)
            .into_iter()
            .map(|r| NormalizedOutputRow::Internship { batch_id, row: r }),
    );
    if let Some(conn) = connection(row) {
        out.push(NormalizedOutputRow::Connection { batch_id, row: conn });
    }
    out.extend(
        job_learned(row)
            .into_iter()
            .map(|r| NormalizedOutputRow::JobLearned { batch_id, row: r }),
    );
    out.extend(
        intern_learned(row)
            .into_iter()
            .map(|r| NormalizedOutputRow::InternLearned { batch_id, row: r }),
    );
    out
}

fn text(row: &StagedRow, col: &str) -> Option<String> {
    row.field(col).map(str::to_string)
}

fn int(row: &StagedRow, col: &str) -> Option<i32> {
    row.field(col).and_then(|v| v.parse().ok())
}

/// Option column is ticked: populated and not `0`, `N`, `No` or `None`.
fn selected(row: &StagedRow, col: &str) -> bool {
    row.field(col).is_some_and(|v| {
        !["0", "N", "NO", "NONE"]
            .iter()
            .any(|neg| v.eq_ignore_ascii_case(neg))
    })
}

/// `base`, followed by `: {fill}` when the free-text column is populated.
fn other_description(row: &StagedRow, base: &str, fill_col: &str) -> String {
    let desc = match row.field(fill_col) {
        Some(fill) => format!("{base}: {fill}"),
        None => base.to_string(),
    };
    desc.chars().take(LEARNED_DESC_MAX).collect()
}

/// Collapse yes/no spellings to `Y`/`N`. Anything else keeps its first
/// character, uppercased.
pub fn yes_no(value: Option<&str>) -> Option<String> {
    let v = value?.trim().to_ascii_uppercase();
    match v.as_str() {
        "" => None,
        "Y" | "YES" | "TRUE" | "T" | "1" => Some("Y".to_string()),
        "N" | "NO" | "FALSE" | "F" | "0" => Some("N".to_string()),
        _ => v.chars().next().map(String::from),
    }
}

pub fn attributes(row: &StagedRow) -> Option<AttributesRow> {
    if !row.has_information() {
        return None;
    }
    Some(AttributesRow {
        stud_id: row.stud_id.clone(),
        term: row.term.as_str().to_string(),
        acad_year: row.term.academic_year(),
        invalid_term_indc: if row.term.is_valid() { "N" } else { "Y" }.to_string(),
        intern_numb: int(row, "intern_count"),
        coltn_mthd: row
            .field("collection_method")
            .map(|v| v.chars().take(COLLECTION_METHOD_MAX).collect()),
        indc_have_information: text(row, "Have_PostGrad_Info"),
        post_graduation_stat_cd: post_graduation_code(row),
        post_graduation_stat: text(row, "plans_cleaned_definition"),
        post_graduation_other: text(row, "plans_other"),
        indc_intern: text(row, "indicator_internship"),
        indc_intl_exp: text(row, "indicator_international_experience"),
        indc_ug_rsrch: text(row, "indicator_undergrad_research"),
        indc_job_asst: text(row, "connect_assist"),
        indc_conn_to_inst: text(row, "indicator_stay_connected_PSU"),
        indc_ft_empl: text(row, "indicator_fulltime_employment"),
        indc_pt_empl: text(row, "indicator_parttime_employment"),
        indc_any_empl: text(row, "indicator_any_employment"),
        indc_fut_edu: text(row, "indicator_further_education"),
        indc_fell: text(row, "indicator_fellowship"),
        indc_post_intern_resid: text(row, "indicator_post_intern_residency"),
        indc_still_seeking: text(row, "indicator_still_seeking"),
        indc_mil: text(row, "indicator_military"),
        indc_entre: text(row, "indicator_entrepreneurship"),
        indc_other_plans: text(row, "indicator_other_plans"),
    })
}

pub fn response(row: &StagedRow, resolver: &Resolver) -> Option<ResponseRow> {
    if !RESPONSE_COLUMNS.iter().any(|c| row.is_populated(c)) {
        return None;
    }
    let resolve_in = |state_col: &str, country_col: &str| {
        row.field(state_col)
            .and_then(|s| resolver.state_in(s, row.field(country_col)))
    };
    let fe_inst_cd = text(row, "FE_college_code");
    Some(ResponseRow {
        stud_id: row.stud_id.clone(),
        term: row.term.as_str().to_string(),
        ps_commitment: text(row, "PS_committment"),
        ps_commitment_def: text(row, "ps_committment_definition"),
        ps_commitment_other: text(row, "PS_committment_other"),
        fs_program: text(row, "FS_program"),
        fs_city: text(row, "FS_city"),
        fs_state: resolve_in("FS_state", "FS_country"),
        fs_country: row.field("FS_country").and_then(|c| resolver.country(c)),
        fe_type: text(row, "FE_type"),
        fe_type_def: text(row, "FE_type_definition"),
        fe_college: text(row, "FE_college"),
        fe_inst_nm: fe_inst_cd
            .as_deref()
            .and_then(|code| resolver.institution(code, &row.term)),
        fe_inst_cd,
        fe_stage: text(row, "FE_stage"),
        fe_program: text(row, "FE_program"),
        emp_month: text(row, "EMP_Month"),
        emp_year: text(row, "EMP_Year"),
        offers_count: text(row, "offers_count"),
        emp_co_nm: row.field("EMP_company").and_then(|c| resolver.company(c)),
        emp_dept: text(row, "EMP_department"),
        emp_title: text(row, "EMP_title"),
        emp_relate: text(row, "EMP_relate"),
        emp_city: text(row, "EMP_city"),
        emp_state: resolve_in("EMP_state", "EMP_country"),
        emp_country: row.field("EMP_country").and_then(|c| resolver.country(c)),
        emp_salary: text(row, "EMP_salary"),
        emp_bonus_amount: text(row, "EMP_bonus_amount"),
        emp_relocate_amount: text(row, "EMP_relocate_amount"),
        emp_functional: text(row, "EMP_functional"),
    })
}

/// One row per international-experience label, with the free text that
/// came with it.
pub fn intl_experience(row: &StagedRow) -> Vec<IntlExperienceRow> {
    matching_rules(row, CategoryGroup::IntlExperience)
        .into_iter()
        .map(|rule| IntlExperienceRow {
            stud_id: row.stud_id.clone(),
            term: row.term.as_str().to_string(),
            intl_exp_type: rule.label.to_string(),
            intl_exp_detail: rule.predicate.text_column().and_then(|c| text(row, c)),
        })
        .collect()
}

/// Populated internship slots. Each slot is judged on its own.
pub fn internships(row: &StagedRow, resolver: &Resolver) -> Vec<InternshipRow> {
    INTERN_SLOTS
        .iter()
        .filter_map(|&n| internship(row, resolver, n))
        .collect()
}

fn internship(row: &StagedRow, resolver: &Resolver, n: u8) -> Option<InternshipRow> {
    let col = |name: &str| format!("{name}{n}");
    let org = row.field(&col("intern_organization"));
    let unit = text(row, &col("intern_unit"));
    let title = text(row, &col("intern_title"));
    if org.is_none() && unit.is_none() && title.is_none() {
        return None;
    }
    let country = row.field(&col("intern_country"));
    Some(InternshipRow {
        stud_id: row.stud_id.clone(),
        term: row.term.as_str().to_string(),
        intern_numb: n,
        intern_co_nm: org.and_then(|o| resolver.company(o)),
        intern_dept: unit,
        intern_job_title: title,
        indc_intern_paid: yes_no(row.field(&col("intern_paid"))),
        intern_amt_paid: text(row, &col("intern_paid_amt")),
        intern_country: country.and_then(|c| resolver.country(c)),
        intern_state: row
            .field(&col("intern_state"))
            .and_then(|s| resolver.state_in(s, country)),
        intern_province: text(row, &col("intern_province")),
        intern_college_credit: yes_no(row.field(&col("intern_college_credit"))),
        intern_semesters: int(row, &col("intern_semesters")),
    })
}

/// How the respondent learned about their job, one row per ticked option.
/// Only rows that answered the post-graduation section are considered.
pub fn job_learned(row: &StagedRow) -> Vec<JobLearnedRow> {
    if !row.is_populated("Have_PostGrad_Info") {
        return Vec::new();
    }
    let make = |code: i32, desc: String| JobLearnedRow {
        stud_id: row.stud_id.clone(),
        term: row.term.as_str().to_string(),
        empl_lrned_abt_job_cd: code,
        empl_lrned_abt_job: desc,
    };
    let mut out: Vec<_> = (1..=HOW_OBTAIN_OPTIONS)
        .map(|i| format!("EMP_how_obtain_{i:02}"))
        .zip(1..)
        .filter(|(col, _)| selected(row, col))
        .map(|(col, code)| make(code, col))
        .collect();
    if selected(row, "EMP_how_obtain_other") {
        let desc = other_description(row, "Other", "EMP_how_obtain_other_fill");
        out.push(make(HOW_OBTAIN_OTHER_CD, desc));
    }
    out
}

/// How the respondent found each internship, one row per ticked option.
///
/// Slot `n` is read only when `intern_count` is at least `n`; a missing,
/// unparseable or non-positive count gives no rows.
pub fn intern_learned(row: &StagedRow) -> Vec<InternLearnedRow> {
    let count = row
        .field("intern_count")
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v.trunc() as i64)
        .unwrap_or(0);
    let mut out = Vec::new();
    for n in INTERN_SLOTS.iter().copied().filter(|&n| i64::from(n) <= count) {
        let make = |code: i32, desc: String| InternLearnedRow {
            stud_id: row.stud_id.clone(),
            term: row.term.as_str().to_string(),
            intern_nbr: n,
            intern_lrned_abt_cd: code,
            intern_lrned_abt: desc,
        };
        for i in 1..=HOW_OBTAIN_OPTIONS {
            if selected(row, &format!("intern{n}_how_obtain_{i:02}")) {
                out.push(make(
                    i32::from(i),
                    format!("Internship obtained via option {i:02}"),
                ));
            }
        }
        if selected(row, &format!("intern{n}_how_obtain_other")) {
            let desc = other_description(
                row,
                "Internship obtained via Other",
                &format!("intern{n}_how_obtain_other_fill"),
            );
            out.push(make(HOW_OBTAIN_OTHER_CD, desc));
        }
    }
    out
}

pub fn connection(row: &StagedRow) -> Option<ConnectionRow> {
    let labels = classify(row, CategoryGroup::Connection);
    if labels.is_empty() {
        return None;
    }
    Some(ConnectionRow {
        stud_id: row.stud_id.clone(),
        term: row.term.as_str().to_string(),
        conn_to_inst: labels.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ugsurvey_core::{OutputTable, Term};
    use ugsurvey_store::ReferenceData;
    use ugsurvey_store::reference::CompanyRef;

    fn row(term: &str, fields: &[(&str, &str)]) -> StagedRow {
        StagedRow {
            batch_id: 7,
            row_num: 1,
            stud_id: "000000042".to_string(),
            term: Term::new(term),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
        }
    }

    fn count(rows: &[NormalizedOutputRow], table: OutputTable) -> usize {
        rows.iter().filter(|r| r.table() == table).count()
    }

    #[test]
    fn intl_only_row() {
        let r = row(
            "2238",
            &[("int_exp_AYEA", "Y"), ("int_exp_semAbroad_definition", "Fall 2023")],
        );
        let out = fan_out(&r, &Resolver::default());
        assert_eq!(count(&out, OutputTable::Attributes), 1);
        assert_eq!(count(&out, OutputTable::Response), 0);
        assert_eq!(count(&out, OutputTable::IntlExperience), 2);
        assert_eq!(count(&out, OutputTable::Internship), 0);
        assert_eq!(count(&out, OutputTable::Connection), 0);

        let intl = intl_experience(&r);
        assert_eq!(intl[0].intl_exp_type, "Semester Education Abroad");
        assert_eq!(intl[0].intl_exp_detail.as_deref(), Some("Fall 2023"));
        assert_eq!(intl[1].intl_exp_type, "Academic Year Education Abroad");
        assert_eq!(intl[1].intl_exp_detail, None);
        assert!(out.iter().all(|o| o.batch_id() == 7));
    }

    #[test]
    fn three_slots_give_three_rows() {
        let r = row(
            "2238",
            &[
                ("intern_organization1", "Acme"),
                ("intern_unit2", "Research"),
                ("intern_title3", "Analyst"),
                ("intern_paid1", "yes"),
                ("intern_semesters3", "2"),
            ],
        );
        let interns = internships(&r, &Resolver::default());
        let slots: Vec<u8> = interns.iter().map(|i| i.intern_numb).collect();
        assert_eq!(slots, vec![1, 2, 3]);
        assert_eq!(interns[0].indc_intern_paid.as_deref(), Some("Y"));
        assert_eq!(interns[0].intern_co_nm.as_deref(), Some("Acme"));
        assert_eq!(interns[2].intern_semesters, Some(2));
    }

    #[test]
    fn slots_are_independent() {
        let r = row("2238", &[("intern_title2", "Intern"), ("intern_paid1", "Y")]);
        let interns = internships(&r, &Resolver::default());
        assert_eq!(interns.len(), 1);
        assert_eq!(interns[0].intern_numb, 2);
    }

    #[test]
    fn no_slots_give_no_rows() {
        let r = row("2238", &[("intern_count", "0")]);
        assert!(internships(&r, &Resolver::default()).is_empty());
    }

    #[test]
    fn response_needs_a_trigger_field() {
        let resolver = Resolver::new(&ReferenceData {
            companies: vec![CompanyRef {
                variant: "Acme Inc.".to_string(),
                standardized: "Acme".to_string(),
            }],
            ..Default::default()
        });
        assert!(response(&row("2238", &[("plans_other", "travel")]), &resolver).is_none());

        let resp = response(
            &row("2238", &[("EMP_company", "Acme Inc."), ("EMP_country", "Narnia")]),
            &resolver,
        )
        .unwrap();
        assert_eq!(resp.emp_co_nm.as_deref(), Some("Acme"));
        assert_eq!(resp.emp_country, None, "resolver miss is null");
    }

    #[test]
    fn attributes_carry_plan_code_and_term_flags() {
        let long = "x".repeat(80);
        let r = row(
            "FA23",
            &[
                ("indicator_further_education", "Y"),
                ("indicator_military", "Y"),
                ("intern_count", "2"),
                ("collection_method", long.as_str()),
            ],
        );
        let attr = attributes(&r).unwrap();
        assert_eq!(attr.post_graduation_stat_cd, Some(3));
        assert_eq!(attr.invalid_term_indc, "Y");
        assert_eq!(attr.acad_year, None);
        assert_eq!(attr.intern_numb, Some(2));
        assert_eq!(attr.coltn_mthd.map(|m| m.len()), Some(50));
    }

    #[test]
    fn empty_row_gives_nothing() {
        assert!(fan_out(&row("2238", &[]), &Resolver::default()).is_empty());
    }

    #[test]
    fn connection_joins_labels() {
        let r = row(
            "2238",
            &[
                ("connect_mentor", "Y"),
                ("connect_cell_phone", "555-0100"),
                ("indicator_stay_connected_PSU", "Y"),
            ],
        );
        let conn = connection(&r).unwrap();
        assert_eq!(conn.conn_to_inst, "Mentor, Cell Phone, Stay Connected to PSU");
    }

    #[test]
    fn job_learned_unpivots_ticked_options() {
        let r = row(
            "2238",
            &[
                ("Have_PostGrad_Info", "Y"),
                ("EMP_how_obtain_02", "Y"),
                ("EMP_how_obtain_05", "No"),
                ("EMP_how_obtain_11", "1"),
                ("EMP_how_obtain_other", "Y"),
                ("EMP_how_obtain_other_fill", "Family friend"),
            ],
        );
        let learned = job_learned(&r);
        let codes: Vec<i32> = learned.iter().map(|l| l.empl_lrned_abt_job_cd).collect();
        assert_eq!(codes, vec![2, 11, HOW_OBTAIN_OTHER_CD]);
        assert_eq!(learned[0].empl_lrned_abt_job, "EMP_how_obtain_02");
        assert_eq!(learned[2].empl_lrned_abt_job, "Other: Family friend");

        let out = fan_out(&r, &Resolver::default());
        assert_eq!(count(&out, OutputTable::JobLearned), 3);
    }

    #[test]
    fn job_learned_needs_post_grad_info() {
        let r = row("2238", &[("EMP_how_obtain_01", "Y")]);
        assert!(job_learned(&r).is_empty());
    }

    #[test]
    fn intern_learned_respects_count() {
        let r = row(
            "2238",
            &[
                ("intern_count", "2.0"),
                ("intern1_how_obtain_03", "Y"),
                ("intern2_how_obtain_other", "y"),
                ("intern3_how_obtain_01", "Y"),
            ],
        );
        let learned = intern_learned(&r);
        assert_eq!(learned.len(), 2);
        assert_eq!(learned[0].intern_nbr, 1);
        assert_eq!(learned[0].intern_lrned_abt_cd, 3);
        assert_eq!(learned[0].intern_lrned_abt, "Internship obtained via option 03");
        assert_eq!(learned[1].intern_nbr, 2);
        assert_eq!(learned[1].intern_lrned_abt, "Internship obtained via Other");

        let none = row("2238", &[("intern_count", "0"), ("intern1_how_obtain_03", "Y")]);
        assert!(intern_learned(&none).is_empty());
    }

    #[test]
    fn other_description_is_capped() {
        let fill = "x".repeat(400);
        let r = row(
            "2238",
            &[
                ("intern_count", "1"),
                ("intern1_how_obtain_other", "Y"),
                ("intern1_how_obtain_other_fill", fill.as_str()),
            ],
        );
        let learned = intern_learned(&r);
        assert_eq!(learned[0].intern_lrned_abt.chars().count(), 300);
        assert!(learned[0].intern_lrned_abt.starts_with("Internship obtained via Other: x"));
    }

    #[test]
    fn yes_no_spellings() {
        assert_eq!(yes_no(Some("True")).as_deref(), Some("Y"));
        assert_eq!(yes_no(Some("0")).as_deref(), Some("N"));
        assert_eq!(yes_no(Some("unpaid")).as_deref(), Some("U"));
        assert_eq!(yes_no(Some(" ")), None);
        assert_eq!(yes_no(None), None);
    }
}
