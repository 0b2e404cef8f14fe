//! Extract columns the normalization reads

/// Columns an extract must carry for every output table to be populated.
/// Matching is case-insensitive.
pub const CRITICAL_COLUMNS: &[&str] = &[
    "student_id",
    "term",
    "PS_committment",
    "ps_committment_definition",
    "PS_committment_other",
    "FS_program",
    "FS_city",
    "FS_state",
    "FS_country",
    "SFT_email",
    "FE_type",
    "FE_type_definition",
    "FE_college",
    "FE_stage",
    "FE_stage_definition",
    "FE_offers",
    "FE_program",
    "FE_college_code",
    "EMP_Month",
    "EMP_Year",
    "offers_count",
    "EMP_company",
    "EMP_department",
    "EMP_title",
    "EMP_relate",
    "EMP_country",
    "EMP_state",
    "EMP_city",
    "EMP_salary",
    "EMP_bonus",
    "EMP_bonus_amount",
    "EMP_relocate",
    "EMP_relocate_amount",
    "EMP_functional",
    "EMP_functional_definition",
    "EMP_emp_edu",
    "EMP_emp_edu_manner",
    "EMP_emp_edu_manner_definition",
    "connect_email",
    "connect_cell",
    // international experience
    "int_exp_semAbroad",
    "int_exp_semAbroad_definition",
    "int_exp_AYEA",
    "int_exp_AYEA_definition",
    "int_exp_embedded",
    "int_exp_embedded_definition",
    "int_exp_studorg",
    "int_exp_studorg_definition",
    "int_exp_other",
    "int_exp_other_fill",
    "int_exp_none",
    "int_exp_long_via_psu",
    "int_exp_long_via_psu_defin",
    "int_exp_short_psu_course",
    "int_exp_short_psu_course_defin",
    "int_exp_short_psu_club_org",
    "int_exp_short_psu_club_org_def",
    "int_exp_educ_prog_not_psu",
    "int_exp_educ_prog_not_psu_defin",
    "int_exp_internship",
    "int_exp_internship_definition",
    "int_exp_did_not_have",
    "int_exp_did_not_have_defin",
    // attributes
    "intern_count",
    "collection_method",
    "Have_PostGrad_Info",
    "Plans_Cleaned",
    "plans_cleaned_definition",
    "plans_other",
    "indicator_internship",
    "indicator_international_experience",
    "indicator_undergrad_research",
    "SFT_assist",
    "indicator_stay_connected_PSU",
    "indicator_fulltime_employment",
    "indicator_parttime_employment",
    "indicator_any_employment",
    "indicator_further_education",
    "indicator_ps_committment",
    "indicator_fellowship",
    "indicator_post_intern_residency",
    "indicator_still_seeking",
    "indicator_military",
    "indicator_entrepreneurship",
    "indicator_other_plans",
];

/// Critical columns absent from `headers`, in declaration order.
pub fn missing_critical<S: AsRef<str>>(headers: &[S]) -> Vec<&'static str> {
    let present: std::collections::HashSet<String> = headers
        .iter()
        .map(|h| h.as_ref().trim().to_ascii_lowercase())
        .collect();
    CRITICAL_COLUMNS
        .iter()
        .copied()
        .filter(|c| !present.contains(&c.to_ascii_lowercase()))
        .collect()
}
