//! Lookup resolver: canonical values from reference tables.
//!
//! Built once per normalization run from a [`ReferenceData`] snapshot and
//! read-only afterwards, so it can be shared across worker threads.

use std::collections::HashMap;

use serde::Serialize;
use ugsurvey_core::Term;
use ugsurvey_store::ReferenceData;

/// First term whose institutions resolve through the organization directory.
pub const INSTITUTION_CUTOVER_TERM: u32 = 2165;

/// Length of the legacy institution code prefix that is compared.
pub const LEGACY_PREFIX_LEN: usize = 6;

/// Organization directory type of institutions.
pub const INSTITUTION_ORG_TYPE: &str = "INST";

/// Country code states are scoped to.
pub const DOMESTIC_COUNTRY: &str = "US";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupKind {
    Company,
    Country,
    State,
    Institution,
}

/// Which reference source an institution lookup uses for a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstitutionSource {
    Legacy,
    OrgDirectory,
}

/// Institution source for `term`; `None` when the term is not a code.
pub fn institution_source(term: &Term) -> Option<InstitutionSource> {
    let code = term.code()?;
    Some(if code < INSTITUTION_CUTOVER_TERM {
        InstitutionSource::Legacy
    } else {
        InstitutionSource::OrgDirectory
    })
}

fn prefix(s: &str) -> Option<String> {
    let p: String = s.chars().take(LEGACY_PREFIX_LEN).collect();
    (p.chars().count() == LEGACY_PREFIX_LEN).then_some(p)
}

#[derive(Debug, Default)]
pub struct Resolver {
    companies: HashMap<String, String>,
    countries: HashMap<String, String>,
    states: HashMap<String, String>,
    legacy: HashMap<String, String>,
    orgs: HashMap<String, String>,
}

impl Resolver {
    pub fn new(data: &ReferenceData) -> Self {
        let companies = data
            .companies
            .iter()
            .map(|c| (c.variant.trim().to_string(), c.standardized.trim().to_string()))
            .collect();

        let mut countries = HashMap::new();
        for c in &data.countries {
            let code = c.code.trim().to_string();
            countries.insert(c.description.trim().to_string(), code.clone());
            countries.insert(code.clone(), code);
        }

        let mut states = HashMap::new();
        for s in data
            .states
            .iter()
            .filter(|s| s.country_code.trim() == DOMESTIC_COUNTRY)
        {
            let code = s.code.trim().to_string();
            states.insert(s.description.trim().to_string(), code.clone());
            states.insert(code.clone(), code);
        }

        // First entry wins for a shared prefix.
        let mut legacy = HashMap::new();
        for inst in &data.legacy_institutions {
            if let Some(p) = prefix(inst.code.trim()) {
                legacy.entry(p).or_insert_with(|| inst.name.clone());
            }
        }

        let orgs = data
            .org_directory
            .iter()
            .filter(|o| o.org_type.trim() == INSTITUTION_ORG_TYPE)
            .map(|o| (o.org_id.trim().to_string(), o.name.clone()))
            .collect();

        Self {
            companies,
            countries,
            states,
            legacy,
            orgs,
        }
    }

    /// Canonical value for `value`, or `None` when nothing matches.
    ///
    /// `as_of` only matters for institutions. States are resolved as
    /// domestic; use [`Resolver::state_in`] when the country is known.
    pub fn resolve(&self, kind: LookupKind, value: &str, as_of: &Term) -> Option<String> {
        match kind {
            LookupKind::Company => self.company(value),
            LookupKind::Country => self.country(value),
            LookupKind::State => self.state_in(value, None),
            LookupKind::Institution => self.institution(value, as_of),
        }
    }

    /// Standardized company name. Unknown names pass through unchanged.
    pub fn company(&self, value: &str) -> Option<String> {
        let v = value.trim();
        if v.is_empty() {
            return None;
        }
        Some(self.companies.get(v).cloned().unwrap_or_else(|| v.to_string()))
    }

    /// Country code matching a code or a description.
    pub fn country(&self, value: &str) -> Option<String> {
        self.countries.get(value.trim()).cloned()
    }

    /// Domestic state code. When `country` is given and resolves to a
    /// foreign country, the state is `None`.
    pub fn state_in(&self, value: &str, country: Option<&str>) -> Option<String> {
        if let Some(country) = country {
            if let Some(code) = self.country(country) {
                if code != DOMESTIC_COUNTRY {
                    return None;
                }
            }
        }
        self.states.get(value.trim()).cloned()
    }

    /// Institution name. Terms before the cutover match on a legacy code
    /// prefix, later terms on the organization directory id.
    pub fn institution(&self, value: &str, as_of: &Term) -> Option<String> {
        let v = value.trim();
        match institution_source(as_of)? {
            InstitutionSource::Legacy => self.legacy.get(&prefix(v)?).cloned(),
            InstitutionSource::OrgDirectory => self.orgs.get(v).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ugsurvey_store::reference::{
        CompanyRef, CountryRef, LegacyInstitutionRef, OrgDirectoryRef, StateRef,
    };

    fn resolver() -> Resolver {
        Resolver::new(&ReferenceData {
            companies: vec![CompanyRef {
                variant: "IBM Corp".to_string(),
                standardized: "IBM".to_string(),
            }],
            countries: vec![
                CountryRef {
                    code: "US".to_string(),
                    description: "United States".to_string(),
                },
                CountryRef {
                    code: "CA".to_string(),
                    description: "Canada".to_string(),
                },
            ],
            states: vec![
                StateRef {
                    country_code: "US".to_string(),
                    code: "PA".to_string(),
                    description: "Pennsylvania".to_string(),
                },
                StateRef {
                    country_code: "CA".to_string(),
                    code: "ON".to_string(),
                    description: "Ontario".to_string(),
                },
            ],
            legacy_institutions: vec![LegacyInstitutionRef {
                code: "123456XX".to_string(),
                name: "Legacy College".to_string(),
            }],
            org_directory: vec![
                OrgDirectoryRef {
                    org_id: "123456".to_string(),
                    org_type: "INST".to_string(),
                    name: "Directory University".to_string(),
                },
                OrgDirectoryRef {
                    org_id: "999".to_string(),
                    org_type: "DEPT".to_string(),
                    name: "Not An Institution".to_string(),
                },
            ],
        })
    }

    #[test]
    fn company_passes_unknown_through() {
        let r = resolver();
        assert_eq!(r.company(" IBM Corp ").as_deref(), Some("IBM"));
        assert_eq!(r.company("Acme").as_deref(), Some("Acme"));
        assert_eq!(r.company("  "), None);
    }

    #[test]
    fn country_by_code_or_description() {
        let r = resolver();
        assert_eq!(r.country("Canada").as_deref(), Some("CA"));
        assert_eq!(r.country("US").as_deref(), Some("US"));
        assert_eq!(r.country("Atlantis"), None);
    }

    #[test]
    fn states_are_domestic_only() {
        let r = resolver();
        let term = Term::new("2238");
        assert_eq!(r.resolve(LookupKind::State, "Pennsylvania", &term).as_deref(), Some("PA"));
        assert_eq!(r.resolve(LookupKind::State, "Ontario", &term), None);
        assert_eq!(r.state_in("PA", Some("Canada")), None);
        assert_eq!(r.state_in("PA", Some("United States")).as_deref(), Some("PA"));
        assert_eq!(r.state_in("PA", Some("unknown")).as_deref(), Some("PA"));
    }

    #[test]
    fn institution_branches_at_cutover() {
        let r = resolver();
        let before = Term::new("2164");
        let at = Term::new("2165");
        assert_eq!(institution_source(&before), Some(InstitutionSource::Legacy));
        assert_eq!(institution_source(&at), Some(InstitutionSource::OrgDirectory));

        assert_eq!(
            r.resolve(LookupKind::Institution, "123456", &before).as_deref(),
            Some("Legacy College")
        );
        assert_eq!(
            r.resolve(LookupKind::Institution, "123456", &at).as_deref(),
            Some("Directory University")
        );
    }

    #[test]
    fn legacy_prefix_needs_six_characters() {
        let r = resolver();
        let term = Term::new("2158");
        assert_eq!(r.institution("123456ZZ", &term).as_deref(), Some("Legacy College"));
        assert_eq!(r.institution("12345", &term), None);
    }

    #[test]
    fn directory_filters_on_type() {
        let r = resolver();
        assert_eq!(r.institution("999", &Term::new("2241")), None);
    }

    #[test]
    fn bad_term_resolves_no_institution() {
        let r = resolver();
        assert_eq!(r.institution("123456", &Term::new("FA23")), None);
    }
}
