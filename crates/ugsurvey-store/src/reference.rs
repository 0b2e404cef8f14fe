//! Reference tables: CSV loading and in-memory snapshots

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use duckdb::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::store::Store;

/// Reference table kinds, each backed by one `ref_*` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Company,
    Country,
    State,
    LegacyInstitution,
    OrgDirectory,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 5] = [
        Self::Company,
        Self::Country,
        Self::State,
        Self::LegacyInstitution,
        Self::OrgDirectory,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Company => "ref_company",
            Self::Country => "ref_country",
            Self::State => "ref_state",
            Self::LegacyInstitution => "ref_legacy_institution",
            Self::OrgDirectory => "ref_org_directory",
        }
    }

    /// Required CSV header, in column order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Company => &["variant", "standardized"],
            Self::Country => &["code", "description"],
            Self::State => &["country_code", "code", "description"],
            Self::LegacyInstitution => &["code", "name"],
            Self::OrgDirectory => &["org_id", "org_type", "name"],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Country => "country",
            Self::State => "state",
            Self::LegacyInstitution => "legacy-institution",
            Self::OrgDirectory => "org-directory",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown reference kind: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub variant: String,
    pub standardized: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRef {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRef {
    pub country_code: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyInstitutionRef {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDirectoryRef {
    pub org_id: String,
    pub org_type: String,
    pub name: String,
}

/// Snapshot of every reference table, read once per normalization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    pub companies: Vec<CompanyRef>,
    pub countries: Vec<CountryRef>,
    pub states: Vec<StateRef>,
    pub legacy_institutions: Vec<LegacyInstitutionRef>,
    pub org_directory: Vec<OrgDirectoryRef>,
}

fn read_table<T>(
    conn: &Connection,
    kind: ReferenceKind,
    map: impl Fn(&duckdb::Row<'_>) -> duckdb::Result<T>,
) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT {} FROM {}",
        kind.columns().join(", "),
        kind.table_name()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map)?
        .collect::<duckdb::Result<Vec<_>>>()
        .with_context(|| format!("failed to read {}", kind.table_name()))?;
    Ok(rows)
}

impl ReferenceData {
    pub fn load(conn: &Connection) -> Result<Self> {
        let data = Self {
            companies: read_table(conn, ReferenceKind::Company, |r| {
                Ok(CompanyRef {
                    variant: r.get(0)?,
                    standardized: r.get(1)?,
                })
            })?,
            countries: read_table(conn, ReferenceKind::Country, |r| {
                Ok(CountryRef {
                    code: r.get(0)?,
                    description: r.get(1)?,
                })
            })?,
            states: read_table(conn, ReferenceKind::State, |r| {
                Ok(StateRef {
                    country_code: r.get(0)?,
                    code: r.get(1)?,
                    description: r.get(2)?,
                })
            })?,
            legacy_institutions: read_table(conn, ReferenceKind::LegacyInstitution, |r| {
                Ok(LegacyInstitutionRef {
                    code: r.get(0)?,
                    name: r.get(1)?,
                })
            })?,
            org_directory: read_table(conn, ReferenceKind::OrgDirectory, |r| {
                Ok(OrgDirectoryRef {
                    org_id: r.get(0)?,
                    org_type: r.get(1)?,
                    name: r.get(2)?,
                })
            })?,
        };
        log::debug!(
            "reference: {} companies, {} countries, {} states, {} legacy institutions, {} orgs",
            data.companies.len(),
            data.countries.len(),
            data.states.len(),
            data.legacy_institutions.len(),
            data.org_directory.len(),
        );
        Ok(data)
    }
}

fn read_records<T: DeserializeOwned>(kind: ReferenceKind, path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open reference file: {}", path.display()))?;
    reader
        .deserialize::<T>()
        .enumerate()
        .map(|(i, rec)| {
            rec.with_context(|| format!("{}: bad {kind} record {}", path.display(), i + 1))
        })
        .collect()
}

/// Parse a reference CSV into rows of strings in `kind.columns()` order.
fn parse_csv(kind: ReferenceKind, path: &Path) -> Result<Vec<Vec<String>>> {
    let rows = match kind {
        ReferenceKind::Company => read_records::<CompanyRef>(kind, path)?
            .into_iter()
            .map(|r| vec![r.variant, r.standardized])
            .collect(),
        ReferenceKind::Country => read_records::<CountryRef>(kind, path)?
            .into_iter()
            .map(|r| vec![r.code, r.description])
            .collect(),
        ReferenceKind::State => read_records::<StateRef>(kind, path)?
            .into_iter()
            .map(|r| vec![r.country_code, r.code, r.description])
            .collect(),
        ReferenceKind::LegacyInstitution => read_records::<LegacyInstitutionRef>(kind, path)?
            .into_iter()
            .map(|r| vec![r.code, r.name])
            .collect(),
        ReferenceKind::OrgDirectory => read_records::<OrgDirectoryRef>(kind, path)?
            .into_iter()
            .map(|r| vec![r.org_id, r.org_type, r.name])
            .collect(),
    };
    Ok(rows)
}

impl Store {
    /// Replace one reference table with the contents of a CSV file.
    pub fn load_reference_csv(&self, kind: ReferenceKind, path: &Path) -> Result<usize> {
        let rows = parse_csv(kind, path)?;
        let table = kind.table_name();
        let placeholders = vec!["?"; kind.columns().len()].join(", ");
        let insert = format!("INSERT INTO {table} VALUES ({placeholders})");

        self.transaction(|tx| {
            tx.execute(&format!("DELETE FROM {table}"), [])
                .with_context(|| format!("failed to clear {table}"))?;
            let mut stmt = tx.prepare(&insert)?;
            for row in &rows {
                stmt.execute(duckdb::params_from_iter(row.iter()))
                    .with_context(|| format!("failed to insert into {table}"))?;
            }
            Ok::<_, anyhow::Error>(())
        })?;

        log::info!("reference: loaded {} {} rows from {}", rows.len(), kind, path.display());
        Ok(rows.len())
    }

    pub fn reference_data(&self) -> Result<ReferenceData> {
        self.with_conn(ReferenceData::load)
    }
}

/// Insert a single reference row; used by tests and fixtures.
pub fn insert_reference(conn: &Connection, kind: ReferenceKind, values: &[&str]) -> Result<()> {
    let placeholders = vec!["?"; values.len()].join(", ");
    conn.execute(
        &format!("INSERT INTO {} VALUES ({placeholders})", kind.table_name()),
        duckdb::params_from_iter(values.iter()),
    )
    .with_context(|| format!("failed to insert into {}", kind.table_name()))?;
    Ok(())
}

/// Number of rows in a reference table.
pub fn count(conn: &Connection, kind: ReferenceKind) -> Result<u64> {
    let n: i64 = conn
        .query_row(&format!("SELECT count(*) FROM {}", kind.table_name()), [], |r| r.get(0))
        .with_context(|| format!("failed to count {}", kind.table_name()))?;
    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_from_cli_name() {
        assert_eq!(
            "legacy-institution".parse::<ReferenceKind>().unwrap(),
            ReferenceKind::LegacyInstitution
        );
        assert!("nope".parse::<ReferenceKind>().is_err());
    }

    #[test]
    fn csv_load_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("country.csv");
        std::fs::write(&path, "code,description\nUS, United States\nCA,Canada\n").unwrap();

        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.load_reference_csv(ReferenceKind::Country, &path).unwrap(), 2);
        assert_eq!(store.load_reference_csv(ReferenceKind::Country, &path).unwrap(), 2);

        let data = store.reference_data().unwrap();
        assert_eq!(data.countries.len(), 2);
        assert_eq!(data.countries[0].description, "United States");
    }

    #[test]
    fn csv_missing_column_fails_without_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.csv");
        std::fs::write(&path, "code,description\nPA,Pennsylvania\n").unwrap();

        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|c| insert_reference(c, ReferenceKind::State, &["US", "NY", "New York"]))
            .unwrap();
        assert!(store.load_reference_csv(ReferenceKind::State, &path).is_err());
        assert_eq!(store.with_conn(|c| count(c, ReferenceKind::State)).unwrap(), 1);
    }
}
