//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ugsurvey_ingest::IngestPaths;
use ugsurvey_pipeline::{EmailSettings, NormalizeOptions};

/// Environment variable overriding `[database] path`.
pub const DB_ENV: &str = "UGSURVEY_DB";

/// Global configuration for ugsurvey
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub paths: PathsConfig,
    pub normalize: NormalizeConfig,
    pub logging: LoggingConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    #[serde(deserialize_with = "deserialize_env_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/ugsurvey.duckdb"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    #[serde(deserialize_with = "deserialize_env_path")]
    pub incoming_dir: PathBuf,
    /// Glob matched against file names in `incoming_dir`.
    pub pattern: String,
    #[serde(deserialize_with = "deserialize_env_path_opt")]
    pub archive_dir: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_env_path_opt")]
    pub quarantine_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            incoming_dir: PathBuf::from("./incoming"),
            pattern: "UGSurveyData_*.csv".to_string(),
            archive_dir: Some(PathBuf::from("./archive")),
            quarantine_dir: Some(PathBuf::from("./quarantine")),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub workers: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            workers: cpus.min(8),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also append log lines to `{dir}/ugsurvey.log`.
    #[serde(deserialize_with = "deserialize_env_path_opt")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Write a JSON run summary per run into this directory.
    #[serde(deserialize_with = "deserialize_env_path_opt")]
    pub summary_dir: Option<PathBuf>,
    pub email: EmailConfig,
}

/// `[notify.email]`: mail the run summary through an SMTP relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    #[serde(deserialize_with = "deserialize_env_string")]
    pub smtp_host: String,
    pub smtp_port: u16,
    #[serde(deserialize_with = "deserialize_env_string")]
    pub from: String,
    /// Recipients. Entries naming an unset variable are dropped.
    #[serde(deserialize_with = "deserialize_env_list")]
    pub to: Vec<String>,
    pub subject_prefix: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            from: "ugsurvey@localhost".to_string(),
            to: Vec::new(),
            subject_prefix: "[UGS ETL]".to_string(),
        }
    }
}

/// Deserialize a path that may be an environment variable reference like ${VAR}
fn deserialize_env_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    expand_env_var(&s)
        .map(PathBuf::from)
        .ok_or_else(|| serde::de::Error::custom(format!("environment variable in {s} is not set")))
}

/// Like `deserialize_env_path`, but an unset variable leaves the path unset
fn deserialize_env_path_opt<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)).map(PathBuf::from))
}

/// Deserialize a string that may be an environment variable reference like ${VAR}
fn deserialize_env_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    expand_env_var(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("environment variable in {s} is not set")))
}

fn deserialize_env_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let list: Vec<String> = Vec::deserialize(deserializer)?;
    Ok(list.iter().filter_map(|s| expand_env_var(s)).collect())
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./ugsurvey.toml (current directory)
    /// 2. ~/.config/ugsurvey/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("ugsurvey.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "ugsurvey") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Apply `UGSURVEY_DB`, then the `--db` flag.
    pub fn with_overrides(mut self, db: Option<PathBuf>) -> Self {
        if let Ok(path) = std::env::var(DB_ENV) {
            if !path.trim().is_empty() {
                self.database.path = PathBuf::from(path);
            }
        }
        if let Some(path) = db {
            self.database.path = path;
        }
        self
    }

    pub fn ingest_paths(&self) -> IngestPaths {
        IngestPaths {
            archive_dir: self.paths.archive_dir.clone(),
            quarantine_dir: self.paths.quarantine_dir.clone(),
        }
    }

    /// Email settings when `[notify.email]` is enabled and has recipients.
    pub fn email_settings(&self) -> Option<EmailSettings> {
        let email = &self.notify.email;
        if !email.enabled {
            return None;
        }
        if email.to.is_empty() {
            log::warn!("notify.email is enabled but has no recipients");
            return None;
        }
        Some(EmailSettings {
            smtp_host: email.smtp_host.clone(),
            smtp_port: email.smtp_port,
            from: email.from.clone(),
            to: email.to.clone(),
            subject_prefix: email.subject_prefix.clone(),
        })
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            workers: self.normalize.workers.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, PathBuf::from("./data/ugsurvey.duckdb"));
        assert_eq!(config.paths.pattern, "UGSurveyData_*.csv");
        assert!(config.normalize.workers >= 1);
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("UGSURVEY_TEST_VAR", "/srv/survey");
        assert_eq!(
            expand_env_var("${UGSURVEY_TEST_VAR}"),
            Some("/srv/survey".to_string())
        );
        std::env::remove_var("UGSURVEY_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[database]
path = "/tmp/ug.duckdb"

[paths]
incoming_dir = "/data/in"
pattern = "*.csv"
archive_dir = "/data/archive"

[normalize]
workers = 3

[notify]
summary_dir = "${NONEXISTENT_VAR_12345}"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/ug.duckdb"));
        assert_eq!(config.paths.incoming_dir, PathBuf::from("/data/in"));
        assert_eq!(config.paths.archive_dir, Some(PathBuf::from("/data/archive")));
        assert_eq!(
            config.paths.quarantine_dir,
            Some(PathBuf::from("./quarantine")),
            "unset keys keep their default"
        );
        assert_eq!(config.normalize_options().workers, 3);
        assert!(config.notify.summary_dir.is_none());
    }

    #[test]
    fn missing_variable_in_required_path_is_an_error() {
        let toml = "[database]\npath = \"${NONEXISTENT_VAR_12345}\"\n";
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn email_section_parses_and_expands() {
        std::env::set_var("UGSURVEY_TEST_MAILTO", "ir@example.edu");
        let toml = r#"
[notify.email]
enabled = true
smtp_host = "smtp.example.edu"
from = "etl@example.edu"
to = ["ops@example.edu", "${UGSURVEY_TEST_MAILTO}", "${NONEXISTENT_VAR_12345}"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        std::env::remove_var("UGSURVEY_TEST_MAILTO");
        let email = config.email_settings().unwrap();
        assert_eq!(email.smtp_host, "smtp.example.edu");
        assert_eq!(email.smtp_port, 25);
        assert_eq!(email.to, vec!["ops@example.edu", "ir@example.edu"]);
        assert_eq!(email.subject_prefix, "[UGS ETL]");
    }

    #[test]
    fn email_is_off_by_default() {
        assert!(Config::default().email_settings().is_none());
        let toml = "[notify.email]\nenabled = true\n";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.email_settings().is_none(), "no recipients");
    }

    #[test]
    fn db_flag_wins() {
        let config = Config::default().with_overrides(Some(PathBuf::from("/x.duckdb")));
        assert_eq!(config.database.path, PathBuf::from("/x.duckdb"));
    }
}
