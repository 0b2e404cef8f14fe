//! Run summary notifiers

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use lettre::message::{Mailbox, header::ContentType};
use lettre::{Message, SmtpTransport, Transport};

use crate::coordinator::RunReport;

/// Receives the report of every finished run.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    fn notify(&self, report: &RunReport) -> Result<()>;
}

/// Writes the summary to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, report: &RunReport) -> Result<()> {
        for line in report.summary_text().lines() {
            if report.exit_code() == 0 {
                log::info!("{line}");
            } else {
                log::error!("{line}");
            }
        }
        Ok(())
    }
}

/// Writes the report as JSON into a directory, one file per run.
pub struct SummaryFileNotifier {
    dir: PathBuf,
}

impl SummaryFileNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Notifier for SummaryFileNotifier {
    fn name(&self) -> &str {
        "summary-file"
    }

    fn notify(&self, report: &RunReport) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create summary dir: {}", self.dir.display()))?;
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let path = self.dir.join(format!("ugsurvey-run-{stamp}.json"));
        let json = serde_json::to_string_pretty(report).context("failed to encode run report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::debug!("notify: summary written to {}", path.display());
        Ok(())
    }
}

/// SMTP relay and addressing for [`EmailNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from: String,
    pub to: Vec<String>,
    pub subject_prefix: String,
}

/// Mails the run summary over plain SMTP.
pub struct EmailNotifier {
    settings: EmailSettings,
}

impl EmailNotifier {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    /// `{prefix} SUCCESS (mode=periodic)`, with the file name appended for
    /// single-file runs.
    pub fn subject(&self, report: &RunReport) -> String {
        let status = if report.exit_code() == 0 {
            "SUCCESS"
        } else {
            "FAILURE"
        };
        let mut subject = format!("{} {status} (mode={}", self.settings.subject_prefix, report.mode);
        if report.mode == "single-file" {
            if let Some(file) = report.files.first() {
                subject.push_str(&format!(", file={}", file.file));
            }
        }
        subject.push(')');
        subject
    }

    pub fn body(&self, report: &RunReport) -> String {
        let mut body = report.summary_text();
        if let Some(finished) = &report.finished_at {
            body.push_str(&format!("finished: {finished}\n"));
        }
        body
    }

    /// Build the message without sending it.
    pub fn message(&self, report: &RunReport) -> Result<Message> {
        if self.settings.to.is_empty() {
            bail!("no recipients configured");
        }
        let from: Mailbox = self
            .settings
            .from
            .parse()
            .with_context(|| format!("invalid sender address: {}", self.settings.from))?;
        let mut builder = Message::builder()
            .from(from)
            .subject(self.subject(report))
            .header(ContentType::TEXT_PLAIN);
        for to in &self.settings.to {
            let mailbox: Mailbox = to
                .parse()
                .with_context(|| format!("invalid recipient address: {to}"))?;
            builder = builder.to(mailbox);
        }
        builder
            .body(self.body(report))
            .context("failed to build summary email")
    }
}

impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    fn notify(&self, report: &RunReport) -> Result<()> {
        let email = self.message(report)?;
        let mailer = SmtpTransport::builder_dangerous(self.settings.smtp_host.as_str())
            .port(self.settings.smtp_port)
            .build();
        mailer.send(&email).with_context(|| {
            format!(
                "failed to send summary via {}:{}",
                self.settings.smtp_host, self.settings.smtp_port
            )
        })?;
        log::info!("notify: summary mailed to {}", self.settings.to.join(", "));
        Ok(())
    }
}
