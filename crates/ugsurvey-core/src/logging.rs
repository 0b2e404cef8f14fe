//! Logging to stderr with an optional append-only log file

use std::fs::{File, OpenOptions};
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Mutex;

use log::Log;

/// File name written under the configured log directory.
pub const LOG_FILE_NAME: &str = "ugsurvey.log";

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Logger that writes each record to stderr and, when configured, to a file.
///
/// Filtering is delegated to an inner `env_logger::Logger` so `RUST_LOG`
/// keeps working.
pub struct TeeLogger {
    inner: env_logger::Logger,
    file: Option<Mutex<File>>,
    color: bool,
}

impl TeeLogger {
    pub fn new(inner: env_logger::Logger, file: Option<File>, color: bool) -> Self {
        Self {
            inner,
            file: file.map(Mutex::new),
            color,
        }
    }
}

impl log::Log for TeeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        let (pre, label, post) = level_style(record.level(), self.color);
        eprintln!("[{pre}{label}{post}] {}", record.args());

        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
                let (_, label, _) = level_style(record.level(), false);
                let _ = writeln!(f, "{ts} [{label}] {}", record.args());
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

/// Initialize logging.
///
/// Default level is `info`, `debug` with `debug`, `warn` with `quiet`;
/// `RUST_LOG` overrides it. With `log_dir` set, lines are also appended to
/// `{log_dir}/ugsurvey.log`.
pub fn init_logging(quiet: bool, debug: bool, log_dir: Option<&Path>) -> anyhow::Result<()> {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .build();
    let max_level = logger.filter();

    let file = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(dir.join(LOG_FILE_NAME))?,
            )
        }
        None => None,
    };

    let color = std::io::stderr().is_terminal();
    log::set_boxed_logger(Box::new(TeeLogger::new(logger, file, color)))
        .map_err(|e| anyhow::anyhow!("failed to init logger: {e}"))?;
    log::set_max_level(max_level);
    Ok(())
}
