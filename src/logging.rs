// Process-wide log sink: everything goes to stderr and to a per-run log
// file named after the start time.
//
// While a spinner is on screen, stderr lines are written with the spinner
// suspended so the two never share a terminal line.

use anyhow::{Context, Result};
use chrono::Local;
use indicatif::ProgressBar;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `<YYYYmmddTHH_MM>_onedrive.log`
pub fn log_file_name(now: chrono::DateTime<Local>) -> String {
    format!("{}_onedrive.log", now.format("%Y%m%dT%H_%M"))
}

static ACTIVE_SPINNER: Mutex<Option<ProgressBar>> = Mutex::new(None);

/// Register the spinner that stderr output has to step around, or clear it.
pub fn set_active_spinner(pb: Option<ProgressBar>) {
    if let Ok(mut slot) = ACTIVE_SPINNER.lock() {
        *slot = pb;
    }
}

pub fn active_spinner() -> Option<ProgressBar> {
    ACTIVE_SPINNER.lock().ok().and_then(|slot| slot.clone())
}

/// Stderr writer for the console log layer.
pub struct SpinnerAwareStderr;

impl Write for SpinnerAwareStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match active_spinner() {
            Some(pb) => pb.suspend(|| io::stderr().write_all(buf))?,
            None => io::stderr().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Install the global subscriber. Returns the log file path.
pub fn init(log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let path = log_dir.join(log_file_name(Local::now()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(|| SpinnerAwareStderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("Failed to install log subscriber")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn log_name_uses_minute_stamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 59).unwrap();
        assert_eq!(log_file_name(now), "20240301T09_05_onedrive.log");
    }

    #[test]
    fn stderr_writer_reports_full_line_written() {
        let mut out = SpinnerAwareStderr;
        assert_eq!(out.write(b"mirror: folder done\n").unwrap(), 20);
        out.flush().unwrap();
    }
}
