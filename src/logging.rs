use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_PREFIX: &str = "sparrow-rag";

/// Archived logs older than this are deleted.
const ARCHIVE_RETENTION_DAYS: i64 = 30;

/// Initialize console and daily-rolling file logging under `log_dir`.
///
/// Logs from previous days are moved into `log_dir/archive` first. The returned
/// guard flushes the file writer on drop; keep it alive for the process lifetime.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let archive_dir = log_dir.join("archive");

    fs::create_dir_all(log_dir)?;
    fs::create_dir_all(&archive_dir)?;

    archive_old_logs(log_dir, &archive_dir, Local::now().naive_local().date())?;

    let file_appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| format!("Failed to create rolling file appender: {}", e))?;
    let (non_blocking_appender, guard) = non_blocking(file_appender);

    // Message-only output on the console, full context in the file
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .without_time()
        .with_writer(io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(non_blocking_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sparrow_rag=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(log_dir = %log_dir.display(), "Logging system initialized");

    let cutoff = Local::now().naive_local().date() - chrono::Duration::days(ARCHIVE_RETENTION_DAYS);
    if let Err(e) = cleanup_old_archives(&archive_dir, cutoff) {
        tracing::warn!("Failed to cleanup old log archives during init: {}", e);
    }

    Ok(guard)
}

/// `~/.sparrow/logs`
pub fn default_log_directory() -> crate::error::Result<PathBuf> {
    Ok(crate::config::sparrow_home()?.join("logs"))
}

/// Move log files dated before `today` into `archive_dir`.
fn archive_old_logs(log_dir: &Path, archive_dir: &Path, today: NaiveDate) -> io::Result<usize> {
    let mut archived = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let Some(file_date) = file_date(&path) else {
            continue;
        };
        if file_date >= today {
            continue;
        }

        let archive_path = archive_dir.join(path.file_name().unwrap_or_default());
        match fs::rename(&path, &archive_path) {
            Ok(_) => archived += 1,
            Err(e) => tracing::warn!("Failed to archive log file {}: {}", path.display(), e),
        }
    }

    Ok(archived)
}

/// Remove archived logs dated before `cutoff`.
fn cleanup_old_archives(archive_dir: &Path, cutoff: NaiveDate) -> io::Result<usize> {
    if !archive_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(archive_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        if matches!(file_date(&path), Some(date) if date < cutoff) {
            match fs::remove_file(&path) {
                Ok(_) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove old archived log {}: {}", path.display(), e),
            }
        }
    }

    Ok(removed)
}

fn file_date(path: &Path) -> Option<NaiveDate> {
    let file_name = path.file_name()?.to_str()?;
    let date_str = extract_date_from_filename(file_name)?;
    NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").ok()
}

/// Expected format: sparrow-rag.2024-01-01.log
fn extract_date_from_filename(filename: &str) -> Option<String> {
    let parts: Vec<&str> = filename.split('.').collect();
    if parts.len() == 3 && parts[0] == LOG_PREFIX && parts[2] == "log" {
        let date_part = parts[1];
        if date_part.len() == 10 && date_part.matches('-').count() == 2 {
            return Some(date_part.to_string());
        }
    }
    None
}
