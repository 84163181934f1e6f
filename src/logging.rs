//! Tracing output for covermap.
//!
//! Every launch gets its own `covermap_<timestamp>.log` under the app's
//! `logs/` folder, alongside human-readable stdout. The filter comes from
//! `RUST_LOG`, then the `log_filter` setting, then `info`.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs::{self, AppDirError};

const KEEP_LAUNCH_LOGS: usize = 10;
const LOG_FILE_PREFIX: &str = "covermap";
const DEFAULT_FILTER: &str = "info";

static WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Log folder unavailable: {0}")]
    Dir(#[from] AppDirError),
    #[error("Could not list logs in {path}: {source}")]
    ListLogs {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not delete old log {path}: {source}")]
    Prune {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Bad log timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("A tracing subscriber is already installed: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Launch log files in one folder, newest `keep` retained.
struct LaunchLogs {
    dir: PathBuf,
    keep: usize,
}

impl LaunchLogs {
    fn file_name(started: OffsetDateTime) -> Result<String, LoggingError> {
        const STAMP: &[FormatItem<'_>] =
            format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
        Ok(format!("{LOG_FILE_PREFIX}_{}.log", started.format(STAMP)?))
    }

    fn create(&self, name: &str) -> Result<PathBuf, LoggingError> {
        let path = self.dir.join(name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LoggingError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Delete the oldest `.log` files beyond `keep`. Returns how many went.
    fn prune(&self) -> Result<usize, LoggingError> {
        let listing = fs::read_dir(&self.dir).map_err(|source| LoggingError::ListLogs {
            path: self.dir.clone(),
            source,
        })?;
        let mut logs: Vec<(SystemTime, PathBuf)> = listing
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
            .map(|path| (modified_at(&path), path))
            .collect();
        let Some(excess) = logs.len().checked_sub(self.keep).filter(|excess| *excess > 0) else {
            return Ok(0);
        };
        logs.sort_by_key(|(modified, _)| *modified);
        for (_, path) in logs.into_iter().take(excess) {
            fs::remove_file(&path).map_err(|source| LoggingError::Prune { path, source })?;
        }
        Ok(excess)
    }
}

fn modified_at(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Install the global subscriber and return this launch's log path.
///
/// Calling it again after a successful install only reports the path.
pub fn init(configured_filter: Option<&str>) -> Result<PathBuf, LoggingError> {
    let logs = LaunchLogs {
        dir: app_dirs::logs_dir()?,
        keep: KEEP_LAUNCH_LOGS,
    };
    let name = LaunchLogs::file_name(
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
    )?;
    if WRITER_GUARD.get().is_some() {
        return Ok(logs.dir.join(name));
    }
    let path = logs.create(&name)?;
    let (file_writer, guard) = tracing_appender::non_blocking(rolling::never(&logs.dir, &name));
    let pruned = logs.prune()?;

    let timer = local_timer();
    let subscriber = Registry::default()
        .with(filter_for(configured_filter))
        .with(fmt::layer().with_timer(timer.clone()).with_writer(std::io::stdout))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = WRITER_GUARD.set(guard);

    tracing::info!(path = %path.display(), pruned, "Logging initialized");
    Ok(path)
}

fn local_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const CLOCK: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, CLOCK.into())
}

fn filter_for(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| configured.and_then(|directive| EnvFilter::try_new(directive).ok()))
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
