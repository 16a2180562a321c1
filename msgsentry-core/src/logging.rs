//! Logging setup
//!
//! msgsentry runs as a background monitor, so the log sink is a
//! daily-rolling file under the XDG state directory rather than the
//! console. Rotated files beyond `logging.max_files` are pruned at
//! startup.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::Result;

/// Base name of the log file; the daily appender suffixes an ISO date.
const LOG_FILE_PREFIX: &str = "msgsentry.log";

/// Keeps the non-blocking log writer alive. Dropping it flushes any
/// pending writes, so hold it for the life of the process.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Initialize file logging.
///
/// The level comes from `RUST_LOG` when set, otherwise from the config.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;
    prune_rotated_logs(&log_dir, config.max_files);

    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Delete the oldest rotated log files so at most `max_files` remain.
///
/// The date suffix makes lexicographic order chronological order.
/// Deletion failures are ignored; pruning must never stop startup.
fn prune_rotated_logs(dir: &Path, max_files: usize) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut logs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX))
        })
        .collect();
    if logs.len() <= max_files {
        return;
    }
    logs.sort();
    let excess = logs.len() - max_files;
    for path in logs.drain(..excess) {
        let _ = std::fs::remove_file(path);
    }
}

/// Initialize logging for tests (captured per test).
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        for day in 10..16 {
            let name = format!("{}.2026-08-{}", LOG_FILE_PREFIX, day);
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        prune_rotated_logs(dir.path(), 3);

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "msgsentry.log.2026-08-13".to_string(),
                "msgsentry.log.2026-08-14".to_string(),
                "msgsentry.log.2026-08-15".to_string(),
            ]
        );
    }

    #[test]
    fn test_prune_ignores_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), b"x").unwrap();
        std::fs::write(dir.path().join("msgsentry.log.2026-08-15"), b"x").unwrap();

        prune_rotated_logs(dir.path(), 1);

        assert!(dir.path().join("config.toml").exists());
        assert!(dir.path().join("msgsentry.log.2026-08-15").exists());
    }

    #[test]
    fn test_prune_is_a_noop_under_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("msgsentry.log.2026-08-15"), b"x").unwrap();

        prune_rotated_logs(dir.path(), 5);

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
