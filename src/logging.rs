//! Logging initialization.
//!
//! Server mode with `logging.to_file`: logs to `<state>/logs/checkout-{datetime}.log`
//! Otherwise: logs to stderr

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Guard that must be kept alive for the duration of the program.
    /// When dropped, ensures all buffered logs are flushed.
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file (only set when logging to a file)
    pub log_file_path: Option<PathBuf>,
}

/// Name of a log file started at the current time
pub fn log_file_name() -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    format!("checkout-{}.log", timestamp)
}

/// Level filter, honoring `RUST_LOG` over the configured level
fn level_filter(config: &Config, debug_override: bool) -> tracing_subscriber::EnvFilter {
    let log_level = if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(log_level))
}

/// Whether this run writes its log to a file
pub fn logs_to_file(config: &Config, is_server: bool) -> bool {
    is_server && config.logging.to_file
}

/// Initialize logging.
///
/// * `is_server` - long-running `serve` mode; one-shot commands always log to stderr
/// * `debug_override` - force "debug" (from --debug)
pub fn init_logging(config: &Config, is_server: bool, debug_override: bool) -> Result<LoggingHandle> {
    let filter = level_filter(config, debug_override);

    if logs_to_file(config, is_server) {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

        let log_filename = log_file_name();
        let log_file_path = logs_dir.join(&log_filename);
        let (non_blocking, guard) = file_writer(&logs_dir, &log_filename);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

fn file_writer(
    dir: &Path,
    filename: &str,
) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let file_appender = tracing_appender::rolling::never(dir, filename);
    tracing_appender::non_blocking(file_appender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_logs_path_under_state() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let logs_dir = config.logs_path();
        assert!(logs_dir.ends_with("logs"));
        assert!(logs_dir.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_log_file_name_format() {
        let name = log_file_name();
        assert!(name.starts_with("checkout-"));
        assert!(name.ends_with("Z.log"));
    }

    #[test]
    fn test_only_server_logs_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.logging.to_file = true;

        assert!(logs_to_file(&config, true));
        assert!(!logs_to_file(&config, false));

        config.logging.to_file = false;
        assert!(!logs_to_file(&config, true));
    }

    #[test]
    fn test_file_writer_creates_log() {
        let temp_dir = TempDir::new().unwrap();
        let name = log_file_name();
        {
            let (mut writer, _guard) = file_writer(temp_dir.path(), &name);
            use std::io::Write;
            writer.write_all(b"hello\n").unwrap();
        }
        let contents = std::fs::read_to_string(temp_dir.path().join(&name)).unwrap();
        assert_eq!(contents, "hello\n");
    }
}
