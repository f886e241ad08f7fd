//! Logging setup.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{0}': {1}")]
    InvalidFilter(String, tracing_subscriber::filter::ParseError),

    #[error("Logging already initialised: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Daily-rotated log files in `directory`, named `<prefix>.<date>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLogging {
    pub directory: PathBuf,
    pub prefix: String,
}

/// Filter from `RUST_LOG` when set, otherwise from `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| LoggingError::InvalidFilter(level.to_string(), e))
}

/// Setup logging with the given level.
///
/// Console output goes to stderr so report output on stdout stays clean.
/// With `file`, records are also written through a non-blocking appender;
/// the returned guard flushes it on drop and must outlive the program's
/// logging.
pub fn setup_logging(
    level: &str,
    json: bool,
    file: Option<&FileLogging>,
) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = build_filter(level)?;

    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().pretty().with_writer(std::io::stderr).boxed()
    };

    let (file_layer, guard) = match file {
        Some(file) => {
            let appender = tracing_appender::rolling::daily(&file.directory, &file.prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = if json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter() {
        assert!(build_filter("info").is_ok());
        assert!(build_filter("rulebook=debug,rulebook_backtest=trace").is_ok());
    }

    #[test]
    fn test_setup_twice_fails() {
        let dir = std::env::temp_dir().join(format!("rulebook-logs-{}", std::process::id()));
        let file = FileLogging {
            directory: dir,
            prefix: "test.log".to_string(),
        };

        let guard = setup_logging("debug", false, Some(&file)).unwrap();
        assert!(guard.is_some());
        tracing::info!("logging initialised");

        assert!(matches!(
            setup_logging("info", true, None),
            Err(LoggingError::Init(_))
        ));
    }
}
