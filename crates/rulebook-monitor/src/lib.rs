//! Logging and run monitoring.

mod logging;

pub use logging::{build_filter, setup_logging, FileLogging, LoggingError};
pub use tracing_appender::non_blocking::WorkerGuard;
