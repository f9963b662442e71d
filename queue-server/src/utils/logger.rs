//! Logging Infrastructure
//!
//! Structured logging setup with support for both development and production environments.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger
pub fn init_logger() {
    init_logger_with_file(None, None, None);
}

/// Initialize the logger with optional JSON format and file output
///
/// `RUST_LOG` takes precedence over `log_level` when set. File output uses
/// a daily rolling appender and is only enabled when `log_dir` exists.
/// Calling this more than once is a no-op.
pub fn init_logger_with_file(log_level: Option<&str>, json: Option<bool>, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    let file_dir = log_dir
        .map(Path::new)
        .filter(|p| p.exists())
        .and_then(|p| p.to_str());

    let result = match (file_dir, json.unwrap_or(false)) {
        (Some(dir), true) => {
            let appender = tracing_appender::rolling::daily(dir, "queue-server");
            builder.json().with_writer(appender).try_init()
        }
        (Some(dir), false) => {
            let appender = tracing_appender::rolling::daily(dir, "queue-server");
            builder.with_ansi(false).with_writer(appender).try_init()
        }
        (None, true) => builder.json().try_init(),
        (None, false) => builder.try_init(),
    };

    if result.is_err() {
        tracing::debug!("Logger already initialized");
    }
}
