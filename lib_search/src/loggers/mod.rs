//! # Logging Setup
//!
//! The library only emits `tracing` events. Binaries call [`init_logging`]
//! once at startup to install a console layer and, optionally, a JSON file
//! layer written through a non-blocking `tracing-appender` writer.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Errors raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{0}'")]
    Filter(String),

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Builds the filter: `RUST_LOG` when set, `level` otherwise.
pub fn env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|_| LoggingError::Filter(level.to_string()))
}

/// Installs the global subscriber.
///
/// With `log_dir`, events are also written as JSON lines to a daily rolling
/// `<app_name>.log` file. Keep the returned guard alive for the lifetime of
/// the program or buffered file output is lost.
pub fn init_logging(
    app_name: &str,
    level: &str,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = env_filter(level)?;
    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let guard = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", app_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(writer).json();
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .with(file_layer)
                .try_init()?;
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .try_init()?;
            None
        }
    };

    tracing::info!(app = app_name, level, "logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_level_directives() {
        assert!(EnvFilter::try_new("lib_search=debug,info").is_ok());
        assert!(env_filter("warn").is_ok());
    }
}
