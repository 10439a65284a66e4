//! Tracing subscriber setup.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::types::LoggingConfig;

/// File name prefix of the rolling JSON logs.
const LOG_FILE_PREFIX: &str = "larder.log";

/// Build the console filter: `RUST_LOG` if set, else the configured filter.
fn console_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global tracing subscriber.
///
/// Logs human-readable output to the console and, when `json_dir` is set,
/// JSON lines to a daily-rolling file. The returned guard flushes the file
/// writer on drop and must be kept alive for the process lifetime.
/// Does nothing (and returns `None`) if a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(console_filter(config));

    let (file, guard) = match config.json_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(console_filter(config));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .ok()?;

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_falls_back() {
        let config = LoggingConfig {
            filter: "[[not a filter".to_string(),
            json_dir: None,
        };
        // Must not panic on a bad directive.
        let _ = console_filter(&config);
    }
}
