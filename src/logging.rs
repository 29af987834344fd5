//! Logging setup
//!
//! Installs a `tracing` subscriber with a console layer and, when a log
//! directory is configured, a daily-rotated file layer. `RUST_LOG` takes
//! precedence over the configured filter.

use crate::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name prefix inside the log directory
pub const LOG_FILE_PREFIX: &str = "packetscope.log";

/// Build the filter: `RUST_LOG` if set and valid, else the configured directive
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer when dropped; keep it alive for
/// the life of the program. Returns `None` when logging to the console only.
/// Installing twice is harmless: the second call leaves the first subscriber
/// in place.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = build_filter(config);
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match &config.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);

            let installed = tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .try_init();
            if installed.is_err() {
                tracing::debug!("Logging already initialized");
            }
            Some(guard)
        }
        None => {
            if tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()
                .is_err()
            {
                tracing::debug!("Logging already initialized");
            }
            None
        }
    }
}
