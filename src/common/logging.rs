//! Logging and tracing configuration
//!
//! One-off commands log compactly to stderr. The long-running service also
//! writes a log file, since it usually runs detached from a terminal.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

/// File name of the service log
const SERVICE_LOG: &str = "service.log";

/// Keeps the background log writer alive; dropping it flushes the file
pub struct LogGuard {
    /// Log file location, if file logging could be set up
    pub path: Option<PathBuf>,
    _worker: Option<WorkerGuard>,
}

/// Initialize tracing for one-off CLI commands (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("companion_link=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for the service (file + stderr logging)
///
/// The file lives at `<data dir>/logs/service.log`. If the log directory
/// cannot be created the service logs to stderr only.
pub fn init_service() -> LogGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("companion_link=debug,info"));

    if let Some(log_dir) = paths::log_dir() {
        match std::fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::never(&log_dir, SERVICE_LOG);
                let (writer, worker) = tracing_appender::non_blocking(appender);

                let file_layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true);

                let stderr_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .compact();

                tracing_subscriber::registry()
                    .with(filter)
                    .with(file_layer)
                    .with(stderr_layer)
                    .init();

                return LogGuard {
                    path: Some(log_dir.join(SERVICE_LOG)),
                    _worker: Some(worker),
                };
            }
            Err(e) => {
                eprintln!("Warning: Could not create log directory: {}", e);
            }
        }
    }

    // Fallback: stderr only
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    LogGuard {
        path: None,
        _worker: None,
    }
}

/// Get the path to the service log file
pub fn service_log_path() -> Option<PathBuf> {
    paths::log_dir().map(|d| d.join(SERVICE_LOG))
}
