//! # discovery-logging
//!
//! Logging for the discovery interview simulator.
//!
//! ## Key Types
//!
//! - [`Logger`] - Structured session event logging
//! - [`LogEvent`] - Session lifecycle events
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//!
//! Diagnostic `tracing` output is set up separately by [`init_tracing`].

mod events;

pub use events::{LogEvent, LogFormat, Logger, StreamStage};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application.
///
/// Console output goes to stderr. When `log_file` is given, JSON lines are
/// also appended there through a non-blocking writer; keep the returned
/// guard alive until exit so buffered lines are flushed.
pub fn init_tracing(level: &str, format: LogFormat, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty | LogFormat::Compact => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let (file_layer, guard) = match log_file.and_then(split_log_path) {
        Some((dir, name)) => {
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    guard
}

fn split_log_path(path: &Path) -> Option<(&Path, &std::ffi::OsStr)> {
    let name = path.file_name()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/tmp/logs/sim.log")).unwrap();
        assert_eq!(dir, Path::new("/tmp/logs"));
        assert_eq!(name, "sim.log");

        let (dir, name) = split_log_path(Path::new("sim.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "sim.log");

        assert!(split_log_path(Path::new("/")).is_none());
    }
}
