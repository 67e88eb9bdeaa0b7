//! Tracing subscriber setup
//!
//! NIST 800-53: AU-9 (Protection of Audit Information), AU-12 (Audit Generation)
//! Implementation: Text or JSON output, to stderr or a daily rolling file.
//! Audit lines go through the same subscriber under the `treeport::audit`
//! target.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use treeport_core::{LogFormat, LoggingConfig};

/// Install the global subscriber.
///
/// The returned guard flushes the file writer and must live until exit.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.clone()))
    };

    if let Some(log_file) = &config.file {
        let directory = log_file.parent().filter(|p| !p.as_os_str().is_empty());
        let file_name = log_file.file_name();

        match (directory, file_name) {
            (Some(directory), Some(file_name)) => match std::fs::create_dir_all(directory) {
                Ok(()) => {
                    let appender = tracing_appender::rolling::daily(directory, file_name);
                    let (writer, guard) = tracing_appender::non_blocking(appender);

                    match config.format {
                        LogFormat::Json => tracing_subscriber::fmt()
                            .json()
                            .with_env_filter(filter())
                            .with_writer(writer)
                            .with_current_span(true)
                            .with_span_list(true)
                            .init(),
                        LogFormat::Text => tracing_subscriber::fmt()
                            .with_env_filter(filter())
                            .with_writer(writer)
                            .with_ansi(false)
                            .init(),
                    }
                    return Some(guard);
                }
                Err(e) => {
                    eprintln!("Warning: Failed to create log directory: {}", e);
                    eprintln!("Falling back to stderr logging");
                }
            },
            _ => eprintln!("Warning: Invalid log file path {}, logging to stderr", log_file.display()),
        }
    }

    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init(),
    }
    None
}
