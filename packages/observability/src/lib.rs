//! # Observability
//!
//! Logging setup for the OpenPatent client.
//!
//! Crates log through the standard `tracing` macros and never decide where
//! output goes. The binary calls [`init_with_config`] once at startup.
//!
//! With a log path configured, every event is appended as one JSON line to
//! that file (the client uses `~/.openpatent/logs/client.jsonl`):
//!
//! - `tail -f ~/.openpatent/logs/client.jsonl | jq` for pretty JSON
//!
//! Fields whose names look like credentials (`token`, `password`,
//! `authorization`, ...) are redacted before they reach the file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "openpatent-client".into(),
//!         default_level: "debug".into(),
//!         log_path: Some(paths.log_file()),
//!         also_stderr: true,
//!     });
//!
//!     tracing::info!("client started");
//! }
//! ```

mod file;
mod json_layer;

use std::path::PathBuf;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub use file::{LogFileWriter, WriterFactory};
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSON log line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// JSONL log file. Without one, logs only go to stderr.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr when writing a log file.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with custom configuration.
///
/// If the log file cannot be opened, logging falls back to stderr. Calling
/// this more than once keeps the first subscriber.
pub fn init_with_config(config: LogConfig) {
    if let Some(log_path) = &config.log_path {
        match file::init_file_subscriber(&config, log_path) {
            Ok(()) => return,
            Err(e) => {
                init_stderr(&config.default_level);
                tracing::warn!(
                    log_path = %log_path.display(),
                    error = %e,
                    "could not open log file, logging to stderr"
                );
                return;
            }
        }
    }

    init_stderr(&config.default_level);
}

fn init_stderr(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .finish()
        .try_init();
}

pub(crate) fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
