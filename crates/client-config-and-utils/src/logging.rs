//! Logging initialization for the client.
//!
//! Wraps the observability crate: JSONL to `~/.openpatent/logs/client.jsonl`
//! and warnings on stderr.

use observability::LogConfig;
use std::path::Path;

/// Initialize the logging system for the client.
///
/// `level` is the default filter; `RUST_LOG` overrides it. Without a
/// `log_path` logs only go to stderr.
///
/// ```ignore
/// init_logging("info", Some(&paths.log_file()));
/// tracing::info!("client started");
/// ```
pub fn init_logging(level: &str, log_path: Option<&Path>) {
    observability::init_with_config(LogConfig {
        service_name: "openpatent-client".into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path: log_path.map(Path::to_path_buf),
        also_stderr: true,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
