//! Logging initialization for the client.
//!
//! Thin wrapper over the observability crate: JSONL to the client log file,
//! optional stderr output, mode picked from `LEDGER_OBS_MODE`.

use crate::Paths;
use observability::{LogConfig, ObservabilityMode};

/// Initialize the logging system.
///
/// * `service_name` - included in every log line
/// * `level` - default filter, overridden by `RUST_LOG`
/// * `paths` - where the log file lives; `None` uses the observability default
/// * `also_stderr` - mirror logs to stderr
pub fn init_logging(service_name: &str, level: &str, paths: Option<&Paths>, also_stderr: bool) {
    let mode = match std::env::var("LEDGER_OBS_MODE")
        .unwrap_or_else(|_| "dev".to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "prod" | "production" => ObservabilityMode::ProdMetadataOnly,
        _ => ObservabilityMode::DevVerbose,
    };

    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).to_string().to_ascii_lowercase(),
        log_path: paths.map(Paths::log_file),
        also_stderr,
        mode,
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
