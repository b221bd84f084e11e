//! # Observability
//!
//! Centralized logging setup for the Project Ledger client crates.
//!
//! Crates are **log producers** only. The binary calls
//! `observability::init()` once at startup and every crate uses the standard
//! `tracing` macros. Nothing outside this crate knows where logs go.
//!
//! ## Output
//!
//! Structured JSONL is appended to a single file, by default
//! `~/.ledger/logs/client.jsonl`:
//!
//! - `tail -f ~/.ledger/logs/client.jsonl | jq` for pretty JSON
//! - `lnav ~/.ledger/logs/client.jsonl` for interactive exploration
//!
//! An optional compact stderr layer gives immediate feedback in a terminal.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "ledger-cli".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod json_layer;
mod sink;

pub use json_layer::{redact_field, LogEntry, REDACTED};
pub use sink::CentralLogWriter;

use std::path::PathBuf;

/// Runtime export policy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObservabilityMode {
    /// Structured fields are written after secret redaction.
    #[default]
    DevVerbose,
    /// Only message, level and numeric/boolean fields are written.
    ProdMetadataOnly,
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "ledger-cli").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.ledger/logs/client.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,

    /// Runtime observability mode.
    pub mode: ObservabilityMode,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
            mode: ObservabilityMode::DevVerbose,
        }
    }
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// If the log file cannot be opened the JSONL layer is skipped and only the
/// stderr layer (when enabled) is installed. Calling this twice is harmless;
/// the second call leaves the first subscriber in place.
pub fn init_with_config(config: LogConfig) {
    sink::init_subscriber(&config);
}

/// Central log file location.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ledger").join("logs").join("client.jsonl"))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
