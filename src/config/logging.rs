//! Logging configuration types.

use serde::{Deserialize, Serialize};

use super::defaults::{default_log_dir, default_log_filename, default_log_rotation};

/// Log line format.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output
    #[default]
    Text,
    /// Structured JSON lines (for log shipping)
    Json,
}

/// Log verbosity, mirroring `tracing` levels.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging output configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level; when absent, `RUST_LOG` is consulted, falling back to "info"
    #[serde(default)]
    pub level: Option<LogLevel>,
    /// Output format for console and file layers
    #[serde(default)]
    pub format: LogFormat,
    /// Also write logs to a rolling file under `dir`
    #[serde(default)]
    pub enable_file_logging: bool,
    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Base filename for rolling log files
    #[serde(default = "default_log_filename")]
    pub filename: String,
    /// Rotation schedule: "daily", "hourly" or "never"
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::default(),
            enable_file_logging: false,
            dir: default_log_dir(),
            filename: default_log_filename(),
            rotation: default_log_rotation(),
        }
    }
}
