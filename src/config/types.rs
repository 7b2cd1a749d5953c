//! Root configuration struct.

use serde::{Deserialize, Serialize};

use super::defaults::{default_cors_origins, default_port};
use super::logging::LoggingConfig;
use super::server::ServerConfig;

/// Root configuration for the JumpJump server.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// TCP port the HTTP/WebSocket listener binds to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated list of allowed CORS origins, or "*" for permissive
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Room and session behavior
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging output configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: default_cors_origins(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
