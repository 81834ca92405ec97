//! Server configuration

use std::net::SocketAddr;
use thiserror::Error;
use trackside_core::config::{ConfigError, TelemetryConfig};

/// HTTP bind address
pub const ENV_HTTP_ADDR: &str = "TELEM_HTTP_ADDR";

/// Default HTTP bind address
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";

/// Errors preventing startup
#[derive(Error, Debug, PartialEq)]
pub enum ServerConfigError {
    #[error(transparent)]
    Telemetry(#[from] ConfigError),

    #[error("TELEM_HTTP_ADDR is not a valid socket address: '{0}'")]
    InvalidAddress(String),
}

/// Everything the server binary needs
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Pipeline settings
    pub telemetry: TelemetryConfig,
    /// Where the HTTP surface listens
    pub http_addr: SocketAddr,
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ServerConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` to resolve variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telemetry = TelemetryConfig::from_lookup(&lookup)?;
        let addr = lookup(ENV_HTTP_ADDR).unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = addr
            .trim()
            .parse()
            .map_err(|_| ServerConfigError::InvalidAddress(addr.clone()))?;

        Ok(Self {
            telemetry,
            http_addr,
        })
    }
}
