//! Server configuration.
//!
//! Transport selection and limits, read once at startup from the
//! environment with hard-coded fallbacks.

use common::errors::{AppError, AppResult};

/// Default bind address for the HTTP transport.
const DEFAULT_BIND: &str = "127.0.0.1:3000";
/// Default maximum JSON-RPC request body size.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Supported MCP transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTransport {
    /// JSON-RPC over stdin/stdout with Content-Length framing.
    Stdio,
    /// JSON-RPC over HTTP POST.
    Http,
}

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Selected transport.
    pub transport: ServerTransport,
    /// Bind address for the HTTP transport.
    pub bind: String,
    /// Maximum allowed request body size in bytes.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Loads the server configuration from the environment.
    ///
    /// # Errors
    /// Returns `AppError::Config` for an unrecognized `MCP_TRANSPORT` value.
    pub fn load() -> AppResult<Self> {
        let transport = match std::env::var("MCP_TRANSPORT")
            .unwrap_or_else(|_| "stdio".to_string())
            .to_lowercase()
            .as_str()
        {
            "stdio" => ServerTransport::Stdio,
            "http" | "streamable-http" => ServerTransport::Http,
            other => {
                return Err(AppError::Config(format!(
                    "unsupported transport '{other}' (expected stdio or http)"
                )))
            }
        };
        Ok(Self {
            transport,
            bind: std::env::var("MCP_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
            max_body_bytes: std::env::var("MCP_MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test because both cases mutate the same process-wide variable
    #[test]
    fn test_transport_selection() {
        std::env::remove_var("MCP_TRANSPORT");
        let config = ServerConfig::load().unwrap();
        assert_eq!(config.transport, ServerTransport::Stdio);
        assert_eq!(config.bind, "127.0.0.1:3000");
        assert_eq!(config.max_body_bytes, 1024 * 1024);

        std::env::set_var("MCP_TRANSPORT", "http");
        let config = ServerConfig::load().unwrap();
        assert_eq!(config.transport, ServerTransport::Http);

        std::env::set_var("MCP_TRANSPORT", "carrier-pigeon");
        let result = ServerConfig::load();
        std::env::remove_var("MCP_TRANSPORT");
        assert!(result.is_err());
    }
}
