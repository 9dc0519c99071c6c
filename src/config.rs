//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;
use std::time::Duration;

/// Default coordination-service connect string.
pub const DEFAULT_SERVER_ADDRESS: &str = "localhost:2181";

/// Default session timeout in milliseconds.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 3000;

/// Default namespace root for caches handed out by the registry.
pub const DEFAULT_NAMESPACE_PATH: &str = "/shiro-zookeeper";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Coordination-service connect string (`host:port[,host:port...]`)
    pub server_address: String,
    /// Session timeout in milliseconds
    pub session_timeout_ms: u64,
    /// Namespace root for registry caches
    pub namespace_path: String,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ZK_SERVER` - Connect string (default: localhost:2181)
    /// - `ZK_SESSION_TIMEOUT_MS` - Session timeout in ms (default: 3000)
    /// - `ZK_NAMESPACE` - Namespace root (default: /shiro-zookeeper)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_address: env::var("ZK_SERVER")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.server_address),
            session_timeout_ms: env::var("ZK_SESSION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_timeout_ms),
            namespace_path: env::var("ZK_NAMESPACE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.namespace_path),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            namespace_path: DEFAULT_NAMESPACE_PATH.to_string(),
            server_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_address, "localhost:2181");
        assert_eq!(config.session_timeout_ms, 3000);
        assert_eq!(config.namespace_path, "/shiro-zookeeper");
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_session_timeout_duration() {
        let config = Config {
            session_timeout_ms: 1500,
            ..Config::default()
        };
        assert_eq!(config.session_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("ZK_SERVER");
        env::remove_var("ZK_SESSION_TIMEOUT_MS");
        env::remove_var("ZK_NAMESPACE");
        env::remove_var("SERVER_PORT");

        let config = Config::from_env();
        assert_eq!(config.server_address, DEFAULT_SERVER_ADDRESS);
        assert_eq!(config.session_timeout_ms, DEFAULT_SESSION_TIMEOUT_MS);
        assert_eq!(config.namespace_path, DEFAULT_NAMESPACE_PATH);
        assert_eq!(config.server_port, 3000);
    }
}
