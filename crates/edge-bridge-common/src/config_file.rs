//! Configuration file structures for the edge-bridge.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ServerConfigFile`]: HTTP server settings
//! - [`WorkerConfig`]: The deployed guest module, its env bindings, and assets

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::BridgeConfig;

/// Top-level configuration file structure.
///
/// This structure represents a complete TOML configuration file
/// that can be loaded at startup.
///
/// # Example
///
/// ```toml
/// [bridge.engine]
/// pooling_allocator = true
/// max_instances = 1000
///
/// [bridge.execution]
/// max_fuel = 10_000_000
/// timeout_ms = 1000
/// ready_timeout_ms = 5000
///
/// [bridge.routes]
/// api_prefix = "/api/"
///
/// [server]
/// bind_addr = "0.0.0.0:8080"
/// request_timeout_secs = 30
///
/// [worker]
/// module = "./worker.wasm"
/// assets_dir = "./public"
///
/// [worker.env]
/// GREETING = "hello"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Bridge configuration (engine + execution + routing settings).
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfigFile,

    /// Deployed worker configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// HTTP server configuration from config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfigFile {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "defaults::bind_addr")]
    pub bind_addr: String,

    /// Request timeout in seconds.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Enable graceful shutdown.
    #[serde(default = "defaults::graceful_shutdown")]
    pub graceful_shutdown: bool,
}

impl Default for ServerConfigFile {
    fn default() -> Self {
        Self {
            bind_addr: defaults::bind_addr(),
            request_timeout_secs: defaults::request_timeout_secs(),
            graceful_shutdown: defaults::graceful_shutdown(),
        }
    }
}

/// The deployed worker: guest module image, env bindings, static assets.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Path to the WebAssembly guest module.
    ///
    /// Required to serve events; validated at startup.
    pub module: Option<String>,

    /// Environment bindings exposed to the guest via env lookup.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Directory of static assets served for non-guest paths.
    ///
    /// Only consulted when `bridge.routes.api_prefix` is set.
    pub assets_dir: Option<String>,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

/// Default value functions for serde.
mod defaults {
    pub fn bind_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    pub const fn request_timeout_secs() -> u64 {
        30
    }

    pub const fn graceful_shutdown() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();

        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert!(config.server.graceful_shutdown);
        assert!(config.worker.module.is_none());
        assert!(config.worker.env.is_empty());
        assert!(config.worker.assets_dir.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [server]
            bind_addr = "127.0.0.1:3000"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:3000");
        // Defaults applied
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.bridge.execution.ready_timeout_ms, 5_000);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [bridge.engine]
            pooling_allocator = true
            max_instances = 500

            [bridge.execution]
            max_fuel = 5_000_000
            timeout_ms = 250
            ready_timeout_ms = 2000

            [bridge.routes]
            api_prefix = "/api/"

            [server]
            bind_addr = "0.0.0.0:9000"
            request_timeout_secs = 60
            graceful_shutdown = false

            [worker]
            module = "./worker.wasm"
            assets_dir = "./public"

            [worker.env]
            GREETING = "hello"
            REGION = "local"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.bridge.engine.max_instances, 500);
        assert_eq!(config.bridge.execution.max_fuel, 5_000_000);
        assert_eq!(config.bridge.execution.ready_timeout_ms, 2_000);
        assert_eq!(config.bridge.routes.api_prefix, Some("/api/".to_string()));
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.server.request_timeout_secs, 60);
        assert!(!config.server.graceful_shutdown);
        assert_eq!(config.worker.module, Some("./worker.wasm".to_string()));
        assert_eq!(config.worker.assets_dir, Some("./public".to_string()));
        assert_eq!(config.worker.env.get("GREETING"), Some(&"hello".to_string()));
        assert_eq!(config.worker.env.len(), 2);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid = "this is not valid toml [";
        let result = ConfigFile::from_toml(invalid);
        assert!(result.is_err());
    }
}
