//! HTTP server implementation.
//!
//! This module provides the main [`BridgeServer`] struct for running
//! the edge bridge HTTP server.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use edge_bridge_common::{BridgeError, ServerConfigFile};

use crate::router::build_router;
use crate::state::{spawn_epoch_pump, AppState};

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server.
    pub bind_addr: SocketAddr,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Enable graceful shutdown on SIGTERM/SIGINT.
    pub graceful_shutdown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            request_timeout_secs: 30,
            graceful_shutdown: true,
        }
    }
}

impl ServerConfig {
    /// Build server settings from the deployment config file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidConfig`] if the bind address does not
    /// parse.
    pub fn from_file(file: &ServerConfigFile) -> Result<Self, BridgeError> {
        let bind_addr = file.bind_addr.parse().map_err(|e| {
            BridgeError::invalid_config(format!("invalid bind address '{}': {e}", file.bind_addr))
        })?;

        Ok(Self {
            bind_addr,
            request_timeout_secs: file.request_timeout_secs,
            graceful_shutdown: file.graceful_shutdown,
        })
    }

    /// Create a new server config with custom bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Create a new server config with custom timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Get the request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Edge bridge HTTP server.
///
/// This is the main entry point for serving worker traffic.
///
/// # Example
///
/// ```ignore
/// use edge_bridge_server::{AppState, BridgeServer, ServerConfig};
/// use edge_bridge_common::BridgeConfig;
/// use edge_bridge_core::ModuleSource;
///
/// let config = BridgeConfig::default();
/// let state = AppState::new(&config, ModuleSource::File("worker.wasm".into()))?;
///
/// BridgeServer::new(state, ServerConfig::default()).run().await?;
/// ```
pub struct BridgeServer {
    /// Application state.
    state: AppState,
    /// Server configuration.
    config: ServerConfig,
}

impl BridgeServer {
    /// Create a new server instance over prepared state.
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    /// Get a reference to the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until shutdown.
    ///
    /// Starts the epoch pump that drives guest deadlines, then blocks
    /// until the server is shut down via signal (SIGTERM/SIGINT) if
    /// graceful shutdown is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the address.
    pub async fn run(self) -> Result<(), BridgeError> {
        let pump = self
            .state
            .engine()
            .config()
            .epoch_interruption
            .then(|| spawn_epoch_pump(self.state.engine().clone()));

        let app = build_router(self.state, self.config.request_timeout());

        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| {
                BridgeError::invalid_config(format!(
                    "failed to bind {}: {e}",
                    self.config.bind_addr
                ))
            })?;

        info!(addr = %self.config.bind_addr, "Starting HTTP server");

        let result = if self.config.graceful_shutdown {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        } else {
            axum::serve(listener, app).await
        };

        if let Some(pump) = pump {
            pump.abort();
        }

        result.map_err(|e| BridgeError::invalid_config(format!("server error: {e}")))?;

        info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_bridge_common::BridgeConfig;
    use edge_bridge_core::ModuleSource;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.graceful_shutdown);
    }

    #[test]
    fn test_server_config_builder() {
        let addr: SocketAddr = "127.0.0.1:3000".parse().unwrap();
        let config = ServerConfig::default()
            .with_bind_addr(addr)
            .with_timeout(60);

        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn test_server_config_from_file() {
        let file = ServerConfigFile {
            bind_addr: "127.0.0.1:9000".to_string(),
            request_timeout_secs: 60,
            graceful_shutdown: false,
        };

        let config = ServerConfig::from_file(&file).unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.request_timeout_secs, 60);
        assert!(!config.graceful_shutdown);
    }

    #[test]
    fn test_bad_bind_addr_is_invalid_config() {
        let file = ServerConfigFile {
            bind_addr: "not an address".to_string(),
            ..Default::default()
        };

        let result = ServerConfig::from_file(&file);

        assert!(matches!(result, Err(BridgeError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = BridgeConfig::default();
        let state = AppState::new(
            &config,
            ModuleSource::Wat(r#"(module (memory (export "memory") 1))"#.to_string()),
        )
        .unwrap();

        let server = BridgeServer::new(state, ServerConfig::default());

        assert_eq!(server.config().bind_addr.port(), 8080);
    }
}
