//! HTTP server for the edge bridge.
//!
//! This crate provides the HTTP surface over the runtime bridge. It
//! handles:
//!
//! - Routing worker traffic into guest events
//! - Request/response transformation
//! - Scheduled and queue event injection
//! - Static asset serving for non-guest paths
//! - Health checks and the epoch pump
//!
//! # Quick Start
//!
//! ```ignore
//! use edge_bridge_server::{AppState, BridgeServer, ServerConfig};
//! use edge_bridge_common::BridgeConfig;
//! use edge_bridge_core::ModuleSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BridgeConfig::default();
//!     let state = AppState::new(&config, ModuleSource::File("worker.wasm".into()))?;
//!
//!     BridgeServer::new(state, ServerConfig::default()).run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod handler;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod state;

pub use assets::DirAssets;
pub use server::{BridgeServer, ServerConfig};
pub use state::{spawn_epoch_pump, AppState};
