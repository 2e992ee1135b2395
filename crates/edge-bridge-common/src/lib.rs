//! Common types, errors, and utilities for edge-bridge.
//!
//! This crate provides shared functionality used across the edge-bridge workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for bridge settings
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{BridgeConfig, EngineConfig, ExecutionConfig, RouteConfig};
pub use config_file::{ConfigFile, ConfigFileError, ServerConfigFile, WorkerConfig};
pub use error::{BridgeError, GuestFault};
