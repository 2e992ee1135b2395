//! Configuration structures for the edge-bridge.
//!
//! This module defines configuration options for various components:
//! - [`BridgeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (pooling, interruption)
//! - [`ExecutionConfig`]: Per-event execution limits (fuel, memory, deadlines)
//! - [`RouteConfig`]: Which request paths are delegated to the guest

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level bridge configuration.
///
/// This structure contains all configuration options for the edge-bridge.
/// It can be loaded from files (TOML, JSON) or environment variables.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-event execution configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Request routing configuration.
    #[serde(default)]
    pub routes: RouteConfig,
}

/// Wasmtime engine configuration.
///
/// These settings affect the global Wasmtime engine behavior,
/// including memory allocation strategy and interruption support.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable pooling allocator for high-performance instance creation.
    ///
    /// When enabled, memory is pre-allocated for a pool of instances,
    /// reducing instantiation time from ~1ms to ~10µs.
    #[serde(default = "defaults::pooling_allocator")]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    ///
    /// This determines the maximum linear memory each instance can use.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Enable epoch-based interruption.
    ///
    /// This allows interrupting long-running WebAssembly execution
    /// based on time rather than fuel consumption.
    #[serde(default = "defaults::epoch_interruption")]
    pub epoch_interruption: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: defaults::pooling_allocator(),
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
            epoch_interruption: defaults::epoch_interruption(),
        }
    }
}

/// Per-event execution configuration.
///
/// These settings control resource limits for individual guest events.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Maximum fuel (CPU instructions) per event.
    ///
    /// Fuel metering provides deterministic CPU limiting.
    /// A typical simple handler consumes ~1,000-10,000 fuel.
    /// Complex operations may consume millions.
    #[serde(default = "defaults::max_fuel")]
    pub max_fuel: u64,

    /// Handler execution deadline in milliseconds.
    ///
    /// This is a hard limit on guest execution time, enforced via
    /// epoch interruption.
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// How long to wait for the guest's readiness signal, in milliseconds.
    ///
    /// A guest whose entrypoint returns without ever signaling readiness
    /// fails the event with a readiness timeout once this bound expires.
    #[serde(default = "defaults::ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// Maximum linear memory in megabytes.
    ///
    /// This limits the memory a single event's instance can allocate.
    #[serde(default = "defaults::max_memory_mb")]
    pub max_memory_mb: u32,

    /// Enable fuel metering.
    ///
    /// When enabled, CPU usage is tracked and limited by the `max_fuel` setting.
    #[serde(default = "defaults::fuel_metering")]
    pub fuel_metering: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_fuel: defaults::max_fuel(),
            timeout_ms: defaults::timeout_ms(),
            ready_timeout_ms: defaults::ready_timeout_ms(),
            max_memory_mb: defaults::max_memory_mb(),
            fuel_metering: defaults::fuel_metering(),
        }
    }
}

impl ExecutionConfig {
    /// Get the handler deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the readiness deadline as a `Duration`.
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// Request routing configuration.
///
/// A deployment that serves both a guest API and static assets narrows
/// the guest to a path prefix; everything else is served from assets.
/// Without a prefix, every request reaches the guest.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Path prefix owned by the guest, e.g. `/api/`.
    ///
    /// `None` routes all requests to the guest.
    #[serde(default)]
    pub api_prefix: Option<String>,
}

impl RouteConfig {
    /// Returns `true` if a request for `path` should reach the guest.
    pub fn routes_to_guest(&self, path: &str) -> bool {
        match &self.api_prefix {
            Some(prefix) => path.starts_with(prefix.as_str()),
            None => true,
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn pooling_allocator() -> bool {
        true
    }

    pub const fn max_instances() -> u32 {
        1000
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }

    pub const fn epoch_interruption() -> bool {
        true
    }

    pub const fn max_fuel() -> u64 {
        10_000_000
    }

    pub const fn timeout_ms() -> u64 {
        1_000
    }

    pub const fn ready_timeout_ms() -> u64 {
        5_000
    }

    pub const fn max_memory_mb() -> u32 {
        128
    }

    pub const fn fuel_metering() -> bool {
        true
    }
}
