//! Per-event execution context and store management.
//!
//! This module provides:
//! - [`RuntimeContext`]: The payload handed to instantiation for one event
//! - [`EventContext`]: Per-event state accessible from host functions
//! - [`LogEntry`] and [`LogLevel`]: Structured logging from guest code
//! - [`ExecutionMetrics`]: Performance metrics for each event
//!
//! Every event gets a fresh [`EventContext`] as its store data. Nothing in
//! it outlives the event; in particular the binding registry is rebuilt by
//! the guest's entrypoint on every instantiation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;
use wasmtime::{Store, StoreLimits, StoreLimitsBuilder};

use crate::WasmEngine;
use edge_bridge_common::{BridgeError, ExecutionConfig, GuestFault};

/// The per-event payload handed to instantiation.
///
/// Carries everything the host platform supplies for one event: the
/// environment bindings from the deployment and an event id for tracing.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Unique event identifier for tracing.
    pub event_id: String,

    /// Environment bindings exposed to the guest.
    pub env: HashMap<String, String>,
}

impl RuntimeContext {
    /// Create a context for a new event with a generated event id.
    pub fn new(env: HashMap<String, String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            env,
        }
    }
}

/// Per-event execution state.
///
/// This struct holds all state specific to a single guest event. It is
/// created per event and destroyed after the event completes.
///
/// Host functions access this context through the [`wasmtime::Caller`] API.
///
/// # Contents
///
/// - `event_id`: Unique identifier for tracing
/// - `env`: Environment bindings readable by the guest
/// - binding registry: handler names registered by the guest entrypoint
/// - `logs`: Collected log entries from guest code
/// - `faults`: Guest faults captured at the safe-call boundary
/// - `execution`: Deferred guest callbacks to run after the handler
/// - `metrics`: Execution performance metrics
pub struct EventContext {
    /// Unique event identifier for tracing.
    pub event_id: String,

    /// Environment bindings exposed to the guest.
    pub env: HashMap<String, String>,

    /// Handler bindings registered by the guest during startup.
    bindings: HashMap<String, u32>,

    /// Logs collected from guest code.
    pub logs: Vec<LogEntry>,

    /// Faults captured at the safe-call boundary.
    pub faults: Vec<GuestFault>,

    /// Deferred guest callbacks (run after the handler completes).
    pub execution: ExecutionContext,

    /// Execution metrics.
    pub metrics: ExecutionMetrics,

    /// Event start time.
    start_time: Instant,

    /// Memory limits applied to the store.
    limits: StoreLimits,
}

/// Collects guest callbacks whose lifetime extends past the handler.
///
/// The guest registers zero-argument operations here during handler
/// execution; the event router drives them after the response has been
/// handed back to the platform.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    deferred: Vec<u32>,
}

impl ExecutionContext {
    /// Register a deferred guest operation by funcref-table index.
    pub fn push_deferred(&mut self, fn_index: u32) {
        self.deferred.push(fn_index);
    }

    /// Take all pending deferred operations, leaving none behind.
    pub fn take_deferred(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.deferred)
    }

    /// Number of deferred operations not yet taken.
    pub fn pending(&self) -> usize {
        self.deferred.len()
    }
}

/// A single log entry from guest code.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level (debug, info, warn, error).
    pub level: LogLevel,

    /// Log message content.
    pub message: String,

    /// Timestamp when the log was recorded.
    pub timestamp: Instant,
}

/// Log level for guest logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Execution performance metrics.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    /// Fuel consumed during the event.
    pub fuel_consumed: u64,

    /// Linear memory used in bytes.
    pub memory_used_bytes: usize,

    /// Total event duration.
    pub duration: Option<Duration>,
}

impl EventContext {
    /// Create a new event context from the per-event payload.
    pub fn new(ctx: RuntimeContext, config: &ExecutionConfig) -> Self {
        let max_memory_bytes = (config.max_memory_mb as usize) * 1024 * 1024;
        let limits = StoreLimitsBuilder::new()
            .memory_size(max_memory_bytes)
            .build();

        Self {
            event_id: ctx.event_id,
            env: ctx.env,
            bindings: HashMap::new(),
            logs: Vec::new(),
            faults: Vec::new(),
            execution: ExecutionContext::default(),
            metrics: ExecutionMetrics::default(),
            start_time: Instant::now(),
            limits,
        }
    }

    /// Register a handler binding by wire name.
    ///
    /// Later registrations under the same name win, matching the
    /// last-write semantics of a registration map.
    pub fn register_binding(&mut self, name: impl Into<String>, fn_index: u32) {
        self.bindings.insert(name.into(), fn_index);
    }

    /// Look up the funcref-table index registered for a binding name.
    pub fn binding(&self, name: &str) -> Option<u32> {
        self.bindings.get(name).copied()
    }

    /// Names of all registered bindings.
    pub fn binding_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Add a log entry.
    pub fn log(&mut self, level: LogLevel, message: String) {
        self.logs.push(LogEntry {
            level,
            message,
            timestamp: Instant::now(),
        });
    }

    /// Record a fault captured at the safe-call boundary.
    pub fn record_fault(&mut self, fault: GuestFault) {
        self.faults.push(fault);
    }

    /// Get elapsed time since the event started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Finalize metrics after the event.
    pub fn finalize_metrics(&mut self) {
        self.metrics.duration = Some(self.start_time.elapsed());
    }
}

/// Create a new Wasmtime store for one event.
///
/// # Arguments
///
/// * `engine` - The shared Wasmtime engine
/// * `config` - Execution configuration (fuel, memory, deadlines)
/// * `ctx` - The per-event payload
///
/// # Errors
///
/// Returns an error if fuel cannot be set on the store.
pub fn create_store(
    engine: &WasmEngine,
    config: &ExecutionConfig,
    ctx: RuntimeContext,
) -> Result<Store<EventContext>, BridgeError> {
    let context = EventContext::new(ctx, config);
    let mut store = Store::new(engine.inner(), context);

    // Apply the per-event memory cap
    store.limiter(|ctx| &mut ctx.limits);

    // Set fuel limit if metering is enabled
    if config.fuel_metering {
        store
            .set_fuel(config.max_fuel)
            .map_err(|e| BridgeError::invalid_config(format!("Failed to set fuel: {e}")))?;
    }

    // Set epoch deadline for timeout-based interruption
    // The deadline is relative to current epoch; use timeout_ms as ticks
    // (assuming 1 epoch increment per millisecond from background task)
    if engine.config().epoch_interruption {
        store.set_epoch_deadline(config.timeout_ms);
    }

    Ok(store)
}

/// Get remaining fuel from a store.
pub fn get_remaining_fuel(store: &Store<EventContext>) -> Option<u64> {
    store.get_fuel().ok()
}

/// Calculate fuel consumed.
pub fn calculate_fuel_consumed(initial_fuel: u64, store: &Store<EventContext>) -> u64 {
    let remaining = get_remaining_fuel(store).unwrap_or(0);
    initial_fuel.saturating_sub(remaining)
}
