//! Core Wasmtime bridge machinery for edge-bridge.
//!
//! This crate provides the fundamental pieces of the guest lifecycle:
//! - [`WasmEngine`]: Configured Wasmtime engine with pooling allocator
//! - [`ModuleCache`]: Compile-once cache for the deployed guest module
//! - [`EventContext`]: Per-event store data (bindings, logs, deferred work)
//! - [`ReadinessLatch`]: One-shot startup/dispatch synchronization
//! - [`SafeCallResult`]: Fault capture at the call boundary
//! - [`GuestInstance`]: Binding resolution and invocation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     WasmEngine                          │
//! │  (Shared across all events, thread-safe)                │
//! │  - Pooling Allocator                                    │
//! │  - Compilation settings                                 │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │              ModuleCache / CompiledModule               │
//! │  (Compiled once per process, shared read-only)          │
//! │  - Pre-compiled machine code                            │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        Store<EventContext> + GuestInstance              │
//! │  (Per-event, isolated, never reused)                    │
//! │  - Fuel metering                                        │
//! │  - Linear memory                                        │
//! │  - Binding registry, logs, deferred work                │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod abi;
pub mod context;
pub mod engine;
pub mod instance;
pub mod latch;
pub mod module;
pub mod safecall;

pub use context::{
    EventContext, ExecutionContext, ExecutionMetrics, LogEntry, LogLevel, RuntimeContext,
};
pub use engine::WasmEngine;
pub use instance::GuestInstance;
pub use latch::{ReadinessLatch, ReadinessSignal};
pub use module::{CompiledModule, ModuleCache, ModuleProvider, ModuleSource};
pub use safecall::{SafeCallResult, safe_call, safe_call_async, wasm_fault};
