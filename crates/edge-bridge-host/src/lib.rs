//! Host side of the runtime bridge.
//!
//! This crate assembles everything the guest sees at instantiation and
//! everything the platform uses to deliver events:
//!
//! - [`shim`]: The import namespace the guest toolchain expects (`env.*`)
//! - [`imports`]: The bridge capability namespace (`bridge.*`)
//! - [`bridge`]: Per-event instance assembly and the readiness handshake
//! - [`events`]: The event payload contract
//! - [`router`]: Event-kind dispatch into guest bindings
//!
//! # Isolation Model
//!
//! Nothing outlives an event except the engine and the compiled module:
//!
//! 1. **Fresh imports**: Every event gets its own linker, with the
//!    readiness import closed over that event's latch.
//! 2. **Fresh state**: Environment bindings are injected into the event's
//!    store; no registry or memory crosses events.
//! 3. **Faults as data**: Guest failures surface as typed errors or
//!    captured faults, never as unwinding.

pub mod bridge;
pub mod events;
pub mod imports;
pub mod router;
pub mod shim;

pub use bridge::InstanceBridge;
pub use events::{QueueBatch, QueueMessage, ScheduledEvent, WorkerRequest, WorkerResponse};
pub use router::{EventRouter, StaticAssets};
pub use shim::{RuntimeShim, StandardShim};
