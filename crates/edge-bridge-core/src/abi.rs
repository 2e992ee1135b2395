//! The wire contract between the bridge and guest modules.
//!
//! A deployable guest exports:
//! - `memory`: linear memory for payload exchange
//! - `start`: the entrypoint, driven once per event; it registers handler
//!   bindings and signals readiness through the bridge imports
//! - `alloc(size) -> ptr`: reserves guest memory for an inbound payload
//! - `__indirect_function_table`: funcref table holding the registered
//!   handlers and deferred operations
//!
//! Handlers are table entries of type `(param i32 i32) (result i64)`:
//! they receive a payload pointer and length and return the reply's
//! pointer and length packed into one `i64`. Safe-call and deferred
//! operations are zero-argument table entries.

/// Export name of the guest's linear memory.
pub const GUEST_MEMORY: &str = "memory";

/// Export name of the guest entrypoint.
pub const GUEST_START: &str = "start";

/// Export name of the guest payload allocator.
pub const GUEST_ALLOC: &str = "alloc";

/// Export name of the guest funcref table.
pub const GUEST_TABLE: &str = "__indirect_function_table";

/// Import namespace for bridge capabilities.
pub const BRIDGE_NAMESPACE: &str = "bridge";

/// Binding wire name for HTTP request events.
pub const BINDING_REQUEST: &str = "handleRequest";

/// Binding wire name for scheduled tick events.
pub const BINDING_SCHEDULED: &str = "handleScheduled";

/// Binding wire name for queued-message batch events.
pub const BINDING_QUEUE: &str = "handleQueue";

/// Pack a guest pointer and length into the `i64` a handler returns.
pub fn pack_ptr_len(ptr: u32, len: u32) -> i64 {
    (((ptr as u64) << 32) | (len as u64)) as i64
}

/// Split a handler's packed `i64` back into pointer and length.
pub fn unpack_ptr_len(packed: i64) -> (u32, u32) {
    let packed = packed as u64;
    ((packed >> 32) as u32, (packed & 0xFFFF_FFFF) as u32)
}
