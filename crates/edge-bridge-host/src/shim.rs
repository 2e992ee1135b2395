//! Guest-toolchain runtime shim.
//!
//! A compiled guest expects the import namespace its toolchain's runtime
//! support was built against. The bridge treats that namespace as opaque:
//! whatever [`RuntimeShim`] implementation is supplied gets registered on
//! the event's linker verbatim, before the bridge's own capabilities.
//!
//! [`StandardShim`] provides the `env` namespace our guest toolchain
//! emits: debug logging, a wall clock, an entropy source, and a
//! cooperative scheduler yield.

use tracing::{debug, error, info, warn};
use wasmtime::{Caller, Linker};

use edge_bridge_common::BridgeError;
use edge_bridge_core::{EventContext, LogEntry, LogLevel};

/// Namespace the standard guest toolchain imports from.
const ENV_NAMESPACE: &str = "env";

/// Registers the import namespace a guest toolchain requires.
///
/// Implementations are supplied to the bridge at construction and invoked
/// once per event, against that event's fresh linker.
pub trait RuntimeShim: Send + Sync {
    /// Register the toolchain's imports on the event's linker.
    fn register(&self, linker: &mut Linker<EventContext>) -> Result<(), BridgeError>;
}

/// The standard `env` namespace shim.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardShim;

impl RuntimeShim for StandardShim {
    fn register(&self, linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
        register_log(linker)?;
        register_now_ms(linker)?;
        register_random_fill(linker)?;
        register_yield_now(linker)?;
        Ok(())
    }
}

/// Register `env::log(level: i32, ptr: i32, len: i32)`.
///
/// # Memory Protocol
///
/// The guest passes:
/// - `level`: Log level (0=debug, 1=info, 2=warn, 3=error)
/// - `ptr`: Pointer to the message string in guest memory
/// - `len`: Length of the message in bytes (UTF-8)
fn register_log(linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
    linker
        .func_wrap(
            ENV_NAMESPACE,
            "log",
            |mut caller: Caller<'_, EventContext>, level: i32, ptr: i32, len: i32| {
                // Validate pointer and length are non-negative
                if ptr < 0 || len < 0 {
                    warn!(
                        ptr = ptr,
                        len = len,
                        "Invalid pointer or length (negative value)"
                    );
                    return;
                }

                let Some(memory) = caller
                    .get_export("memory")
                    .and_then(wasmtime::Extern::into_memory)
                else {
                    warn!("Memory export not found in guest module");
                    return;
                };

                // Read message from guest memory and convert to owned String
                // to avoid borrow checker issues with caller.data_mut()
                #[allow(clippy::cast_sign_loss)]
                let message = {
                    let data = memory.data(&caller);
                    let start = ptr as usize;
                    let Some(end) = start.checked_add(len as usize) else {
                        warn!(ptr = ptr, len = len, "Pointer + length overflow");
                        return;
                    };

                    // Bounds check
                    if end > data.len() {
                        warn!(
                            start = start,
                            end = end,
                            memory_size = data.len(),
                            "Memory access out of bounds"
                        );
                        return;
                    }

                    std::str::from_utf8(&data[start..end])
                        .unwrap_or("<invalid utf8>")
                        .to_string()
                };

                record_guest_log(caller.data_mut(), level_from_i32(level), &message);
            },
        )
        .map_err(|e| {
            BridgeError::invalid_config(format!("Failed to register log function: {e}"))
        })?;

    Ok(())
}

/// Register `env::now_ms() -> i64` (milliseconds since the Unix epoch).
fn register_now_ms(linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
    linker
        .func_wrap(ENV_NAMESPACE, "now_ms", || -> i64 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0)
        })
        .map_err(|e| {
            BridgeError::invalid_config(format!("Failed to register now_ms function: {e}"))
        })?;

    Ok(())
}

/// Register `env::random_fill(ptr: i32, len: i32)`.
///
/// Fills the guest buffer with OS entropy. Out-of-bounds or negative
/// ranges leave the buffer untouched.
fn register_random_fill(linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
    linker
        .func_wrap(
            ENV_NAMESPACE,
            "random_fill",
            |mut caller: Caller<'_, EventContext>, ptr: i32, len: i32| {
                if ptr < 0 || len < 0 {
                    warn!(ptr = ptr, len = len, "Invalid entropy buffer (negative value)");
                    return;
                }

                let Some(memory) = caller
                    .get_export("memory")
                    .and_then(wasmtime::Extern::into_memory)
                else {
                    warn!("Memory export not found in guest module");
                    return;
                };

                #[allow(clippy::cast_sign_loss)]
                let (start, end) = (ptr as usize, ptr as usize + len as usize);
                let data = memory.data_mut(&mut caller);
                if end > data.len() {
                    warn!(
                        start = start,
                        end = end,
                        memory_size = data.len(),
                        "Entropy buffer out of bounds"
                    );
                    return;
                }

                if let Err(e) = getrandom::getrandom(&mut data[start..end]) {
                    warn!(error = %e, "Failed to gather entropy for guest");
                }
            },
        )
        .map_err(|e| {
            BridgeError::invalid_config(format!("Failed to register random_fill function: {e}"))
        })?;

    Ok(())
}

/// Register `env::yield_now()`, a cooperative scheduler yield.
fn register_yield_now(linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
    linker
        .func_wrap_async(
            ENV_NAMESPACE,
            "yield_now",
            |_caller: Caller<'_, EventContext>, (): ()| {
                Box::new(async {
                    tokio::task::yield_now().await;
                })
            },
        )
        .map_err(|e| {
            BridgeError::invalid_config(format!("Failed to register yield_now function: {e}"))
        })?;

    Ok(())
}

/// Capture a guest log on the event context and re-emit it via `tracing`.
fn record_guest_log(ctx: &mut EventContext, level: LogLevel, message: &str) {
    ctx.logs.push(LogEntry {
        level,
        message: message.to_string(),
        timestamp: std::time::Instant::now(),
    });

    let event_id = &ctx.event_id;
    match level {
        LogLevel::Debug => debug!(event_id, guest_log = true, "{}", message),
        LogLevel::Info => info!(event_id, guest_log = true, "{}", message),
        LogLevel::Warn => warn!(event_id, guest_log = true, "{}", message),
        LogLevel::Error => error!(event_id, guest_log = true, "{}", message),
    }
}

/// Convert a numeric log level to [`LogLevel`].
///
/// # Arguments
///
/// * `level` - Numeric log level (0=debug, 1=info, 2=warn, 3=error)
///
/// # Returns
///
/// The corresponding [`LogLevel`], defaulting to Info for unknown values.
pub fn level_from_i32(level: i32) -> LogLevel {
    match level {
        0 => LogLevel::Debug,
        2 => LogLevel::Warn,
        3 => LogLevel::Error,
        _ => LogLevel::Info, // 1 and unknown values default to Info
    }
}

/// Convert a [`LogLevel`] to a numeric value.
pub fn level_to_i32(level: LogLevel) -> i32 {
    match level {
        LogLevel::Debug => 0,
        LogLevel::Info => 1,
        LogLevel::Warn => 2,
        LogLevel::Error => 3,
    }
}
