//! Bridge capability imports.
//!
//! Everything the guest can ask of the bridge lives in the `bridge`
//! namespace, registered fresh on every event's linker:
//!
//! - `register_handler(name_ptr, name_len, fn_index)`: bind an event-kind
//!   wire name to a funcref-table entry (startup phase)
//! - `env_get(name_ptr, name_len, buf_ptr, buf_cap) -> i32`: read an
//!   environment binding into a guest buffer
//! - `safe_call(fn_index) -> i32`: run a guest operation behind the fault
//!   capture boundary; 0 on success, 1 on captured fault
//! - `defer(fn_index)`: queue a guest operation to run after the handler
//! - `ready()`: fire the event's readiness latch (registered separately,
//!   its closure holds that event's signal half)
//!
//! None of these imports ever trap: bad arguments are logged and ignored,
//! and faults inside `safe_call` become data on the event context.

use tracing::{debug, warn};
use wasmtime::{Caller, Extern, Linker, Ref};

use edge_bridge_common::{BridgeError, GuestFault};
use edge_bridge_core::abi::{BRIDGE_NAMESPACE, GUEST_TABLE};
use edge_bridge_core::safecall::wasm_fault;
use edge_bridge_core::{EventContext, ReadinessSignal, SafeCallResult};

/// Register every stateless bridge capability.
///
/// The readiness import is per-event state and is registered separately
/// via [`register_ready`].
pub fn register_bridge_imports(linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
    register_handler_registration(linker)?;
    register_env_get(linker)?;
    register_safe_call(linker)?;
    register_defer(linker)?;
    Ok(())
}

/// Register `bridge::ready()`, closing over one event's readiness signal.
pub fn register_ready(
    linker: &mut Linker<EventContext>,
    signal: ReadinessSignal,
) -> Result<(), BridgeError> {
    linker
        .func_wrap(BRIDGE_NAMESPACE, "ready", move || {
            if signal.signal() {
                debug!("Guest signaled readiness");
            } else {
                debug!("Duplicate readiness signal ignored");
            }
        })
        .map_err(|e| {
            BridgeError::invalid_config(format!("Failed to register ready function: {e}"))
        })?;

    Ok(())
}

/// Register `bridge::register_handler(name_ptr, name_len, fn_index)`.
fn register_handler_registration(linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
    linker
        .func_wrap(
            BRIDGE_NAMESPACE,
            "register_handler",
            |mut caller: Caller<'_, EventContext>, name_ptr: i32, name_len: i32, fn_index: i32| {
                if fn_index < 0 {
                    warn!(fn_index, "Rejecting handler registration (negative index)");
                    return;
                }

                let Some(name) = read_guest_string(&mut caller, name_ptr, name_len) else {
                    return;
                };

                debug!(binding = %name, fn_index, "Guest registered handler");
                caller.data_mut().register_binding(name, fn_index as u32);
            },
        )
        .map_err(|e| {
            BridgeError::invalid_config(format!(
                "Failed to register register_handler function: {e}"
            ))
        })?;

    Ok(())
}

/// Register `bridge::env_get(name_ptr, name_len, buf_ptr, buf_cap) -> i32`.
///
/// Returns -1 if the binding is absent; otherwise the full value length
/// in bytes, with up to `buf_cap` bytes copied into the guest buffer. A
/// guest seeing a return larger than its buffer can retry with a bigger
/// one.
fn register_env_get(linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
    linker
        .func_wrap(
            BRIDGE_NAMESPACE,
            "env_get",
            |mut caller: Caller<'_, EventContext>,
             name_ptr: i32,
             name_len: i32,
             buf_ptr: i32,
             buf_cap: i32|
             -> i32 {
                let Some(name) = read_guest_string(&mut caller, name_ptr, name_len) else {
                    return -1;
                };

                let Some(value) = caller.data().env.get(&name).cloned() else {
                    return -1;
                };

                let Ok(value_len) = i32::try_from(value.len()) else {
                    warn!(binding = %name, "Environment value too large for guest ABI");
                    return -1;
                };

                if buf_ptr < 0 {
                    warn!(buf_ptr, "Invalid environment buffer (negative pointer)");
                    return -1;
                }

                #[allow(clippy::cast_sign_loss)]
                let copy_len = value.len().min(buf_cap.max(0) as usize);
                if copy_len > 0 {
                    let Some(memory) = caller
                        .get_export("memory")
                        .and_then(Extern::into_memory)
                    else {
                        warn!("Memory export not found in guest module");
                        return -1;
                    };

                    #[allow(clippy::cast_sign_loss)]
                    if memory
                        .write(&mut caller, buf_ptr as usize, &value.as_bytes()[..copy_len])
                        .is_err()
                    {
                        warn!(buf_ptr, copy_len, "Environment buffer out of bounds");
                        return -1;
                    }
                }

                value_len
            },
        )
        .map_err(|e| {
            BridgeError::invalid_config(format!("Failed to register env_get function: {e}"))
        })?;

    Ok(())
}

/// Register `bridge::safe_call(fn_index) -> i32`.
///
/// Re-enters the guest at the given funcref-table index. A trap in the
/// operation is captured as a [`GuestFault`] on the event context and
/// reported as discriminant 1; the import itself never traps.
fn register_safe_call(linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
    linker
        .func_wrap_async(
            BRIDGE_NAMESPACE,
            "safe_call",
            |mut caller: Caller<'_, EventContext>, (fn_index,): (i32,)| {
                Box::new(async move {
                    let Some(table) = caller.get_export(GUEST_TABLE).and_then(Extern::into_table)
                    else {
                        capture(
                            &mut caller,
                            GuestFault::new("guest does not export a funcref table"),
                        );
                        return 1i32;
                    };

                    #[allow(clippy::cast_sign_loss)]
                    let func = match table.get(&mut caller, fn_index as u32 as u64) {
                        Some(Ref::Func(Some(func))) => func,
                        _ => {
                            capture(
                                &mut caller,
                                GuestFault::new(format!(
                                    "safe_call index {fn_index} holds no function"
                                )),
                            );
                            return 1i32;
                        }
                    };

                    let typed = match func.typed::<(), ()>(&caller) {
                        Ok(typed) => typed,
                        Err(e) => {
                            capture(
                                &mut caller,
                                GuestFault::new(format!(
                                    "safe_call index {fn_index} has an incompatible signature: {e}"
                                )),
                            );
                            return 1i32;
                        }
                    };

                    let result = typed
                        .call_async(&mut caller, ())
                        .await
                        .map_err(|e| wasm_fault(&e));

                    match SafeCallResult::from(result) {
                        SafeCallResult::Result(()) => 0i32,
                        SafeCallResult::Error(fault) => {
                            capture(&mut caller, fault);
                            1i32
                        }
                    }
                })
            },
        )
        .map_err(|e| {
            BridgeError::invalid_config(format!("Failed to register safe_call function: {e}"))
        })?;

    Ok(())
}

/// Register `bridge::defer(fn_index)`.
fn register_defer(linker: &mut Linker<EventContext>) -> Result<(), BridgeError> {
    linker
        .func_wrap(
            BRIDGE_NAMESPACE,
            "defer",
            |mut caller: Caller<'_, EventContext>, fn_index: i32| {
                if fn_index < 0 {
                    warn!(fn_index, "Rejecting deferred operation (negative index)");
                    return;
                }

                debug!(fn_index, "Guest deferred an operation");
                caller.data_mut().execution.push_deferred(fn_index as u32);
            },
        )
        .map_err(|e| {
            BridgeError::invalid_config(format!("Failed to register defer function: {e}"))
        })?;

    Ok(())
}

/// Record a captured fault on the event context.
fn capture(caller: &mut Caller<'_, EventContext>, fault: GuestFault) {
    debug!(fault = %fault.message, "Captured guest fault at call boundary");
    caller.data_mut().record_fault(fault);
}

/// Read a UTF-8 string out of guest memory.
///
/// Returns `None` (with a log) on any invalid range or encoding; callers
/// treat that as the operation not happening.
fn read_guest_string(
    caller: &mut Caller<'_, EventContext>,
    ptr: i32,
    len: i32,
) -> Option<String> {
    if ptr < 0 || len < 0 {
        warn!(
            ptr = ptr,
            len = len,
            "Invalid pointer or length (negative value)"
        );
        return None;
    }

    let Some(memory) = caller.get_export("memory").and_then(Extern::into_memory) else {
        warn!("Memory export not found in guest module");
        return None;
    };

    let data = memory.data(&caller);
    #[allow(clippy::cast_sign_loss)]
    let start = ptr as usize;
    #[allow(clippy::cast_sign_loss)]
    let end = start.checked_add(len as usize)?;

    if end > data.len() {
        warn!(
            start = start,
            end = end,
            memory_size = data.len(),
            "Memory access out of bounds"
        );
        return None;
    }

    match std::str::from_utf8(&data[start..end]) {
        Ok(s) => Some(s.to_string()),
        Err(_) => {
            warn!(start = start, end = end, "Guest string is not valid UTF-8");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_bridge_common::EngineConfig;
    use edge_bridge_core::{ReadinessLatch, WasmEngine};

    fn test_linker() -> Linker<EventContext> {
        let engine = WasmEngine::new(&EngineConfig::default()).unwrap();
        Linker::new(engine.inner())
    }

    #[test]
    fn test_register_bridge_imports() {
        let mut linker = test_linker();

        let result = register_bridge_imports(&mut linker);
        assert!(result.is_ok());
    }

    #[test]
    fn test_register_ready() {
        let mut linker = test_linker();
        let (_latch, signal) = ReadinessLatch::new();

        let result = register_ready(&mut linker, signal);
        assert!(result.is_ok());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut linker = test_linker();

        register_bridge_imports(&mut linker).unwrap();
        // A second pass collides with the existing definitions
        let result = register_bridge_imports(&mut linker);
        assert!(result.is_err());
    }
}
