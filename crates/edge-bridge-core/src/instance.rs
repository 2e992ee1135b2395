//! Live guest instance and binding invocation.
//!
//! This module provides [`GuestInstance`], the post-handshake view of one
//! event's instance. By the time a `GuestInstance` exists, the guest's
//! entrypoint has run and signaled readiness, and the binding registry in
//! the store data is populated. What remains is:
//!
//! 1. Resolve the funcref registered for the event's binding name
//! 2. Stage the payload in guest memory via the guest's allocator
//! 3. Drive the handler and read back its reply bytes
//! 4. Drain any deferred operations the handler registered

use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};
use wasmtime::{Instance, Memory, Ref, Store, Table, Trap, TypedFunc};

use crate::abi::{self, unpack_ptr_len};
use crate::context::{EventContext, calculate_fuel_consumed, get_remaining_fuel};
use crate::safecall::wasm_fault;
use edge_bridge_common::{BridgeError, GuestFault};

/// A ready guest instance, bound to a single event.
///
/// Owns the event's store and the resolved ABI exports. Never reused:
/// the instance is dropped with the event, and with it the linear memory,
/// binding registry, and any undrained deferred work.
pub struct GuestInstance {
    store: Store<EventContext>,
    memory: Memory,
    table: Table,
    alloc: TypedFunc<i32, i32>,
}

impl GuestInstance {
    /// Bind a freshly instantiated, handshake-complete instance.
    ///
    /// Resolves the ABI exports the bridge drives after startup.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ModuleLoad`] if a required export is missing
    /// or has the wrong shape; this is a property of the deployed image.
    pub fn bind(
        mut store: Store<EventContext>,
        instance: Instance,
    ) -> Result<Self, BridgeError> {
        let memory = instance
            .get_memory(&mut store, abi::GUEST_MEMORY)
            .ok_or_else(|| missing_export(abi::GUEST_MEMORY))?;

        let table = instance
            .get_table(&mut store, abi::GUEST_TABLE)
            .ok_or_else(|| missing_export(abi::GUEST_TABLE))?;

        let alloc = instance
            .get_typed_func::<i32, i32>(&mut store, abi::GUEST_ALLOC)
            .map_err(|_| missing_export(abi::GUEST_ALLOC))?;

        Ok(Self {
            store,
            memory,
            table,
            alloc,
        })
    }

    /// Invoke a registered handler binding with the given payload.
    ///
    /// The payload is staged through the guest's allocator; the handler's
    /// packed reply is read back out of guest memory.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::BindingMissing`] if the guest registered no handler
    ///   under `name`
    /// - [`BridgeError::Guest`] if the handler (or the allocator) faults
    /// - [`BridgeError::MalformedPayload`] if the reply range lies outside
    ///   guest memory
    #[instrument(skip(self, payload), fields(binding = %name, payload_len = payload.len()))]
    pub async fn invoke_binding(
        &mut self,
        name: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, BridgeError> {
        let start = Instant::now();
        let initial_fuel = get_remaining_fuel(&self.store).unwrap_or(0);

        let fn_index = self
            .store
            .data()
            .binding(name)
            .ok_or_else(|| BridgeError::binding_missing(name))?;

        let handler = self.table_func(fn_index, name)?;
        let handler = handler
            .typed::<(i32, i32), i64>(&self.store)
            .map_err(|e| {
                BridgeError::Guest(GuestFault::new(format!(
                    "binding '{name}' has an incompatible signature: {e}"
                )))
            })?;

        let (ptr, len) = self.stage_payload(payload).await?;

        debug!(fn_index, "Invoking guest binding");
        let result = handler.call_async(&mut self.store, (ptr, len)).await;

        // Finalize metrics before inspecting the outcome
        let fuel_consumed = calculate_fuel_consumed(initial_fuel, &self.store);
        let memory_used = self.memory.data_size(&self.store);
        let ctx = self.store.data_mut();
        ctx.metrics.fuel_consumed = fuel_consumed;
        ctx.metrics.memory_used_bytes = memory_used;
        ctx.finalize_metrics();

        let duration = start.elapsed();

        let packed = match result {
            Ok(packed) => packed,
            Err(trap) => {
                if is_out_of_fuel(&trap) {
                    warn!(
                        duration_ms = duration.as_millis(),
                        fuel_consumed, "Guest binding terminated: fuel exhausted"
                    );
                } else {
                    error!(
                        duration_ms = duration.as_millis(),
                        fuel_consumed,
                        trap_message = %trap,
                        "Guest binding trapped"
                    );
                }
                return Err(BridgeError::Guest(wasm_fault(&trap)));
            }
        };

        let reply = self.read_reply(packed)?;

        info!(
            duration_ms = duration.as_millis(),
            fuel_consumed,
            reply_len = reply.len(),
            "Guest binding completed"
        );

        Ok(reply)
    }

    /// Drive every deferred operation the handler registered.
    ///
    /// Deferred faults do not fail the event: they are recorded on the
    /// event context and logged. Returns the number of operations driven.
    pub async fn run_deferred(&mut self) -> Result<usize, BridgeError> {
        let pending = self.store.data_mut().execution.take_deferred();
        let count = pending.len();

        for fn_index in pending {
            let func = match self.table_func(fn_index, "deferred") {
                Ok(func) => func,
                Err(_) => {
                    let fault =
                        GuestFault::new(format!("deferred index {fn_index} is not callable"));
                    warn!(fn_index, "Skipping deferred operation: {}", fault.message);
                    self.store.data_mut().record_fault(fault);
                    continue;
                }
            };

            let typed = match func.typed::<(), ()>(&self.store) {
                Ok(typed) => typed,
                Err(e) => {
                    let fault = GuestFault::new(format!(
                        "deferred index {fn_index} has an incompatible signature: {e}"
                    ));
                    warn!(fn_index, "Skipping deferred operation: {}", fault.message);
                    self.store.data_mut().record_fault(fault);
                    continue;
                }
            };

            if let Err(trap) = typed.call_async(&mut self.store, ()).await {
                let fault = wasm_fault(&trap);
                warn!(fn_index, trap_message = %fault.message, "Deferred operation trapped");
                self.store.data_mut().record_fault(fault);
            }
        }

        if count > 0 {
            debug!(count, "Deferred operations drained");
        }

        Ok(count)
    }

    /// The event context owned by this instance.
    pub fn context(&self) -> &EventContext {
        self.store.data()
    }

    /// Mutable access to the event context.
    pub fn context_mut(&mut self) -> &mut EventContext {
        self.store.data_mut()
    }

    /// Stage a payload in guest memory, returning its (ptr, len) pair.
    async fn stage_payload(&mut self, payload: &[u8]) -> Result<(i32, i32), BridgeError> {
        let len = i32::try_from(payload.len()).map_err(|_| {
            BridgeError::malformed_payload("event payload exceeds the guest pointer range")
        })?;

        let ptr = self
            .alloc
            .call_async(&mut self.store, len)
            .await
            .map_err(|trap| {
                let mut fault = wasm_fault(&trap);
                fault.message = format!("guest allocator trapped: {}", fault.message);
                BridgeError::Guest(fault)
            })?;

        self.memory
            .write(&mut self.store, ptr as u32 as usize, payload)
            .map_err(|_| {
                BridgeError::Guest(GuestFault::new(format!(
                    "guest allocator returned an out-of-bounds region (ptr={ptr}, len={len})"
                )))
            })?;

        Ok((ptr, len))
    }

    /// Read the handler's packed reply out of guest memory.
    fn read_reply(&self, packed: i64) -> Result<Vec<u8>, BridgeError> {
        let (ptr, len) = unpack_ptr_len(packed);
        let data = self.memory.data(&self.store);

        let start = ptr as usize;
        let end = start
            .checked_add(len as usize)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                BridgeError::malformed_payload(format!(
                    "reply range out of bounds (ptr={ptr}, len={len}, memory={})",
                    data.len()
                ))
            })?;

        Ok(data[start..end].to_vec())
    }

    /// Resolve a funcref-table entry.
    fn table_func(&mut self, index: u32, what: &str) -> Result<wasmtime::Func, BridgeError> {
        match self.table.get(&mut self.store, u64::from(index)) {
            Some(Ref::Func(Some(func))) => Ok(func),
            _ => Err(BridgeError::Guest(GuestFault::new(format!(
                "'{what}' refers to funcref table index {index}, which holds no function"
            )))),
        }
    }
}

impl std::fmt::Debug for GuestInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestInstance")
            .field("event_id", &self.store.data().event_id)
            .finish_non_exhaustive()
    }
}

fn missing_export(name: &str) -> BridgeError {
    BridgeError::module_load(format!("guest does not export '{name}'"))
}

/// Check if an error is due to fuel exhaustion.
fn is_out_of_fuel(error: &wasmtime::Error) -> bool {
    error
        .downcast_ref::<Trap>()
        .is_some_and(|trap| *trap == Trap::OutOfFuel)
}
