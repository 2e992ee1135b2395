//! Per-event instance assembly.
//!
//! [`InstanceBridge`] turns the process-wide compiled module into a live,
//! ready [`GuestInstance`] for one event:
//!
//! 1. Get the compiled module from the cache (compiling on first use)
//! 2. Create the event's readiness latch
//! 3. Assemble a fresh import object: runtime shim, bridge capabilities,
//!    and the latch's `ready` import
//! 4. Create the event's store with injected environment bindings
//! 5. Instantiate and drive the guest entrypoint
//! 6. Await readiness within the configured bound, then bind the instance
//!
//! Nothing is shared between events except the engine and the compiled
//! module; every store, linker, and latch is built here, per event.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};
use wasmtime::Linker;

use edge_bridge_common::{BridgeError, ExecutionConfig};
use edge_bridge_core::abi;
use edge_bridge_core::context::{RuntimeContext, create_store};
use edge_bridge_core::{EventContext, GuestInstance, ModuleCache, ReadinessLatch, WasmEngine};

use crate::imports::{register_bridge_imports, register_ready};
use crate::shim::{RuntimeShim, StandardShim};

/// Assembles a ready guest instance for each platform event.
pub struct InstanceBridge {
    engine: WasmEngine,
    cache: Arc<ModuleCache>,
    shim: Arc<dyn RuntimeShim>,
    config: ExecutionConfig,
}

impl InstanceBridge {
    /// Create a bridge using the standard runtime shim.
    pub fn new(engine: WasmEngine, cache: Arc<ModuleCache>, config: ExecutionConfig) -> Self {
        Self::with_shim(engine, cache, Arc::new(StandardShim), config)
    }

    /// Create a bridge with a custom runtime shim.
    pub fn with_shim(
        engine: WasmEngine,
        cache: Arc<ModuleCache>,
        shim: Arc<dyn RuntimeShim>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            engine,
            cache,
            shim,
            config,
        }
    }

    /// The engine this bridge instantiates against.
    pub fn engine(&self) -> &WasmEngine {
        &self.engine
    }

    /// The execution limits applied to each event.
    pub fn execution_config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Instantiate a ready guest for one event.
    ///
    /// `env` becomes the event's injected environment bindings; the event
    /// id is generated.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ModuleLoad`] if the image cannot be compiled or
    ///   lacks the required ABI exports
    /// - [`BridgeError::Startup`] if instantiation fails or the entrypoint
    ///   traps before readiness
    /// - [`BridgeError::ReadinessTimeout`] if the entrypoint returns
    ///   without ever signaling readiness
    pub async fn instantiate(
        &self,
        env: HashMap<String, String>,
    ) -> Result<GuestInstance, BridgeError> {
        self.instantiate_with(RuntimeContext::new(env)).await
    }

    /// Instantiate a ready guest with a caller-supplied event context.
    #[instrument(skip(self, ctx), fields(event_id = %ctx.event_id))]
    pub async fn instantiate_with(&self, ctx: RuntimeContext) -> Result<GuestInstance, BridgeError> {
        let start = Instant::now();

        let module = self.cache.get().await?;

        let (latch, signal) = ReadinessLatch::new();

        let mut linker: Linker<EventContext> = Linker::new(self.engine.inner());
        self.shim.register(&mut linker)?;
        register_bridge_imports(&mut linker)?;
        register_ready(&mut linker, signal)?;

        let mut store = create_store(&self.engine, &self.config, ctx)?;

        let instance = linker
            .instantiate_async(&mut store, module.module())
            .await
            .map_err(|e| BridgeError::startup(format!("instantiation failed: {e}")))?;

        let entrypoint = instance
            .get_typed_func::<(), ()>(&mut store, abi::GUEST_START)
            .map_err(|e| {
                BridgeError::module_load(format!(
                    "guest entrypoint '{}' unavailable: {e}",
                    abi::GUEST_START
                ))
            })?;

        entrypoint
            .call_async(&mut store, ())
            .await
            .map_err(|trap| BridgeError::startup(trap.to_string()))?;

        latch.wait(self.config.ready_timeout()).await?;

        let guest = GuestInstance::bind(store, instance)?;

        debug!(
            content_hash = %module.content_hash(),
            startup_ms = start.elapsed().as_millis() as u64,
            bindings = guest.context().binding_names().count(),
            "Guest instance ready"
        );

        Ok(guest)
    }
}

impl std::fmt::Debug for InstanceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceBridge")
            .field("module_compiled", &self.cache.is_compiled())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
