//! Shared application state.
//!
//! This module provides [`AppState`], which holds the process-wide bridge
//! resources shared across all HTTP request handlers, and the epoch pump
//! that drives guest deadlines.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use edge_bridge_common::{BridgeConfig, BridgeError, ConfigFile};
use edge_bridge_core::{ModuleCache, ModuleSource, WasmEngine};
use edge_bridge_host::{EventRouter, InstanceBridge, StaticAssets};

use crate::assets::DirAssets;

/// Shared state across all request handlers.
///
/// This struct is cloned for each request, so it uses `Arc` for shared
/// data. Only process-wide resources live here; everything event-scoped is
/// created by the bridge per event.
#[derive(Clone)]
pub struct AppState {
    /// Wasmtime engine (shared across all events).
    engine: WasmEngine,

    /// Compile-once cache for the deployed guest module.
    cache: Arc<ModuleCache>,

    /// Event router over the instance bridge.
    router: Arc<EventRouter>,
}

impl AppState {
    /// Create state for a deployment without environment or assets.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be created.
    pub fn new(config: &BridgeConfig, source: ModuleSource) -> Result<Self, BridgeError> {
        Self::with_worker(config, source, HashMap::new(), None)
    }

    /// Create state for a full worker deployment.
    ///
    /// # Arguments
    ///
    /// * `config` - Bridge configuration (engine, execution, routes)
    /// * `source` - Where the guest image comes from
    /// * `env` - Environment bindings injected into every event
    /// * `assets` - Optional collaborator for non-guest requests
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be created.
    pub fn with_worker(
        config: &BridgeConfig,
        source: ModuleSource,
        env: HashMap<String, String>,
        assets: Option<Arc<dyn StaticAssets>>,
    ) -> Result<Self, BridgeError> {
        let engine = WasmEngine::new(&config.engine)?;
        let cache = Arc::new(ModuleCache::new(engine.clone(), source));
        let bridge = Arc::new(InstanceBridge::new(
            engine.clone(),
            cache.clone(),
            config.execution.clone(),
        ));

        let mut router = EventRouter::new(bridge, config.routes.clone(), env);
        if let Some(assets) = assets {
            router = router.with_assets(assets);
        }

        Ok(Self {
            engine,
            cache,
            router: Arc::new(router),
        })
    }

    /// Create state from a loaded deployment config file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidConfig`] if no worker module is
    /// configured, or an engine creation error.
    pub fn from_config_file(file: &ConfigFile) -> Result<Self, BridgeError> {
        let module = file.worker.module.as_ref().ok_or_else(|| {
            BridgeError::invalid_config("worker.module is required to serve events")
        })?;
        let source = ModuleSource::File(PathBuf::from(module));

        let assets = file
            .worker
            .assets_dir
            .as_ref()
            .map(|dir| Arc::new(DirAssets::new(dir)) as Arc<dyn StaticAssets>);

        Self::with_worker(&file.bridge, source, file.worker.env.clone(), assets)
    }

    /// Get the Wasmtime engine.
    pub fn engine(&self) -> &WasmEngine {
        &self.engine
    }

    /// Get the event router.
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Returns `true` once the guest module has been compiled.
    pub fn module_compiled(&self) -> bool {
        self.cache.is_compiled()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("module_compiled", &self.module_compiled())
            .finish_non_exhaustive()
    }
}

/// Tick the engine's epoch clock every millisecond.
///
/// Store deadlines are expressed in epoch ticks; without a running pump
/// they would never fire. The returned handle is aborted at shutdown.
pub fn spawn_epoch_pump(engine: WasmEngine) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            engine.increment_epoch();
        }
    })
}
