//! Event routing into the guest.
//!
//! [`EventRouter`] is the single entry point for delivering platform
//! events. Each event kind maps to one guest binding:
//!
//! | Event            | Binding          |
//! |------------------|------------------|
//! | HTTP request     | `handleRequest`  |
//! | Cron trigger     | `handleScheduled`|
//! | Queue batch      | `handleQueue`    |
//!
//! Requests go through a routing pre-step first: when an API prefix is
//! configured and the path falls outside it, the request is served by the
//! [`StaticAssets`] collaborator and the guest is never instantiated.
//!
//! Every delivered event gets a fresh instance from the bridge. Deferred
//! callbacks the handler registered are drained on a detached task after
//! the event's outcome is produced, so replies are never held back by
//! background work.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use edge_bridge_common::{BridgeError, RouteConfig};
use edge_bridge_core::abi;
use edge_bridge_core::GuestInstance;

use crate::bridge::InstanceBridge;
use crate::events::{QueueBatch, ScheduledEvent, WorkerRequest, WorkerResponse};

/// Serves requests that do not route to the guest.
///
/// The filesystem implementation lives in the server crate; tests supply
/// their own.
#[async_trait]
pub trait StaticAssets: Send + Sync {
    /// Produce a response for a non-guest request.
    async fn fetch(&self, request: &WorkerRequest) -> Result<WorkerResponse, BridgeError>;
}

/// Routes platform events to guest bindings.
pub struct EventRouter {
    bridge: Arc<InstanceBridge>,
    routes: RouteConfig,
    assets: Option<Arc<dyn StaticAssets>>,
    env: HashMap<String, String>,
}

impl EventRouter {
    /// Create a router delivering every event to the guest.
    ///
    /// `env` becomes the injected environment bindings of every event this
    /// router delivers.
    pub fn new(
        bridge: Arc<InstanceBridge>,
        routes: RouteConfig,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            bridge,
            routes,
            assets: None,
            env,
        }
    }

    /// Attach a static-asset collaborator for non-guest requests.
    pub fn with_assets(mut self, assets: Arc<dyn StaticAssets>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// The bridge this router instantiates through.
    pub fn bridge(&self) -> &InstanceBridge {
        &self.bridge
    }

    /// Deliver an HTTP request.
    ///
    /// # Errors
    ///
    /// Instantiation errors propagate unchanged; a guest reply that does
    /// not decode as a response is [`BridgeError::MalformedPayload`].
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path()))]
    pub async fn on_request(&self, request: WorkerRequest) -> Result<WorkerResponse, BridgeError> {
        if !self.routes.routes_to_guest(request.path()) {
            debug!("Request outside guest routes");
            return self.serve_asset(&request).await;
        }

        let mut guest = self.bridge.instantiate(self.env.clone()).await?;

        let payload = encode(&request)?;
        let reply = guest.invoke_binding(abi::BINDING_REQUEST, &payload).await?;

        let response: WorkerResponse = serde_json::from_slice(&reply).map_err(|e| {
            BridgeError::malformed_payload(format!("guest reply is not a response: {e}"))
        })?;

        drain_deferred(guest);

        Ok(response)
    }

    /// Deliver a cron trigger. The guest's reply is ignored.
    #[instrument(skip(self, event), fields(cron = %event.cron))]
    pub async fn on_scheduled(&self, event: ScheduledEvent) -> Result<(), BridgeError> {
        let mut guest = self.bridge.instantiate(self.env.clone()).await?;

        let payload = encode(&event)?;
        guest
            .invoke_binding(abi::BINDING_SCHEDULED, &payload)
            .await?;

        drain_deferred(guest);

        Ok(())
    }

    /// Deliver a queue batch. The guest's reply is ignored.
    #[instrument(skip(self, batch), fields(queue = %batch.queue, messages = batch.messages.len()))]
    pub async fn on_queue_batch(&self, batch: QueueBatch) -> Result<(), BridgeError> {
        let mut guest = self.bridge.instantiate(self.env.clone()).await?;

        let payload = encode(&batch)?;
        guest.invoke_binding(abi::BINDING_QUEUE, &payload).await?;

        drain_deferred(guest);

        Ok(())
    }

    async fn serve_asset(&self, request: &WorkerRequest) -> Result<WorkerResponse, BridgeError> {
        match &self.assets {
            Some(assets) => assets.fetch(request).await,
            None => Ok(WorkerResponse::error(404, "Not found")),
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("routes", &self.routes)
            .field("has_assets", &self.assets.is_some())
            .finish_non_exhaustive()
    }
}

fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, BridgeError> {
    serde_json::to_vec(payload)
        .map_err(|e| BridgeError::malformed_payload(format!("failed to encode event: {e}")))
}

/// Drive deferred guest callbacks without holding up the event outcome.
///
/// Takes the instance with it; the store, and everything in it, is dropped
/// once the drain finishes.
fn drain_deferred(mut guest: GuestInstance) {
    if guest.context().execution.pending() == 0 {
        return;
    }

    tokio::spawn(async move {
        if let Err(e) = guest.run_deferred().await {
            warn!(error = %e, "Deferred drain failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use edge_bridge_common::{EngineConfig, ExecutionConfig};
    use edge_bridge_core::{ModuleCache, ModuleSource, WasmEngine};

    // Registers handleRequest only. The handler ignores its input and
    // replies with a canned JSON response whose body is [104, 105] ("hi").
    const CANNED_GUEST: &str = r#"
        (module
          (import "bridge" "ready" (func $ready))
          (import "bridge" "register_handler" (func $register (param i32 i32 i32)))
          (memory (export "memory") 1)
          (table (export "__indirect_function_table") 2 funcref)
          (func (export "alloc") (param i32) (result i32) (i32.const 8192))
          (func $reply (param i32 i32) (result i64)
            ;; (2048 << 32) | 44
            (i64.const 8796093022252))
          (func (export "start")
            (call $register (i32.const 0) (i32.const 13) (i32.const 1))
            (call $ready))
          (elem (i32.const 1) $reply)
          (data (i32.const 0) "handleRequest")
          (data (i32.const 2048) "{\"status\":200,\"headers\":[],\"body\":[104,105]}"))
    "#;

    // Same shape, but the reply bytes are not a response document.
    const GARBLED_GUEST: &str = r#"
        (module
          (import "bridge" "ready" (func $ready))
          (import "bridge" "register_handler" (func $register (param i32 i32 i32)))
          (memory (export "memory") 1)
          (table (export "__indirect_function_table") 2 funcref)
          (func (export "alloc") (param i32) (result i32) (i32.const 8192))
          (func $reply (param i32 i32) (result i64)
            ;; (0 << 32) | 13: the binding name bytes, not JSON
            (i64.const 13))
          (func (export "start")
            (call $register (i32.const 0) (i32.const 13) (i32.const 1))
            (call $ready))
          (elem (i32.const 1) $reply)
          (data (i32.const 0) "handleRequest"))
    "#;

    fn test_router(wat: &str, routes: RouteConfig) -> EventRouter {
        let engine = WasmEngine::new(&EngineConfig {
            pooling_allocator: false,
            epoch_interruption: false,
            ..Default::default()
        })
        .unwrap();
        let cache = Arc::new(ModuleCache::new(
            engine.clone(),
            ModuleSource::Wat(wat.to_string()),
        ));
        let bridge = Arc::new(InstanceBridge::new(
            engine,
            cache,
            ExecutionConfig::default(),
        ));
        EventRouter::new(bridge, routes, HashMap::new())
    }

    struct CountingAssets {
        served: AtomicUsize,
    }

    #[async_trait]
    impl StaticAssets for CountingAssets {
        async fn fetch(&self, _request: &WorkerRequest) -> Result<WorkerResponse, BridgeError> {
            self.served.fetch_add(1, Ordering::SeqCst);
            Ok(WorkerResponse::text(200, "asset"))
        }
    }

    #[tokio::test]
    async fn test_request_reaches_guest() {
        let router = test_router(CANNED_GUEST, RouteConfig::default());

        let response = router
            .on_request(WorkerRequest::new("GET", "/anything"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"hi");
    }

    #[tokio::test]
    async fn test_prefix_miss_without_assets_is_not_found() {
        let routes = RouteConfig {
            api_prefix: Some("/api/".to_string()),
        };
        let router = test_router(CANNED_GUEST, routes);

        let response = router
            .on_request(WorkerRequest::new("GET", "/static/logo.png"))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_prefix_miss_served_by_assets() {
        let routes = RouteConfig {
            api_prefix: Some("/api/".to_string()),
        };
        let assets = Arc::new(CountingAssets {
            served: AtomicUsize::new(0),
        });
        let router = test_router(CANNED_GUEST, routes).with_assets(assets.clone());

        let response = router
            .on_request(WorkerRequest::new("GET", "/static/logo.png"))
            .await
            .unwrap();

        assert_eq!(response.body, b"asset");
        assert_eq!(assets.served.load(Ordering::SeqCst), 1);

        // Prefixed path still reaches the guest, query string ignored
        let response = router
            .on_request(WorkerRequest::new("GET", "/api/users?page=2"))
            .await
            .unwrap();
        assert_eq!(response.body, b"hi");
        assert_eq!(assets.served.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_garbled_reply_is_malformed_payload() {
        let router = test_router(GARBLED_GUEST, RouteConfig::default());

        let result = router.on_request(WorkerRequest::new("GET", "/")).await;

        assert!(matches!(result, Err(BridgeError::MalformedPayload { .. })));
    }

    #[tokio::test]
    async fn test_scheduled_without_binding_is_binding_missing() {
        let router = test_router(CANNED_GUEST, RouteConfig::default());

        let result = router
            .on_scheduled(ScheduledEvent {
                cron: "*/5 * * * *".to_string(),
                scheduled_time_ms: 1_700_000_000_000,
            })
            .await;

        match result {
            Err(BridgeError::BindingMissing { binding }) => {
                assert_eq!(binding, "handleScheduled");
            }
            other => panic!("expected BindingMissing, got {other:?}"),
        }
    }
}
