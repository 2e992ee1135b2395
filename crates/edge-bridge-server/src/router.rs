//! HTTP router configuration.
//!
//! This module provides functions to build the Axum router with all
//! necessary routes and middleware.

use std::time::Duration;

use axum::routing::{any, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{handle_request, health_check, queue_event, scheduled_event};
use crate::state::AppState;

/// Build the main application router.
///
/// Routes:
/// - `ANY /` and `ANY /*path` - Worker requests, dispatched across the bridge
/// - `GET /_bridge/health` - Health check
/// - `POST /_bridge/events/scheduled` - Inject a scheduled event
/// - `POST /_bridge/events/queue` - Inject a queue batch
///
/// The `/_bridge` routes are static and win over the catch-all, so a guest
/// cannot shadow them.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    // Bridge control routes
    let bridge_routes = Router::new()
        .route("/_bridge/health", get(health_check))
        .route("/_bridge/events/scheduled", post(scheduled_event))
        .route("/_bridge/events/queue", post(queue_event));

    // Everything else is worker traffic
    let worker_routes = Router::new()
        .route("/", any(handle_request))
        .route("/*path", any(handle_request));

    Router::new()
        .merge(bridge_routes)
        .merge(worker_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    use edge_bridge_common::{BridgeConfig, EngineConfig};
    use edge_bridge_core::ModuleSource;

    // Registers all three bindings to the same canned reply. The packed
    // return points at the JSON response document; scheduled and queue
    // deliveries ignore its content.
    const ALL_EVENTS_GUEST: &str = r#"
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
            (call $register (i32.const 16) (i32.const 15) (i32.const 1))
            (call $register (i32.const 32) (i32.const 11) (i32.const 1))
            (call $ready))
          (elem (i32.const 1) $reply)
          (data (i32.const 0) "handleRequest")
          (data (i32.const 16) "handleScheduled")
          (data (i32.const 32) "handleQueue")
          (data (i32.const 2048) "{\"status\":200,\"headers\":[],\"body\":[104,105]}"))
    "#;

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            engine: EngineConfig {
                pooling_allocator: false,
                epoch_interruption: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn setup_router(wat: &str) -> Router {
        let state =
            AppState::new(&test_config(), ModuleSource::Wat(wat.to_string())).unwrap();
        build_router(state, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_router(ALL_EVENTS_GUEST);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/_bridge/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        // Health never compiles the module
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["module_compiled"], false);
    }

    #[tokio::test]
    async fn test_worker_request_roundtrip() {
        let app = setup_router(ALL_EVENTS_GUEST);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hi");
    }

    #[tokio::test]
    async fn test_root_path_reaches_guest() {
        let app = setup_router(ALL_EVENTS_GUEST);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_scheduled_event_injection() {
        let app = setup_router(ALL_EVENTS_GUEST);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/_bridge/events/scheduled")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"cron": "*/5 * * * *", "scheduled_time_ms": 1700000000000}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["delivered"], true);
    }

    #[tokio::test]
    async fn test_queue_batch_injection() {
        let app = setup_router(ALL_EVENTS_GUEST);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/_bridge/events/queue")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"queue": "jobs", "messages": [{"id": "m1", "timestamp_ms": 123, "body": {"k": "v"}}]}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_event_body_is_client_error() {
        let app = setup_router(ALL_EVENTS_GUEST);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/_bridge/events/scheduled")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
