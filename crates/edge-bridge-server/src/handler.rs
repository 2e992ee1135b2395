//! HTTP handlers bridging server routes to guest events.
//!
//! The catch-all handler turns each HTTP request into a worker request and
//! sends it through the event router; the `/_bridge` handlers inject
//! scheduled and queue events and report process health.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use edge_bridge_host::{QueueBatch, ScheduledEvent, WorkerResponse};

use crate::request::worker_request_from_axum;
use crate::response::{bridge_error_response, worker_response_to_axum};
use crate::state::AppState;

/// Largest request body staged into guest memory.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Handle an HTTP request by dispatching it across the bridge.
///
/// This handler:
/// 1. Reads the request body
/// 2. Converts the request into the bridge's wire shape
/// 3. Routes it (guest binding or static assets)
/// 4. Converts the guest's reply back into an HTTP response
#[instrument(skip(state, req), fields(method = %req.method(), uri = %req.uri()))]
pub async fn handle_request(State(state): State<AppState>, req: Request) -> impl IntoResponse {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to read request body");
            return worker_response_to_axum(WorkerResponse::error(400, "Unreadable request body"));
        }
    };

    let head = Request::from_parts(parts, ());
    let request = worker_request_from_axum(&head, bytes);

    info!(request_id = %request_id, "Handling worker request");

    let result = state.router().on_request(request).await;
    let duration = start.elapsed();

    match result {
        Ok(response) => {
            info!(
                request_id = %request_id,
                status = response.status,
                duration_ms = duration.as_millis(),
                "Request completed"
            );
            worker_response_to_axum(response)
        }
        Err(e) => {
            error!(
                request_id = %request_id,
                error = %e,
                duration_ms = duration.as_millis(),
                "Request failed"
            );
            bridge_error_response(&e)
        }
    }
}

/// Inject a scheduled event into the guest.
///
/// The guest's reply carries no payload; delivery either succeeds or
/// reports the bridge error.
#[instrument(skip(state, event), fields(cron = %event.cron))]
pub async fn scheduled_event(
    State(state): State<AppState>,
    Json(event): Json<ScheduledEvent>,
) -> impl IntoResponse {
    match state.router().on_scheduled(event).await {
        Ok(()) => {
            info!("Scheduled event delivered");
            (StatusCode::OK, Json(serde_json::json!({"delivered": true}))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Scheduled event failed");
            bridge_error_response(&e)
        }
    }
}

/// Inject a queue batch into the guest.
#[instrument(skip(state, batch), fields(queue = %batch.queue, messages = batch.messages.len()))]
pub async fn queue_event(
    State(state): State<AppState>,
    Json(batch): Json<QueueBatch>,
) -> impl IntoResponse {
    match state.router().on_queue_batch(batch).await {
        Ok(()) => {
            info!("Queue batch delivered");
            (StatusCode::OK, Json(serde_json::json!({"delivered": true}))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Queue batch failed");
            bridge_error_response(&e)
        }
    }
}

/// Health check handler.
///
/// Ticks the epoch clock to verify the engine is responsive and reports
/// whether the deployed module has been compiled yet.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    state.engine().increment_epoch();

    let body = serde_json::json!({
        "status": "ok",
        "module_compiled": state.module_compiled(),
    });

    (StatusCode::OK, Json(body))
}
