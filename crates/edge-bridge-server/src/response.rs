//! HTTP response conversion from bridge results.
//!
//! Guest replies arrive as [`WorkerResponse`] values; this module turns
//! them into Axum responses and maps bridge errors onto HTTP statuses.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};

use edge_bridge_common::BridgeError;
use edge_bridge_host::WorkerResponse;

/// Convert a guest reply into an Axum response.
///
/// Headers the guest produced that are not valid HTTP header names or
/// values are dropped rather than failing the whole response.
pub fn worker_response_to_axum(resp: WorkerResponse) -> Response<Body> {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = Response::builder().status(status);

    for (name, value) in &resp.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            response = response.header(name, value);
        }
    }

    response.body(Body::from(resp.body)).unwrap_or_else(|_| {
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::from("Internal server error"))
            .unwrap()
    })
}

/// Map a bridge error onto an HTTP error response.
///
/// Faults on the event path stay inside the event: the status says what
/// kind of failure it was, and the body carries the error message as JSON.
pub fn bridge_error_response(error: &BridgeError) -> Response<Body> {
    let status = match error {
        // The deployment cannot start or come up in time.
        BridgeError::ModuleLoad { .. } | BridgeError::Startup { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        BridgeError::ReadinessTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,

        // The guest does not handle this event kind.
        BridgeError::BindingMissing { .. } => StatusCode::NOT_IMPLEMENTED,

        // The guest replied with something the bridge cannot decode.
        BridgeError::MalformedPayload { .. } => StatusCode::BAD_GATEWAY,

        BridgeError::Guest(_) | BridgeError::InvalidConfig { .. } | BridgeError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let body = serde_json::json!({
        "error": error.to_string()
    })
    .to_string();

    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal server error"))
                .unwrap()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_bridge_common::GuestFault;

    #[test]
    fn test_worker_response_to_axum() {
        let resp = WorkerResponse::text(200, "Hello");
        let axum_resp = worker_response_to_axum(resp);
        assert_eq!(axum_resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_invalid_status_becomes_500() {
        let resp = WorkerResponse::empty(1000);
        let axum_resp = worker_response_to_axum(resp);
        assert_eq!(axum_resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_header_is_dropped() {
        let resp = WorkerResponse::text(200, "ok").with_header("bad header name", "x");
        let axum_resp = worker_response_to_axum(resp);

        assert_eq!(axum_resp.status(), StatusCode::OK);
        assert!(!axum_resp.headers().contains_key("bad header name"));
    }

    #[test]
    fn test_unavailability_maps_to_server_errors() {
        let load = BridgeError::module_load("bad magic");
        assert_eq!(
            bridge_error_response(&load).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let startup = BridgeError::startup("entrypoint trapped");
        assert_eq!(
            bridge_error_response(&startup).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let timeout = BridgeError::ReadinessTimeout { waited_ms: 5_000 };
        assert_eq!(
            bridge_error_response(&timeout).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_binding_missing_is_not_implemented() {
        let error = BridgeError::binding_missing("handleQueue");
        assert_eq!(
            bridge_error_response(&error).status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn test_malformed_payload_is_bad_gateway() {
        let error = BridgeError::malformed_payload("guest reply is not a response");
        assert_eq!(
            bridge_error_response(&error).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_guest_fault_is_internal_error() {
        let error = BridgeError::Guest(GuestFault::new("unreachable"));
        assert_eq!(
            bridge_error_response(&error).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
