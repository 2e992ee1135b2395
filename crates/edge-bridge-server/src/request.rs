//! HTTP request conversion for the bridge.
//!
//! The guest-facing request type lives in the host crate as
//! [`WorkerRequest`]; this module only knows how to build one from the
//! server's Axum request.

use axum::http::Request;
use bytes::Bytes;

use edge_bridge_host::WorkerRequest;

/// Convert Axum request parts into a bridge request.
///
/// Headers with non-UTF-8 values are dropped; an empty body becomes
/// `None` so the guest can distinguish "no body" from "empty body".
///
/// # Arguments
///
/// * `req` - The HTTP request (headers and metadata)
/// * `body` - The request body as bytes
pub fn worker_request_from_axum<B>(req: &Request<B>, body: Bytes) -> WorkerRequest {
    let method = req.method().to_string();
    let uri = req.uri().to_string();

    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect();

    let body = if body.is_empty() {
        None
    } else {
        Some(body.to_vec())
    };

    WorkerRequest {
        method,
        uri,
        headers,
        body,
    }
}
