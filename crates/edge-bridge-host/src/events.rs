//! Event payloads crossing the bridge.
//!
//! These types are the host-visible contract for the three event kinds.
//! Each is serialized as JSON, staged into guest memory, and handed to the
//! matching binding; request handlers reply with JSON the bridge decodes
//! back into a [`WorkerResponse`].
//!
//! The HTTP conversions to and from the server's own types live in the
//! server crate; everything here is plain data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An HTTP request delivered to the guest's `handleRequest` binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request URI, path and query included
    pub uri: String,
    /// Request headers as key-value pairs
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Optional request body
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

impl WorkerRequest {
    /// Create a new empty request.
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// The request path, query string stripped.
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or(&self.uri)
    }

    /// Get a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }

    /// Check if the request has a JSON content type.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains("application/json"))
    }
}

/// The guest's reply to an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers as key-value pairs
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Response body
    #[serde(default)]
    pub body: Vec<u8>,
}

impl WorkerResponse {
    /// Create a simple text response.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.as_bytes().to_vec(),
        }
    }

    /// Create a JSON response.
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    /// Create an error response with JSON body.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({
            "error": message
        })
        .to_string();
        Self::json(status, &body)
    }

    /// Create an empty response with just a status code.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header to the response.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A cron trigger delivered to the guest's `handleScheduled` binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// The cron expression that fired.
    pub cron: String,
    /// Scheduled time as Unix milliseconds.
    pub scheduled_time_ms: i64,
}

/// A message batch delivered to the guest's `handleQueue` binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueBatch {
    /// Name of the queue the batch was drained from.
    pub queue: String,
    /// The messages, in arrival order.
    pub messages: Vec<QueueMessage>,
}

/// One message in a queue batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Platform-assigned message id.
    pub id: String,
    /// Enqueue time as Unix milliseconds.
    pub timestamp_ms: i64,
    /// Arbitrary JSON message body.
    pub body: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request() {
        let req = WorkerRequest::new("GET", "/api/test");
        assert_eq!(req.method, "GET");
        assert_eq!(req.uri, "/api/test");
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
    }

    #[test]
    fn test_path_strips_query() {
        let req = WorkerRequest::new("GET", "/api/users?page=2");
        assert_eq!(req.path(), "/api/users");

        let req = WorkerRequest::new("GET", "/api/users");
        assert_eq!(req.path(), "/api/users");
    }

    #[test]
    fn test_get_header() {
        let mut req = WorkerRequest::new("GET", "/");
        req.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));

        assert_eq!(req.get_header("content-type"), Some("application/json"));
        assert_eq!(req.get_header("Content-Type"), Some("application/json"));
        assert!(req.get_header("X-Missing").is_none());
        assert!(req.is_json());
    }

    #[test]
    fn test_request_decodes_with_defaults() {
        let req: WorkerRequest =
            serde_json::from_str(r#"{"method": "GET", "uri": "/"}"#).unwrap();

        assert_eq!(req.method, "GET");
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
    }

    #[test]
    fn test_response_helpers() {
        let resp = WorkerResponse::text(200, "Hello");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"Hello");

        let resp = WorkerResponse::error(404, "Not found");
        assert!(String::from_utf8_lossy(&resp.body).contains("Not found"));

        let resp = WorkerResponse::empty(204).with_header("X-Request-Id", "123");
        assert_eq!(resp.headers.len(), 1);
    }

    #[test]
    fn test_response_decodes_guest_reply() {
        // The shape guests actually produce over the wire
        let reply = r#"{"status": 201, "headers": [["content-type", "application/json"]], "body": [123, 125]}"#;
        let resp: WorkerResponse = serde_json::from_str(reply).unwrap();

        assert_eq!(resp.status, 201);
        assert_eq!(resp.body, b"{}");
    }

    #[test]
    fn test_queue_batch_wire_shape() {
        let batch: QueueBatch = serde_json::from_str(
            r#"{
                "queue": "emails",
                "messages": [
                    {"id": "m-1", "timestamp_ms": 1700000000000, "body": {"to": "a@b.c"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(batch.queue, "emails");
        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.messages[0].body["to"], "a@b.c");
    }
}
