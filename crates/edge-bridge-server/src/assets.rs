//! Filesystem-backed static assets.
//!
//! [`DirAssets`] serves files from a configured directory for paths the
//! route table does not send to the guest. Lookups never touch the bridge,
//! so asset traffic cannot trigger module compilation or instantiation.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use edge_bridge_common::BridgeError;
use edge_bridge_host::{StaticAssets, WorkerRequest, WorkerResponse};

/// Static asset provider rooted at a directory.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    /// Create a provider serving files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a request path to a file under the root.
    ///
    /// Returns `None` for paths with non-plain components (`..`, absolute
    /// prefixes), so lookups cannot escape the asset directory. An empty
    /// path maps to `index.html`.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let trimmed = path.trim_start_matches('/');
        let relative = if trimmed.is_empty() {
            "index.html"
        } else {
            trimmed
        };

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                _ => return None,
            }
        }
        Some(resolved)
    }
}

#[async_trait]
impl StaticAssets for DirAssets {
    async fn fetch(&self, request: &WorkerRequest) -> Result<WorkerResponse, BridgeError> {
        let Some(path) = self.resolve(request.path()) else {
            debug!(path = %request.path(), "rejected asset path");
            return Ok(WorkerResponse::error(404, "Not found"));
        };

        match tokio::fs::read(&path).await {
            Ok(body) => {
                debug!(path = %path.display(), bytes = body.len(), "served asset");
                Ok(WorkerResponse {
                    status: 200,
                    headers: vec![("content-type".to_string(), mime_for(&path).to_string())],
                    body,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(WorkerResponse::error(404, "Not found"))
            }
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}

/// Infer a content type from the file extension.
fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("edge-bridge-assets-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let assets = DirAssets::new("/srv/public");

        assert!(assets.resolve("/../etc/passwd").is_none());
        assert!(assets.resolve("/a/../../b").is_none());
        assert_eq!(
            assets.resolve("/css/site.css"),
            Some(PathBuf::from("/srv/public/css/site.css"))
        );
    }

    #[test]
    fn test_resolve_empty_path_is_index() {
        let assets = DirAssets::new("/srv/public");

        assert_eq!(
            assets.resolve("/"),
            Some(PathBuf::from("/srv/public/index.html"))
        );
    }

    #[test]
    fn test_mime_for_known_extensions() {
        assert_eq!(mime_for(Path::new("index.html")), "text/html");
        assert_eq!(mime_for(Path::new("app.JS")), "application/javascript");
        assert_eq!(mime_for(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(mime_for(Path::new("blob.bin")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_fetch_serves_file_with_content_type() {
        let dir = scratch_dir();
        std::fs::write(dir.join("hello.txt"), b"hello assets").unwrap();
        let assets = DirAssets::new(&dir);

        let request = WorkerRequest::new("GET", "/hello.txt");
        let response = assets.fetch(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"hello assets");
        assert!(response
            .headers
            .iter()
            .any(|(name, value)| name == "content-type" && value == "text/plain"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_not_found() {
        let dir = scratch_dir();
        let assets = DirAssets::new(&dir);

        let request = WorkerRequest::new("GET", "/nope.html");
        let response = assets.fetch(&request).await.unwrap();

        assert_eq!(response.status, 404);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
