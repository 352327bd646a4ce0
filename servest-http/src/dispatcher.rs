//! Request dispatcher
//!
//! Turns one request into one response. `OPTIONS` and disallowed methods
//! are answered before the path is looked at.

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW,
    HOST, USER_AGENT, HeaderName,
};
use http::{HeaderMap, Method, StatusCode};
use servest_core::config::ServerConfig;
use servest_core::server::{HandlerResponse, ServeFile, ServeRequest};
use servest_static::{content_type_for, decode_path, FileServer, PathResolver, ResolvedTarget};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// Target used for access log lines
pub const ACCESS_LOG_TARGET: &str = "servest::access";

/// What the core needs to know about an inbound request
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path as received, still percent-encoded
    pub raw_path: String,
    pub remote_addr: Option<SocketAddr>,
    pub user_agent: Option<String>,
    pub host: Option<String>,
    /// Full header map, passed on for range and conditional handling
    pub headers: HeaderMap,
}

impl RequestDescriptor {
    /// Build a descriptor from request parts and the peer address
    pub fn from_parts(parts: &http::request::Parts, remote_addr: Option<SocketAddr>) -> Self {
        let header = |name: HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let host = header(HOST).or_else(|| parts.uri.authority().map(|a| a.to_string()));

        Self {
            method: parts.method.clone(),
            raw_path: parts.uri.path().to_string(),
            remote_addr,
            user_agent: header(USER_AGENT),
            host,
            headers: parts.headers.clone(),
        }
    }

    /// Remote address with the port stripped
    pub fn remote_ip(&self) -> String {
        self.remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// Dispatches requests against one root directory
pub struct Dispatcher<F = FileServer> {
    config: Arc<ServerConfig>,
    resolver: PathResolver,
    files: F,
}

impl Dispatcher<FileServer> {
    /// Dispatcher backed by the static file server
    pub fn from_config(config: Arc<ServerConfig>) -> Self {
        let files = FileServer::new(config.root_directory.clone());
        Self::new(config, files)
    }
}

impl<F: ServeFile> Dispatcher<F> {
    /// Create a dispatcher delegating byte transfer to `files`
    pub fn new(config: Arc<ServerConfig>, files: F) -> Self {
        let resolver = PathResolver::from_config(&config);
        Self {
            config,
            resolver,
            files,
        }
    }

    /// Produce the response for `request`
    pub async fn dispatch(&self, request: &RequestDescriptor) -> HandlerResponse {
        match request.method {
            Method::OPTIONS => return cors_preflight(),
            Method::GET | Method::HEAD => {}
            _ => {
                return HandlerResponse::plain(StatusCode::METHOD_NOT_ALLOWED)
                    .header(ALLOW, "GET, HEAD, OPTIONS");
            }
        }

        let path = match self.resolver.resolve(&request.raw_path).await {
            ResolvedTarget::Serve(path) => path,
            ResolvedTarget::FallbackToIndex => self.resolver.index_path(),
            ResolvedTarget::Reject(rejection) => {
                tracing::debug!(
                    "Rejected {} {}: {}",
                    request.method,
                    request.raw_path,
                    rejection.reason()
                );
                return HandlerResponse::text(rejection.status(), rejection.reason());
            }
        };

        if self.config.logging_enabled {
            log_access(request, &path);
        }

        let serve = ServeRequest {
            path: &path,
            content_type: content_type_for(&path),
            method: &request.method,
            headers: &request.headers,
        };

        match self.files.serve_file(serve).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("❌ Failed to serve {}: {}", path.display(), e);
                HandlerResponse::internal_error()
            }
        }
    }
}

/// Permissive answer to a CORS preflight
fn cors_preflight() -> HandlerResponse {
    HandlerResponse::status(StatusCode::OK)
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS")
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")
}

fn log_access(request: &RequestDescriptor, path: &Path) {
    let decoded = decode_path(&request.raw_path).unwrap_or_default();
    let decoded = String::from_utf8_lossy(&decoded);
    tracing::info!(
        target: ACCESS_LOG_TARGET,
        "{} {} {} {} {} {:?} {}",
        request.method,
        request.host.as_deref().unwrap_or("-"),
        decoded,
        request.raw_path,
        request.remote_ip(),
        request.user_agent.as_deref().unwrap_or("-"),
        path.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::header::CONTENT_TYPE;
    use servest_core::server::ResponseBody;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records requested paths instead of touching the disk
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ServeFile for Recorder {
        async fn serve_file(&self, request: ServeRequest<'_>) -> servest_core::Result<HandlerResponse> {
            self.calls.lock().unwrap().push(request.path.to_path_buf());
            Ok(HandlerResponse::status(StatusCode::OK))
        }
    }

    fn site() -> (TempDir, Arc<ServerConfig>) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("index.html"), "<h1>twenty bytes!</h1>").unwrap();
        fs::write(root.join("app.js"), "console.log('hi');").unwrap();
        fs::write(root.join("style.css"), "body {}").unwrap();
        fs::write(root.join("data.JSON"), "{}").unwrap();
        fs::write(root.join("notes.txt"), "notes").unwrap();
        (dir, Arc::new(ServerConfig::new(root)))
    }

    fn request(method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor {
            method,
            raw_path: path.to_string(),
            remote_addr: Some("127.0.0.1:54321".parse().unwrap()),
            user_agent: Some("test-agent".to_string()),
            host: Some("localhost".to_string()),
            headers: HeaderMap::new(),
        }
    }

    async fn body_bytes(response: HandlerResponse) -> Vec<u8> {
        use tokio::io::AsyncReadExt;
        match response.body {
            ResponseBody::Empty => Vec::new(),
            ResponseBody::Full(bytes) => bytes.to_vec(),
            ResponseBody::File { file, length } => {
                let mut out = Vec::new();
                file.take(length).read_to_end(&mut out).await.unwrap();
                out
            }
        }
    }

    #[tokio::test]
    async fn test_options_is_cors_preflight() {
        let (_dir, config) = site();
        let dispatcher = Dispatcher::new(config, Recorder::default());

        for path in ["/", "/%zz", "/../secret", "/missing"] {
            let response = dispatcher.dispatch(&request(Method::OPTIONS, path)).await;
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
            assert_eq!(
                response.headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
                "GET, POST, OPTIONS"
            );
            assert_eq!(
                response.headers.get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
                "Content-Type"
            );
            assert!(response.body.is_empty());
        }
        assert!(dispatcher.files.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_is_method_not_allowed() {
        let (_dir, config) = site();
        let dispatcher = Dispatcher::new(config, Recorder::default());

        for method in [Method::POST, Method::PUT, Method::DELETE] {
            let response = dispatcher.dispatch(&request(method, "/app.js")).await;
            assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        }
        assert!(dispatcher.files.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejections_have_plain_reason() {
        let (_dir, config) = site();
        let dispatcher = Dispatcher::new(config, Recorder::default());

        let response = dispatcher.dispatch(&request(Method::GET, "/../etc/passwd")).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.body.as_bytes(), Some(&b"Forbidden\n"[..]));

        let response = dispatcher.dispatch(&request(Method::GET, "/%zz")).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let response = dispatcher
            .dispatch(&request(Method::GET, "/.git/objects/pack/file.abcdefghijk"))
            .await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        assert!(dispatcher.files.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_serves_file_with_table_content_type() {
        let (_dir, config) = site();
        let dispatcher = Dispatcher::from_config(config);

        let response = dispatcher.dispatch(&request(Method::GET, "/app.js")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "text/javascript");
        assert_eq!(body_bytes(response).await, b"console.log('hi');");

        let response = dispatcher.dispatch(&request(Method::GET, "/style.css")).await;
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "text/css");

        let response = dispatcher.dispatch(&request(Method::GET, "/data.JSON")).await;
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "application/json");

        // Outside the table the file server infers the type
        let response = dispatcher.dispatch(&request(Method::GET, "/notes.txt")).await;
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[tokio::test]
    async fn test_missing_path_serves_root_index() {
        let (_dir, config) = site();
        let dispatcher = Dispatcher::from_config(config);

        let response = dispatcher.dispatch(&request(Method::GET, "/missing")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(body_bytes(response).await, b"<h1>twenty bytes!</h1>");
    }

    #[tokio::test]
    async fn test_single_page_fallback_uses_root_index() {
        let (_dir, config) = site();
        let root = config.root_directory.clone();
        let config = Arc::new(ServerConfig::new(root.clone()).with_single_page(true));
        let dispatcher = Dispatcher::new(config, Recorder::default());

        dispatcher.dispatch(&request(Method::GET, "/foo/bar")).await;
        assert_eq!(
            dispatcher.files.calls.lock().unwrap().as_slice(),
            &[root.join("index.html")]
        );
    }

    #[tokio::test]
    async fn test_missing_favicon_is_not_found() {
        let (_dir, config) = site();
        let dispatcher = Dispatcher::from_config(config);

        let response = dispatcher.dispatch(&request(Method::GET, "/favicon.ico")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_sends_no_body() {
        let (_dir, config) = site();
        let dispatcher = Dispatcher::from_config(config.clone());

        let response = dispatcher.dispatch(&request(Method::HEAD, "/app.js")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_remote_ip_strips_port() {
        let descriptor = request(Method::GET, "/");
        assert_eq!(descriptor.remote_ip(), "127.0.0.1");

        let mut v6 = request(Method::GET, "/");
        v6.remote_addr = Some("[::1]:8080".parse().unwrap());
        assert_eq!(v6.remote_ip(), "::1");
    }

    #[test]
    fn test_descriptor_from_parts() {
        let (parts, _) = http::Request::builder()
            .method(Method::GET)
            .uri("/a%20b?x=1")
            .header(HOST, "example.test:8000")
            .header(USER_AGENT, "curl/8")
            .body(())
            .unwrap()
            .into_parts();

        let descriptor = RequestDescriptor::from_parts(&parts, None);
        assert_eq!(descriptor.raw_path, "/a%20b");
        assert_eq!(descriptor.host.as_deref(), Some("example.test:8000"));
        assert_eq!(descriptor.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(descriptor.remote_ip(), "-");
    }
}
