//! HTTP accept loop
//!
//! One spawned task per connection; requests on different connections
//! are handled concurrently and share nothing mutable.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use servest_core::server::{HandlerResponse, ResponseBody, ServeFile};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;

use crate::dispatcher::{Dispatcher, RequestDescriptor};

/// Body type sent to hyper; files are streamed, never buffered whole
type HttpBody = UnsyncBoxBody<Bytes, io::Error>;

/// Pause after a failed accept so a persistent error does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// Serve connections from `listener` until `shutdown` completes
pub async fn serve<F, S>(listener: TcpListener, dispatcher: Arc<Dispatcher<F>>, shutdown: S)
where
    F: ServeFile + 'static,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("🛑 Listener shutting down");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let dispatcher = dispatcher.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, peer, dispatcher.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}

async fn handle_request<F: ServeFile>(
    req: Request<Incoming>,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher<F>>,
) -> Result<Response<HttpBody>, Infallible> {
    let (parts, _body) = req.into_parts();
    let descriptor = RequestDescriptor::from_parts(&parts, Some(peer));
    let response = dispatcher.dispatch(&descriptor).await;
    Ok(into_http(response))
}

/// Convert a handler response into a hyper response
fn into_http(response: HandlerResponse) -> Response<HttpBody> {
    let body = match response.body {
        ResponseBody::Empty => Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync(),
        ResponseBody::Full(bytes) => Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
        ResponseBody::File { file, length } => {
            let frames = ReaderStream::new(file.take(length)).map_ok(Frame::data);
            StreamBody::new(frames).boxed_unsync()
        }
    };

    let mut http = Response::new(body);
    *http.status_mut() = response.status;
    *http.headers_mut() = response.headers;
    http
}

#[cfg(test)]
mod tests {
    use super::*;
    use servest_core::config::ServerConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("index.html"), "<h1>Hello World</h1>").unwrap();
        std::fs::write(root.join("app.js"), "let x = 1;").unwrap();

        let config = Arc::new(ServerConfig::new(root));
        let dispatcher = Arc::new(Dispatcher::from_config(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, dispatcher, async {
            let _ = stopped.await;
        }));

        let reply = roundtrip(
            addr,
            "GET /app.js HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(reply.starts_with("HTTP/1.1 200 OK"), "{}", reply);
        assert!(reply.to_ascii_lowercase().contains("content-type: text/javascript"));
        assert!(reply.ends_with("let x = 1;"));

        let reply = roundtrip(
            addr,
            "POST /app.js HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(reply.starts_with("HTTP/1.1 405"), "{}", reply);

        let reply = roundtrip(
            addr,
            "GET /app.js HTTP/1.1\r\nHost: localhost\r\nRange: bytes=4-4\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(reply.starts_with("HTTP/1.1 206"), "{}", reply);
        assert!(reply.ends_with("\r\n\r\nx"), "{}", reply);

        stop.send(()).unwrap();
        server.await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_serves_non_utf8_file_name() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("index.html"), "<h1>Hello World</h1>").unwrap();
        let name = std::ffi::OsStr::from_bytes(b"caf\xe9.txt");
        std::fs::write(root.join(name), "latin-1 name").unwrap();

        let dispatcher = Arc::new(Dispatcher::from_config(Arc::new(ServerConfig::new(root))));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, dispatcher, std::future::pending()));

        let reply = roundtrip(
            addr,
            "GET /caf%E9.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(reply.starts_with("HTTP/1.1 200 OK"), "{}", reply);
        assert!(reply.ends_with("latin-1 name"), "{}", reply);

        server.abort();
    }
}
