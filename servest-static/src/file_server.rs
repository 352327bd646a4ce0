//! File server implementation

use crate::mime::guess_mime_type;
use async_trait::async_trait;
use http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, IF_MODIFIED_SINCE, LAST_MODIFIED,
    RANGE,
};
use http::{HeaderMap, Method, StatusCode};
use servest_core::server::{HandlerResponse, ServeFile, ServeRequest};
use servest_core::Result;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::File;
use tokio::io::AsyncSeekExt;

/// Static file server
///
/// Transfers files that the resolver has already chosen. Paths outside
/// `root` are answered with 404.
#[derive(Debug, Clone)]
pub struct FileServer {
    root: PathBuf,
}

/// A parsed `Range` header
#[derive(Debug, PartialEq, Eq)]
enum RangeRequest {
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

impl FileServer {
    /// Create a file server confined to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open `path` positioned at `start`; the body is streamed from there
    async fn open_at(path: &Path, start: u64) -> Result<File> {
        let mut file = File::open(path).await?;

        if start > 0 {
            file.seek(std::io::SeekFrom::Start(start)).await?;
        }

        Ok(file)
    }
}

#[async_trait]
impl ServeFile for FileServer {
    async fn serve_file(&self, request: ServeRequest<'_>) -> Result<HandlerResponse> {
        let path = request.path;

        if !path.starts_with(&self.root) {
            tracing::warn!("🚫 Refusing to serve outside root: {}", path.display());
            return Ok(HandlerResponse::not_found());
        }

        tracing::debug!("📁 Serving file: {}", path.display());

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            _ => return Ok(HandlerResponse::not_found()),
        };
        let file_size = metadata.len();
        let modified = metadata.modified().ok();
        let last_modified = modified.map(httpdate::fmt_http_date);

        if let (Some(modified), Some(since)) = (modified, if_modified_since(request.headers)) {
            if whole_seconds(modified) <= whole_seconds(since) {
                let mut response = HandlerResponse::status(StatusCode::NOT_MODIFIED);
                if let Some(lm) = &last_modified {
                    response = response.header(LAST_MODIFIED, lm.as_str());
                }
                return Ok(response);
            }
        }

        // Handle Range Request
        let range = request
            .headers
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_range(v, file_size));

        let (status, start, length) = match range {
            Some(RangeRequest::Partial { start, end }) => {
                (StatusCode::PARTIAL_CONTENT, start, end - start + 1)
            }
            Some(RangeRequest::Unsatisfiable) => {
                return Ok(HandlerResponse::plain(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(CONTENT_RANGE, format!("bytes */{}", file_size)));
            }
            None => (StatusCode::OK, 0, file_size),
        };

        let content_type = request
            .content_type
            .unwrap_or_else(|| guess_mime_type(path));

        let mut response = if *request.method == Method::HEAD {
            HandlerResponse::status(status)
        } else {
            let file = Self::open_at(path, start).await?;
            HandlerResponse::with_file(status, file, length)
        };

        response = response
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, length)
            .header(ACCEPT_RANGES, "bytes");

        if status == StatusCode::PARTIAL_CONTENT {
            let end = start + length - 1;
            response = response.header(
                CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, file_size),
            );
        }
        if let Some(lm) = last_modified {
            response = response.header(LAST_MODIFIED, lm);
        }

        Ok(response)
    }
}

fn if_modified_since(headers: &HeaderMap) -> Option<SystemTime> {
    let value = headers.get(IF_MODIFIED_SINCE)?.to_str().ok()?;
    httpdate::parse_http_date(value).ok()
}

/// HTTP dates only carry whole seconds
fn whole_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Parse a single-range `bytes=` header.
///
/// `None` means the header is ignored and the whole file is sent.
fn parse_range(header: &str, file_size: u64) -> Option<RangeRequest> {
    let spec = header.strip_prefix("bytes=")?.trim();
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    // Suffix range: the last `n` bytes
    if start.is_empty() {
        let suffix: u64 = end.parse().ok()?;
        if suffix == 0 || file_size == 0 {
            return Some(RangeRequest::Unsatisfiable);
        }
        return Some(RangeRequest::Partial {
            start: file_size.saturating_sub(suffix),
            end: file_size - 1,
        });
    }

    let start: u64 = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse::<u64>().ok()?)
    };
    if end.is_some_and(|end| end < start) {
        return None;
    }
    if start >= file_size {
        return Some(RangeRequest::Unsatisfiable);
    }

    let end = end.map_or(file_size - 1, |end| end.min(file_size - 1));
    Some(RangeRequest::Partial { start, end })
}
