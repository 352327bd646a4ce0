//! Handler response type and the file-serving capability
//!
//! The dispatcher never touches file bytes itself; it hands a resolved
//! path to a [`ServeFile`] implementation.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use std::path::Path;
use tokio::fs::File;

/// Body of a handler response
#[derive(Debug)]
pub enum ResponseBody {
    Empty,
    /// Small in-memory body such as a rejection reason
    Full(Bytes),
    /// `length` bytes streamed from `file`, which is already positioned
    /// at the first byte to send
    File { file: File, length: u64 },
}

impl ResponseBody {
    /// In-memory bytes, if the body is held in memory
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ResponseBody::Full(bytes) => Some(bytes.as_ref()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }
}

/// Response from a handler
#[derive(Debug)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl HandlerResponse {
    /// Create a response with no body
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
        }
    }

    /// Create a response with an in-memory body
    pub fn with_body(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Full(body.into()),
        }
    }

    /// Create a response streaming `length` bytes of an open file
    pub fn with_file(status: StatusCode, file: File, length: u64) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::File { file, length },
        }
    }

    /// Short plain-text response
    pub fn text(status: StatusCode, reason: &str) -> Self {
        Self::with_body(status, format!("{}\n", reason))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
    }

    /// Plain-text response carrying only the status reason, e.g. `Not Found`
    pub fn plain(status: StatusCode) -> Self {
        Self::text(status, status.canonical_reason().unwrap_or("Error"))
    }

    /// Set a header, replacing any previous value
    pub fn header<V>(mut self, name: HeaderName, value: V) -> Self
    where
        V: TryInto<HeaderValue>,
    {
        match value.try_into() {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!("Dropping invalid value for header {}", name),
        }
        self
    }

    /// Create not found response
    pub fn not_found() -> Self {
        Self::plain(StatusCode::NOT_FOUND)
    }

    /// Create internal server error response
    pub fn internal_error() -> Self {
        Self::plain(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// A request to transfer one file
#[derive(Debug, Clone, Copy)]
pub struct ServeRequest<'a> {
    /// Absolute path already vetted by the resolver
    pub path: &'a Path,
    /// Content type to send instead of an inferred one
    pub content_type: Option<&'static str>,
    pub method: &'a Method,
    /// Request headers, consulted for ranges and conditional requests
    pub headers: &'a HeaderMap,
}

/// Capability to serve the bytes of a file on disk
#[async_trait]
pub trait ServeFile: Send + Sync {
    /// Build the response for `request`; a missing file is a 404 response,
    /// not an error
    async fn serve_file(&self, request: ServeRequest<'_>) -> Result<HandlerResponse>;
}
