//! Request path resolution
//!
//! Maps a raw request path onto the root directory. Every `Serve` outcome
//! names a path that lies beneath the root.

use http::StatusCode;
use percent_encoding::percent_decode_str;
use servest_core::config::ServerConfig;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Name of the index document
pub const INDEX_FILE: &str = "index.html";

const FAVICON_PATH: &[u8] = b"/favicon.ico";

/// Longer "extensions" are usually path fragments behind a dotted
/// directory such as `.git/...`
const MAX_EXTENSION_LEN: usize = 10;

/// A directory index must be larger than this to be served in
/// single-page mode
const MIN_INDEX_SIZE: u64 = 8;

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Malformed percent-encoding
    BadRequest,
    /// Traversal attempt or a path escaping the root
    Forbidden,
    /// Hidden or unservable file
    NotFound,
}

impl Rejection {
    /// HTTP status for this rejection
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::BadRequest => StatusCode::BAD_REQUEST,
            Rejection::Forbidden => StatusCode::FORBIDDEN,
            Rejection::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Short reason sent as the response body
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::BadRequest => "Bad Request",
            Rejection::Forbidden => "Forbidden",
            Rejection::NotFound => "Not Found",
        }
    }
}

/// Outcome of resolving one request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Serve this file
    Serve(PathBuf),
    /// Refuse the request
    Reject(Rejection),
    /// Serve the root `index.html`
    FallbackToIndex,
}

/// Percent-decode a request path into raw bytes.
///
/// Returns `None` only for a `%` not followed by two hex digits. The
/// decoded bytes need not be UTF-8; file names on disk need not be either.
pub fn decode_path(raw: &str) -> Option<Vec<u8>> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    Some(percent_decode_str(raw).collect())
}

/// Resolves request paths against a root directory
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    single_page: bool,
}

impl PathResolver {
    /// Create a resolver. `root` must be canonical (absolute, no symlinks).
    pub fn new(root: impl Into<PathBuf>, single_page: bool) -> Self {
        Self {
            root: root.into(),
            single_page,
        }
    }

    /// Create a resolver from the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.root_directory.clone(), config.single_page_mode)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The root `index.html` every fallback serves
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// The file a target will be served from, if any
    pub fn target_path(&self, target: &ResolvedTarget) -> Option<PathBuf> {
        match target {
            ResolvedTarget::Serve(path) => Some(path.clone()),
            ResolvedTarget::FallbackToIndex => Some(self.index_path()),
            ResolvedTarget::Reject(_) => None,
        }
    }

    /// Decide what to serve for `raw_path` (still percent-encoded)
    pub async fn resolve(&self, raw_path: &str) -> ResolvedTarget {
        let Some(decoded) = decode_path(raw_path) else {
            return ResolvedTarget::Reject(Rejection::BadRequest);
        };

        // Checked on the decoded bytes, before any joining or cleaning
        if decoded.windows(2).any(|pair| pair == b"..") {
            return ResolvedTarget::Reject(Rejection::Forbidden);
        }

        if decoded == FAVICON_PATH {
            return ResolvedTarget::Serve(self.root.join("favicon.ico"));
        }

        let request_path: &[u8] = if decoded == b"/" { b"/index.html" } else { &decoded };

        if extension_of(request_path).len() > MAX_EXTENSION_LEN {
            return ResolvedTarget::Reject(Rejection::NotFound);
        }

        let Some(relative) = os_str(trim_leading_slashes(request_path)) else {
            return ResolvedTarget::Reject(Rejection::NotFound);
        };
        let candidate = normalize(&self.root.join(relative));
        if !candidate.starts_with(&self.root) {
            tracing::warn!(
                "🚫 Resolved path escapes root: {}",
                String::from_utf8_lossy(request_path)
            );
            return ResolvedTarget::Reject(Rejection::Forbidden);
        }

        let metadata = match tokio::fs::symlink_metadata(&candidate).await {
            Ok(m) => m,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return ResolvedTarget::FallbackToIndex;
            }
            Err(e) => {
                tracing::debug!("Cannot stat {}: {}", candidate.display(), e);
                return ResolvedTarget::Reject(Rejection::NotFound);
            }
        };

        if metadata.is_dir() {
            if self.single_page {
                let index = candidate.join(INDEX_FILE);
                if let Ok(m) = tokio::fs::symlink_metadata(&index).await {
                    if m.is_file() && m.len() > MIN_INDEX_SIZE && is_canonical(&index).await {
                        return ResolvedTarget::Serve(index);
                    }
                }
            }
            return ResolvedTarget::FallbackToIndex;
        }

        if !metadata.is_file() || !is_canonical(&candidate).await {
            return ResolvedTarget::Reject(Rejection::NotFound);
        }

        ResolvedTarget::Serve(candidate)
    }
}

/// False when any component of `path` is a symlink
async fn is_canonical(path: &Path) -> bool {
    match tokio::fs::canonicalize(path).await {
        Ok(real) => real == path,
        Err(_) => false,
    }
}

/// Bytes after the last `.` of the final segment, empty if there is none
fn extension_of(path: &[u8]) -> &[u8] {
    let segment = path.rsplit(|&b| b == b'/').next().unwrap_or(path);
    match segment.iter().rposition(|&b| b == b'.') {
        Some(dot) => &segment[dot + 1..],
        None => &[],
    }
}

fn trim_leading_slashes(path: &[u8]) -> &[u8] {
    let start = path.iter().position(|&b| b != b'/').unwrap_or(path.len());
    &path[start..]
}

#[cfg(unix)]
fn os_str(bytes: &[u8]) -> Option<&OsStr> {
    use std::os::unix::ffi::OsStrExt;
    Some(OsStr::from_bytes(bytes))
}

/// Outside unix a path component must be UTF-8
#[cfg(not(unix))]
fn os_str(bytes: &[u8]) -> Option<&OsStr> {
    std::str::from_utf8(bytes).ok().map(OsStr::new)
}

/// Lexically clean a path: drop `.`, apply `..`, collapse separators
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
