//! Servest Static File Module
//!
//! Turns request paths into files under a single root directory:
//! - Percent-decoding and traversal rejection
//! - Single-page fallback to the root `index.html`
//! - Extension based content types
//! - Range and `If-Modified-Since` handling when transferring bytes

mod file_server;
mod mime;
mod resolve;

pub use file_server::FileServer;
pub use mime::{content_type_for, guess_mime_type};
pub use resolve::{decode_path, PathResolver, Rejection, ResolvedTarget, INDEX_FILE};
