//! MIME type handling

use std::path::Path;

/// Content type from the fixed extension table, matched case-insensitively.
///
/// Returns `None` for extensions outside the table so the file server can
/// infer one instead.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "css" => "text/css",
        "js" => "text/javascript",
        "html" => "text/html",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(content_type)
}

/// Get MIME type for a path outside the table
pub fn guess_mime_type(path: &Path) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
}
