//! Root directory resolution

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Directory served by default when present in the working directory
pub const PUBLIC_HTML_DIR: &str = "public-html";

/// Look up the current working directory
pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|source| Error::Startup {
        context: "cannot determine working directory".to_string(),
        source,
    })
}

/// Resolve the directory to serve.
///
/// Order: the explicit flag, then `public-html` under `cwd` if it is a
/// directory, then `cwd` itself. Relative paths are taken against `cwd`.
/// The result is canonical so that prefix checks against it are exact.
pub fn resolve_root(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    let candidate = match explicit {
        Some(dir) => cwd.join(dir),
        None => {
            let public = cwd.join(PUBLIC_HTML_DIR);
            if public.is_dir() {
                public
            } else {
                cwd.to_path_buf()
            }
        }
    };

    let root = std::fs::canonicalize(&candidate).map_err(|e| Error::startup(&candidate, e))?;
    if !root.is_dir() {
        return Err(Error::startup(
            &candidate,
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }
    tracing::debug!("📁 Resolved root directory: {}", root.display());
    Ok(root)
}
