//! Configuration management for Servest

mod loader;
mod types;

pub use loader::{current_dir, resolve_root, PUBLIC_HTML_DIR};
pub use types::*;
