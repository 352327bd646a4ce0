//! Servest Core Library
//!
//! Configuration, error handling, listener binding and the response type
//! shared by the static file resolver and the HTTP dispatcher.

pub mod config;
pub mod error;
pub mod server;

pub use error::{Error, Result};

/// Servest version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
