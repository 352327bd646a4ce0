//! Error types for Servest

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Servest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit code when the listener stops or the port range is exhausted
pub const EXIT_LISTENER: i32 = 1;

/// Process exit code for bad arguments and unrecoverable bind failures
pub const EXIT_USAGE: i32 = 111;

/// Process exit code for startup filesystem failures
pub const EXIT_STARTUP: i32 = 222;

/// Main error type for Servest
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or command line
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure while working out what to serve
    #[error("Startup error: {context}: {source}")]
    Startup {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Bind failure other than "address in use"
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a startup error for a path that could not be resolved
    pub fn startup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Startup {
            context: format!("cannot resolve {}", path.into().display()),
            source,
        }
    }

    /// Exit code the process should terminate with for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Bind { .. } => EXIT_USAGE,
            Error::Startup { .. } => EXIT_STARTUP,
            Error::Io(_) => EXIT_LISTENER,
        }
    }
}
