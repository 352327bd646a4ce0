//! Configuration type definitions
//!
//! These types represent the runtime configuration for Servest. A
//! `ServerConfig` is built once at startup and then only read.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Default interface to bind
pub const DEFAULT_INTERFACE: &str = "127.0.0.1";

/// Lowest port tried when auto-selecting
pub const DEFAULT_MIN_PORT: u16 = 8000;

/// Highest port tried when auto-selecting
pub const DEFAULT_MAX_PORT: u16 = 8999;

/// Inclusive range of ports to try binding, in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    /// Create a range, rejecting `min > max`
    pub fn new(min: u16, max: u16) -> Result<Self> {
        if min > max {
            return Err(Error::Config(format!(
                "minimum port {} is greater than maximum port {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// A range holding exactly one port
    pub fn single(port: u16) -> Self {
        Self { min: port, max: port }
    }

    /// Pick the range from the command line: an explicit non-zero port wins
    pub fn from_flags(port: u16, min: u16, max: u16) -> Result<Self> {
        if port != 0 {
            Ok(Self::single(port))
        } else {
            Self::new(min, max)
        }
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    /// Iterate the candidate ports
    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.min..=self.max
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_PORT,
            max: DEFAULT_MAX_PORT,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Absolute root directory; every served path lies beneath it
    pub root_directory: PathBuf,

    /// Interface to bind
    pub bind_interface: String,

    /// Ports to try
    pub ports: PortRange,

    /// Serve the root `index.html` for client-side routes
    pub single_page_mode: bool,

    /// Emit one access log line per served request
    pub logging_enabled: bool,
}

impl ServerConfig {
    /// Create a configuration serving `root` with default listen settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root_directory: root.into(),
            bind_interface: DEFAULT_INTERFACE.to_string(),
            ports: PortRange::default(),
            single_page_mode: false,
            logging_enabled: false,
        }
    }

    /// Set the bind interface
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.bind_interface = interface.into();
        self
    }

    /// Set the port range
    pub fn with_ports(mut self, ports: PortRange) -> Self {
        self.ports = ports;
        self
    }

    /// Enable single-page fallback mode
    pub fn with_single_page(mut self, enable: bool) -> Self {
        self.single_page_mode = enable;
        self
    }

    /// Enable request logging
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.logging_enabled = enable;
        self
    }
}
