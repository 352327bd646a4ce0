//! Port-range bind loop
//!
//! Ports are tried in ascending order. "Address in use" moves on to the
//! next port; anything else stops the scan.

use crate::config::PortRange;
use crate::error::{Error, Result};
use std::io::ErrorKind;
use tokio::net::TcpListener;

/// Result of scanning a port range
#[derive(Debug)]
pub enum BindOutcome {
    /// A listener bound on `port`
    Bound { listener: TcpListener, port: u16 },
    /// Every port in the range was in use
    ExhaustedRange,
}

/// Bind the first free port of `ports` on `interface`
pub async fn bind_in_range(interface: &str, ports: PortRange) -> Result<BindOutcome> {
    for port in ports.iter() {
        tracing::debug!("🔌 Trying port {}", port);

        match TcpListener::bind((interface, port)).await {
            Ok(listener) => {
                // Port 0 asks the OS for an ephemeral port
                let port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
                return Ok(BindOutcome::Bound { listener, port });
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                tracing::debug!("Port {} is in use", port);
            }
            Err(source) => {
                return Err(Error::Bind {
                    addr: format!("{}:{}", interface, port),
                    source,
                });
            }
        }
    }

    Ok(BindOutcome::ExhaustedRange)
}
