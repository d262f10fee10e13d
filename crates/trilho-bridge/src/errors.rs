//! Bridge error types.

use std::fmt;

use thiserror::Error;

/// Which listening socket an error concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// The UDP position socket.
    Udp,
    /// The WebSocket/HTTP TCP listener.
    WebSocket,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("UDP"),
            Self::WebSocket => f.write_str("WebSocket"),
        }
    }
}

/// Errors raised while starting or running the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A listening socket could not be acquired. Fatal at startup.
    #[error("failed to bind {transport} listener on {addr}: {source}")]
    Bind {
        /// Which listener failed.
        transport: Transport,
        /// The address that was requested.
        addr: String,
        /// Underlying OS error.
        source: std::io::Error,
    },
    /// Any other socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the process should stop instead of degrading.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bind { .. })
    }
}
