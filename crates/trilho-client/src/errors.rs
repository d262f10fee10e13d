//! Consumer error types.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised by the bridge consumer.
///
/// Only [`ConsumerError::InvalidUrl`] is ever returned to the caller;
/// connection failures are logged and retried.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The WebSocket handshake failed.
    #[error("failed to connect to bridge: {0}")]
    Connect(#[from] tungstenite::Error),
    /// The bridge URL is not a usable `ws://` or `wss://` URL.
    #[error("invalid bridge URL: {0}")]
    InvalidUrl(String),
}
