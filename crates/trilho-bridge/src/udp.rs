//! UDP position listener.
//!
//! Accepts datagrams from any sender, validates them, and hands valid
//! positions to the [`BroadcastHub`]. Nothing is ever sent back to the
//! sender. Invalid payloads are dropped with a debug log.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trilho_core::{PositionError, PositionValue, parse_datagram};

use crate::errors::{BridgeError, Transport};
use crate::hub::BroadcastHub;

/// Owns the bridge's UDP socket.
pub struct UdpListener {
    socket: UdpSocket,
    max_datagram_bytes: usize,
}

impl UdpListener {
    /// Bind the socket. Failure here is fatal for the bridge.
    pub async fn bind(addr: &str, max_datagram_bytes: usize) -> Result<Self, BridgeError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| BridgeError::Bind {
                transport: Transport::Udp,
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            socket,
            max_datagram_bytes: max_datagram_bytes.max(1),
        })
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive datagrams until `cancel` fires.
    ///
    /// Datagrams are handled one at a time in arrival order.
    pub async fn run(self, hub: Arc<BroadcastHub>, cancel: CancellationToken) {
        let mut buf = vec![0u8; self.max_datagram_bytes];
        if let Ok(addr) = self.socket.local_addr() {
            info!(%addr, "UDP listener running");
        }

        loop {
            tokio::select! {
                res = self.socket.recv_from(&mut buf) => {
                    match res {
                        Ok((len, from)) => {
                            let _ = handle_datagram(&hub, &buf[..len], from);
                        }
                        Err(e) => {
                            warn!(error = %e, "UDP receive failed");
                        }
                    }
                }
                () = cancel.cancelled() => {
                    info!("UDP listener stopping");
                    break;
                }
            }
        }
    }
}

/// Validate one datagram and, if it is a position, record and broadcast it.
pub fn handle_datagram(
    hub: &BroadcastHub,
    payload: &[u8],
    from: SocketAddr,
) -> Result<PositionValue, PositionError> {
    match parse_datagram(payload) {
        Ok(value) => {
            let delivered = hub.record_and_broadcast(value);
            debug!(%from, value = value.get(), delivered, "UDP position accepted");
            Ok(value)
        }
        Err(e) => {
            hub.record_rejected();
            debug!(
                %from,
                payload = %String::from_utf8_lossy(payload),
                reason = e.error_kind(),
                "UDP datagram dropped: {e}"
            );
            Err(e)
        }
    }
}
