//! Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use trilho_settings::TrilhoSettings;

/// Runtime configuration for [`BridgeServer`](crate::BridgeServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// UDP bind host.
    pub udp_host: String,
    /// UDP bind port (`0` for auto-assign).
    pub udp_port: u16,
    /// UDP receive buffer size.
    pub max_datagram_bytes: usize,
    /// WebSocket/HTTP bind host.
    pub ws_host: String,
    /// WebSocket/HTTP bind port (`0` for auto-assign).
    pub ws_port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Per-client outbound queue length.
    pub send_queue: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat timeout in seconds (close after this long without a pong).
    pub heartbeat_timeout_secs: u64,
}

impl BridgeConfig {
    /// `host:port` for the UDP socket.
    pub fn udp_addr(&self) -> String {
        format!("{}:{}", self.udp_host, self.udp_port)
    }

    /// `host:port` for the WebSocket listener.
    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Heartbeat timeout as a [`Duration`].
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            udp_host: "127.0.0.1".into(),
            udp_port: 0,
            max_datagram_bytes: 1024,
            ws_host: "127.0.0.1".into(),
            ws_port: 0,
            max_connections: 64,
            send_queue: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

impl From<&TrilhoSettings> for BridgeConfig {
    fn from(settings: &TrilhoSettings) -> Self {
        Self {
            udp_host: settings.udp.host.clone(),
            udp_port: settings.udp.port,
            max_datagram_bytes: settings.udp.max_datagram_bytes,
            ws_host: settings.websocket.host.clone(),
            ws_port: settings.websocket.port,
            max_connections: settings.websocket.max_connections,
            send_queue: settings.websocket.send_queue,
            heartbeat_interval_secs: settings.websocket.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.websocket.heartbeat_timeout_secs,
        }
    }
}
