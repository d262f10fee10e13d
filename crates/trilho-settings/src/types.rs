//! Settings types. JSON keys are camelCase; every section falls back to its
//! defaults for missing keys.

use serde::{Deserialize, Serialize};
use trilho_core::PositionScale;

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrilhoSettings {
    /// UDP listener settings.
    pub udp: UdpSettings,
    /// WebSocket/HTTP server settings.
    pub websocket: WebSocketSettings,
    /// Bridge consumer settings.
    pub client: ClientSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl TrilhoSettings {
    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.udp.max_datagram_bytes == 0 {
            return Err(SettingsError::InvalidValue(
                "udp.maxDatagramBytes must be non-zero".into(),
            ));
        }
        if self.websocket.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "websocket.maxConnections must be non-zero".into(),
            ));
        }
        if self.websocket.send_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "websocket.sendQueue must be non-zero".into(),
            ));
        }
        if self.websocket.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "websocket.heartbeatIntervalSecs must be non-zero".into(),
            ));
        }
        if self.websocket.heartbeat_timeout_secs < self.websocket.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(
                "websocket.heartbeatTimeoutSecs must be at least heartbeatIntervalSecs".into(),
            ));
        }
        Ok(())
    }
}

/// UDP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UdpSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Receive buffer size; longer datagrams are truncated.
    pub max_datagram_bytes: usize,
}

impl Default for UdpSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
            max_datagram_bytes: 1024,
        }
    }
}

/// WebSocket/HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSocketSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrent WebSocket clients.
    pub max_connections: usize,
    /// Per-client outbound queue length.
    pub send_queue: usize,
    /// Seconds between pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before a client is dropped.
    pub heartbeat_timeout_secs: u64,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            max_connections: 64,
            send_queue: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

/// Bridge consumer settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// WebSocket URL of the bridge.
    pub url: String,
    /// Delay before reconnecting after a dropped connection.
    pub reconnect_delay_ms: u64,
    /// Scale handed to the host callback.
    pub scale: PositionScale,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8081/".to_string(),
            reconnect_delay_ms: 3000,
            scale: PositionScale::Percent,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
