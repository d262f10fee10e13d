//! Server→client wire messages.
//!
//! Every message is a JSON object tagged by `type`:
//!
//! ```json
//! { "type": "position", "value": 0.42, "timestamp": 1700000000000 }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::position::PositionValue;

/// A position update as sent to WebSocket clients.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionMessage {
    /// The validated position.
    pub value: PositionValue,
    /// Milliseconds since the Unix epoch at broadcast time.
    pub timestamp: i64,
}

impl PositionMessage {
    /// Build a message stamped with the current wall-clock time.
    pub fn now(value: PositionValue) -> Self {
        Self {
            value,
            timestamp: now_millis(),
        }
    }
}

/// All messages the bridge sends to clients.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// A new camera position.
    Position(PositionMessage),
}

impl BridgeMessage {
    /// Serialize to the JSON text sent over the socket.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a text frame received from the bridge.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl From<PositionMessage> for BridgeMessage {
    fn from(msg: PositionMessage) -> Self {
        Self::Position(msg)
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
