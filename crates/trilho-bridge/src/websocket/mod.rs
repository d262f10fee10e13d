//! WebSocket side of the bridge.

pub mod connection;
pub mod handler;
pub mod heartbeat;
