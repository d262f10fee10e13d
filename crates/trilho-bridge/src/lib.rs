//! # trilho-bridge
//!
//! Receives position datagrams over UDP and fans them out to browser clients
//! over WebSocket.
//!
//! - [`UdpListener`] validates datagrams and hands positions to the hub
//! - [`BroadcastHub`] keeps the connection set and the last known position
//! - [`BridgeServer`] serves the WebSocket endpoint plus `/health`, `/status`
//!   and `POST /position`
//! - [`BridgeHandle::stop`] stops all of it on one signal

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod hub;
pub mod server;
pub mod shutdown;
pub mod udp;
pub mod websocket;

pub use config::BridgeConfig;
pub use errors::{BridgeError, Transport};
pub use hub::{BroadcastHub, HubStats};
pub use server::{BridgeHandle, BridgeServer};
pub use udp::UdpListener;
pub use websocket::handler::DisconnectReason;
