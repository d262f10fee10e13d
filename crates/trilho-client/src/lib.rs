//! # trilho-client
//!
//! In-process consumer of the position bridge. A [`BridgeConsumer`] keeps one
//! WebSocket open while enabled, reconnects after a fixed delay when the
//! connection drops, and hands each new position to a host callback.

#![deny(unsafe_code)]

pub mod consumer;
pub mod errors;
pub mod options;

pub use consumer::{BridgeConsumer, ConnectionState};
pub use errors::ConsumerError;
pub use options::ConsumerOptions;
