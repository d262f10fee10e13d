//! # trilho-core
//!
//! Shared types for the Trilho position bridge.
//!
//! - [`PositionValue`]: a normalized camera position in `[0.0, 1.0]`
//! - [`PositionMessage`] / [`BridgeMessage`]: the server→client wire envelope
//! - [`parse_datagram`]: turns raw UDP payload bytes into a validated position

#![deny(unsafe_code)]

pub mod errors;
pub mod message;
pub mod position;

pub use errors::PositionError;
pub use message::{BridgeMessage, PositionMessage, now_millis};
pub use position::{PositionScale, PositionValue, parse_datagram, parse_text};
