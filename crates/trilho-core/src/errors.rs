//! Position validation errors.

use thiserror::Error;

/// Why a payload could not be turned into a [`PositionValue`](crate::PositionValue).
///
/// All variants are recoverable: the payload is dropped and the bridge keeps
/// its last known position.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PositionError {
    /// The datagram body is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    /// No decimal number could be found in the payload.
    #[error("no number found in payload {0:?}")]
    NotNumeric(String),
    /// The value is NaN or infinite.
    #[error("position is not a finite number")]
    NotFinite,
    /// The value lies outside `[0.0, 1.0]`.
    #[error("position {0} is outside [0, 1]")]
    OutOfRange(f64),
}

impl PositionError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotUtf8 => "not_utf8",
            Self::NotNumeric(_) => "not_numeric",
            Self::NotFinite => "not_finite",
            Self::OutOfRange(_) => "out_of_range",
        }
    }
}
