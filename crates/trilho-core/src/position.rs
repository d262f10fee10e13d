//! Normalized position values and datagram payload parsing.
//!
//! A datagram body is UTF-8 text containing a decimal number. Surrounding
//! text is tolerated: the first numeric substring wins, so `"0.42"`,
//! `"pos=0.42"` and `"0.42\n"` all parse to the same value.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::PositionError;

/// First decimal number in a payload: optional sign, then `1`, `1.`, `1.5` or `.5`.
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?(?:\d+(?:\.\d*)?|\.\d+)").unwrap());

/// A horizontal camera position normalized to the closed interval `[0.0, 1.0]`.
///
/// The bridge attaches no further meaning to the value; scaling it (for
/// example to a percentage) is the consumer's job, see [`PositionScale`].
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct PositionValue(f64);

impl PositionValue {
    /// Lower bound of the position domain.
    pub const MIN: Self = Self(0.0);
    /// Upper bound of the position domain.
    pub const MAX: Self = Self(1.0);

    /// Validate a raw value.
    pub fn new(value: f64) -> Result<Self, PositionError> {
        if !value.is_finite() {
            return Err(PositionError::NotFinite);
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PositionError::OutOfRange(value));
        }
        // -0.0 passes the range check; store it as +0.0
        Ok(Self(value + 0.0))
    }

    /// The raw value in `[0.0, 1.0]`.
    pub fn get(self) -> f64 {
        self.0
    }

    /// The value scaled to `[0.0, 100.0]`.
    pub fn as_percent(self) -> f64 {
        self.0 * 100.0
    }

    /// The value expressed in the given scale.
    pub fn scaled(self, scale: PositionScale) -> f64 {
        match scale {
            PositionScale::Unit => self.0,
            PositionScale::Percent => self.as_percent(),
        }
    }
}

impl TryFrom<f64> for PositionValue {
    type Error = PositionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PositionValue> for f64 {
    fn from(value: PositionValue) -> Self {
        value.0
    }
}

impl fmt::Display for PositionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Convention used when handing a position to a host application.
///
/// The viewer works in percent of the panorama width, so [`PositionScale::Percent`]
/// is the default. Every integration boundary must pick one and keep it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionScale {
    /// `0.0..=1.0`, exactly as carried on the wire.
    Unit,
    /// `0.0..=100.0`.
    #[default]
    Percent,
}

/// Parse a datagram body into a validated position.
pub fn parse_datagram(payload: &[u8]) -> Result<PositionValue, PositionError> {
    let text = std::str::from_utf8(payload).map_err(|_| PositionError::NotUtf8)?;
    parse_text(text)
}

/// Parse UTF-8 text into a validated position, using the first numeric substring.
pub fn parse_text(text: &str) -> Result<PositionValue, PositionError> {
    let trimmed = text.trim();
    let number = NUMBER_RE
        .find(trimmed)
        .ok_or_else(|| PositionError::NotNumeric(trimmed.to_string()))?;
    let value: f64 = number
        .as_str()
        .parse()
        .map_err(|_| PositionError::NotNumeric(trimmed.to_string()))?;
    PositionValue::new(value)
}
