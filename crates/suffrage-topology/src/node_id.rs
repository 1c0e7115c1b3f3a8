//! Node identifiers and their base-36 text form.
//!
//! Every unit carries a stable integer identifier programmed at the factory.
//! On the wire and in the status table it is written in base 36 (`0-9A-Z`),
//! so an eight digit sticker number and a short name both fit in 32 bits.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Digits needed to write any `u32` in base 36 (`u32::MAX` = `1Z141Z3`).
pub const WIRE_WIDTH: usize = 7;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Stable identifier of one physical unit in the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

/// Failure to read a base-36 identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseNodeIdError {
    #[error("empty node identifier")]
    Empty,
    #[error("invalid base-36 digit {0:?}")]
    InvalidDigit(char),
    #[error("node identifier does not fit in 32 bits")]
    Overflow,
}

impl NodeId {
    /// Create from the raw integer.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw integer.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Write the identifier in base 36, left-padded with `0` to `min_width`.
    pub fn encode(self, min_width: usize) -> String {
        let mut digits = [0u8; WIRE_WIDTH];
        let mut n = self.0;
        let mut len = 0;
        loop {
            digits[len] = ALPHABET[(n % 36) as usize];
            len += 1;
            n /= 36;
            if n == 0 {
                break;
            }
        }

        let mut out = String::with_capacity(min_width.max(len));
        for _ in len..min_width {
            out.push('0');
        }
        out.extend(digits[..len].iter().rev().map(|&d| d as char));
        out
    }

    /// Read a base-36 identifier. Letters are accepted in either case.
    pub fn decode(text: &str) -> Result<Self, ParseNodeIdError> {
        if text.is_empty() {
            return Err(ParseNodeIdError::Empty);
        }

        let mut value: u32 = 0;
        for c in text.chars() {
            let digit = c.to_digit(36).ok_or(ParseNodeIdError::InvalidDigit(c))?;
            value = value
                .checked_mul(36)
                .and_then(|v| v.checked_add(digit))
                .ok_or(ParseNodeIdError::Overflow)?;
        }
        Ok(Self(value))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(WIRE_WIDTH))
    }
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s.trim())
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
