//! Error types for suffrage-protocols.

use thiserror::Error;

/// Result type for suffrage-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading a line from a face.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Blank line.
    #[error("empty packet")]
    Empty,

    /// The first character does not name a packet kind.
    #[error("unknown packet kind {0:?}")]
    UnknownKind(char),

    /// The body does not match the layout of its kind.
    #[error("malformed '{kind}' packet: {reason}")]
    MalformedPacket { kind: char, reason: String },

    /// A calculation request with a negative input.
    #[error("calculation input {0} must be a non-negative integer")]
    NegativeCalculation(i64),

    /// The sender identifier is not valid base 36.
    #[error("invalid node identifier: {0}")]
    InvalidNodeId(#[from] suffrage_topology::ParseNodeIdError),
}

impl Error {
    pub(crate) fn malformed(kind: char, reason: impl Into<String>) -> Self {
        Self::MalformedPacket {
            kind,
            reason: reason.into(),
        }
    }
}
