//! Error types for suffrage-consensus.

use thiserror::Error;

/// Result type for suffrage-consensus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling a packet or command.
///
/// None of these escape the engine's step functions: malformed input and
/// rejected commands are logged and dropped, and a full registry turns into
/// a reset outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// The packet could not be read.
    #[error("protocol error: {0}")]
    Protocol(#[from] suffrage_protocols::Error),

    /// An operator asked for an input the workload does not accept.
    #[error("calculation input {value} is higher than the threshold {max}")]
    CalculationOutOfRange { value: u32, max: u32 },

    /// A new identifier arrived with every registry slot in use.
    #[error("registry full: all {capacity} slots in use")]
    RegistryFull { capacity: usize },
}
