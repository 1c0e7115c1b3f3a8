//! Error types for suffrage-node.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for suffrage-node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop the node from running.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
