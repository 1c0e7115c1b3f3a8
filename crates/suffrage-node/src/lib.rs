//! Suffrage Node
//!
//! Runs one mesh unit on a host. Each of the four faces is a UDP socket;
//! the status light, fault signal and link power are reported through
//! `tracing`, and the fault toggle button is a `b` line on stdin.
//!
//! All protocol work happens in one task that owns the
//! [`ConsensusEngine`](suffrage_consensus::ConsensusEngine). Socket readers,
//! timers and the console only feed it [`Event`]s.

pub mod board;
pub mod config;
pub mod error;
pub mod runtime;

pub use board::{Link, UdpBoard};
pub use config::{ConfigError, FaceConfig, NodeConfig};
pub use error::{Error, Result};
pub use runtime::{run, Event};
