//! Suffrage Protocols - Wire Codec and Face Flooding
//!
//! Units exchange single text lines over their faces. This crate owns the
//! line format and the rules for which faces a line is written to.
//!
//! # Overview
//!
//! - [`Packet`]: closed set of packet kinds, parsed and printed exhaustively
//! - [`gossip`]: broadcast / forward over a [`Transport`]
//!
//! # Example
//!
//! ```
//! use suffrage_protocols::{Packet, ResultPacket};
//! use suffrage_topology::NodeId;
//!
//! let packet = Packet::parse("r000000Z,5000,15,2,47,1").unwrap();
//! match packet {
//!     Packet::Result(ResultPacket { id, vote, .. }) => {
//!         assert_eq!(id, NodeId(35));
//!         assert_eq!(vote, 47);
//!     }
//!     _ => unreachable!(),
//! }
//! ```

pub mod error;
pub mod gossip;
pub mod packet;

pub use error::{Error, Result};
pub use gossip::{absorb_neighbor_flag, broadcast, forward, send_on, Transport};
pub use packet::{Packet, ResultPacket};
