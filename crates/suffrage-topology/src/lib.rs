//! Suffrage Link Topology
//!
//! Each unit in the Suffrage mesh is a small board with a fixed number of
//! physical links ("faces"). There is no routing table and no global view:
//! a unit only knows which neighbor sits on which face, learned from one-hop
//! heartbeat announcements, and which face (if any) an operator terminal is
//! attached to.
//!
//! # Flooding Rules
//!
//! - Broadcast: every face except the terminal
//! - Forward: every face except the terminal and the arrival face
//!
//! Longer cycles are not prevented here; duplicate suppression belongs to the
//! node registry.

mod face;
mod neighbors;
mod node_id;

pub use face::{Face, FaceSet};
pub use neighbors::Topology;
pub use node_id::{NodeId, ParseNodeIdError, WIRE_WIDTH};

/// Number of physical faces per unit (invariant: always 4)
pub const FACE_COUNT: usize = 4;

// A face set is stored in a u8 mask
const _: () = assert!(FACE_COUNT <= 8);
