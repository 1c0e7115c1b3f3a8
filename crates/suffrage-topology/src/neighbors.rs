//! Neighbor-per-face bookkeeping.
//!
//! Each face connects to at most one neighbor. The mapping is learned from
//! one-hop heartbeat announcements and simply overwritten when a different
//! unit shows up on the same face. One face may be claimed by an operator
//! terminal; it is excluded from every flood.

use crate::{Face, FaceSet, NodeId, FACE_COUNT};

/// Local view of the physical links of this unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Topology {
    neighbors: [Option<NodeId>; FACE_COUNT],
    terminal: Option<Face>,
}

impl Topology {
    /// No neighbors known, no terminal attached.
    pub const fn new() -> Self {
        Self {
            neighbors: [None; FACE_COUNT],
            terminal: None,
        }
    }

    /// Remember `id` as the unit directly attached to `face`.
    ///
    /// Returns the previous neighbor if it was a different unit.
    pub fn learn_neighbor(&mut self, face: Face, id: NodeId) -> Option<NodeId> {
        let previous = self.neighbors[face.index()].replace(id);
        previous.filter(|&p| p != id)
    }

    /// The unit attached to `face`, if known.
    pub fn neighbor_on(&self, face: Face) -> Option<NodeId> {
        self.neighbors[face.index()]
    }

    /// Reverse lookup: which face leads directly to `id`.
    pub fn neighbor_face_for(&self, id: NodeId) -> Option<Face> {
        Face::ALL
            .into_iter()
            .find(|f| self.neighbors[f.index()] == Some(id))
    }

    /// Mark `face` as the operator terminal.
    pub fn set_terminal(&mut self, face: Face) {
        self.terminal = Some(face);
    }

    /// The operator terminal face, if one attached.
    pub fn terminal(&self) -> Option<Face> {
        self.terminal
    }

    /// Faces a locally originated packet goes out on.
    pub fn broadcast_faces(&self) -> FaceSet {
        match self.terminal {
            Some(t) => FaceSet::ALL.without(t),
            None => FaceSet::ALL,
        }
    }

    /// Faces a received packet is relayed on: never back where it came from.
    pub fn forward_faces(&self, arrival: Face) -> FaceSet {
        self.broadcast_faces().without(arrival)
    }

    /// Number of faces with a known neighbor.
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.iter().filter(|n| n.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learns_and_reverse_looks_up() {
        let mut topo = Topology::new();
        assert_eq!(topo.learn_neighbor(Face::EAST, NodeId(7)), None);

        assert_eq!(topo.neighbor_on(Face::EAST), Some(NodeId(7)));
        assert_eq!(topo.neighbor_face_for(NodeId(7)), Some(Face::EAST));
        assert_eq!(topo.neighbor_face_for(NodeId(8)), None);
        assert_eq!(topo.neighbor_count(), 1);
    }

    #[test]
    fn overwrite_reports_replaced_neighbor() {
        let mut topo = Topology::new();
        topo.learn_neighbor(Face::NORTH, NodeId(1));
        // Same unit again is not a replacement
        assert_eq!(topo.learn_neighbor(Face::NORTH, NodeId(1)), None);
        assert_eq!(topo.learn_neighbor(Face::NORTH, NodeId(2)), Some(NodeId(1)));
        assert_eq!(topo.neighbor_face_for(NodeId(1)), None);
    }

    #[test]
    fn broadcast_skips_terminal() {
        let mut topo = Topology::new();
        assert_eq!(topo.broadcast_faces(), FaceSet::ALL);

        topo.set_terminal(Face::SOUTH);
        let faces = topo.broadcast_faces();
        assert_eq!(faces.len(), 3);
        assert!(!faces.contains(Face::SOUTH));
    }

    #[test]
    fn forward_skips_terminal_and_arrival() {
        let mut topo = Topology::new();
        topo.set_terminal(Face::SOUTH);

        let faces = topo.forward_faces(Face::WEST);
        assert_eq!(faces.iter().collect::<Vec<_>>(), vec![Face::NORTH, Face::EAST]);

        // Arrival on the terminal itself
        assert_eq!(topo.forward_faces(Face::SOUTH).len(), 3);
    }
}
