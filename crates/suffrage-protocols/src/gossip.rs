//! Face flooding.
//!
//! There is no hop count and no routing: a new packet is written to every
//! eligible face and each receiver decides, from the sender key alone,
//! whether it has seen the packet before. Eligibility comes from
//! [`Topology`]: the terminal face never carries mesh traffic, and a relay
//! never echoes a packet back out of the face it arrived on.

use suffrage_topology::{Face, FaceSet, Topology};
use tracing::trace;

use crate::packet::{Packet, ResultPacket};

/// Line-oriented link transport, one call per face.
pub trait Transport {
    /// Write one packet line to `face`. Delivery is best effort.
    fn send(&mut self, face: Face, line: &str);
}

/// Write `line` to every face in `faces`. Returns the number of faces written.
pub fn send_on<T: Transport + ?Sized>(transport: &mut T, faces: FaceSet, line: &str) -> usize {
    for face in faces.iter() {
        trace!(%face, line, "send");
        transport.send(face, line);
    }
    faces.len()
}

/// Originate a result packet on every face except the terminal.
pub fn broadcast<T: Transport + ?Sized>(
    transport: &mut T,
    topology: &Topology,
    packet: &ResultPacket,
) -> usize {
    let line = Packet::Result(*packet).to_string();
    send_on(transport, topology.broadcast_faces(), &line)
}

/// Relay a result packet on every face except the terminal and `arrival`.
pub fn forward<T: Transport + ?Sized>(
    transport: &mut T,
    topology: &Topology,
    packet: &ResultPacket,
    arrival: Face,
) -> usize {
    let line = Packet::Result(*packet).to_string();
    send_on(transport, topology.forward_faces(arrival), &line)
}

/// Consume the one-hop neighbor announcement carried by `packet`.
///
/// The sender is recorded as the neighbor on `arrival` and the flag is
/// cleared so that relays do not repeat the claim.
pub fn absorb_neighbor_flag(topology: &mut Topology, packet: &mut ResultPacket, arrival: Face) -> bool {
    if !packet.neighbor {
        return false;
    }
    packet.neighbor = false;
    if let Some(previous) = topology.learn_neighbor(arrival, packet.id) {
        trace!(face = %arrival, %previous, new = %packet.id, "neighbor replaced");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use suffrage_topology::NodeId;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(Face, String)>,
    }

    impl Transport for Recorder {
        fn send(&mut self, face: Face, line: &str) {
            self.sent.push((face, line.to_string()));
        }
    }

    fn packet(neighbor: bool) -> ResultPacket {
        ResultPacket {
            id: NodeId(9),
            time: 1000,
            calc: 4,
            calc_ver: 1,
            vote: 7,
            neighbor,
        }
    }

    #[test]
    fn broadcast_uses_all_faces_without_terminal() {
        let mut topo = Topology::new();
        let mut rec = Recorder::default();
        assert_eq!(broadcast(&mut rec, &topo, &packet(true)), 4);

        topo.set_terminal(Face::NORTH);
        rec.sent.clear();
        assert_eq!(broadcast(&mut rec, &topo, &packet(true)), 3);
        assert!(rec.sent.iter().all(|(f, _)| *f != Face::NORTH));
        assert_eq!(rec.sent[0].1, "r0000009,1000,4,1,7,1");
    }

    #[test]
    fn forward_never_echoes() {
        let mut topo = Topology::new();
        topo.set_terminal(Face::NORTH);
        let mut rec = Recorder::default();

        assert_eq!(forward(&mut rec, &topo, &packet(false), Face::EAST), 2);
        let faces: Vec<_> = rec.sent.iter().map(|(f, _)| *f).collect();
        assert_eq!(faces, vec![Face::SOUTH, Face::WEST]);
    }

    #[test]
    fn neighbor_flag_is_one_hop() {
        let mut topo = Topology::new();
        let mut pkt = packet(true);

        assert!(absorb_neighbor_flag(&mut topo, &mut pkt, Face::WEST));
        assert!(!pkt.neighbor);
        assert_eq!(topo.neighbor_face_for(NodeId(9)), Some(Face::WEST));

        // Relayed copy carries no flag and teaches nothing
        assert!(!absorb_neighbor_flag(&mut topo, &mut pkt, Face::EAST));
        assert_eq!(topo.neighbor_on(Face::EAST), None);
    }
}
