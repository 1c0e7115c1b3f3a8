//! Fault and liveness supervision.
//!
//! # Strikes
//!
//! Before every new round each known node is scored against the outgoing
//! round's majority: disagreeing adds a strike, agreeing clears them. The
//! first node over the strike threshold that sits directly on one of our
//! faces gets its link power-cycled. One punishment per sweep; the sweep
//! stops there and the remaining nodes are scored next time.
//!
//! # Liveness
//!
//! On every heartbeat, peers silent for longer than the idle window are
//! marked inactive and lose their pings and strikes, so a unit that comes
//! back starts clean.

use suffrage_topology::{Face, FaceSet, NodeId, Topology};
use tracing::{debug, warn};

use crate::platform::{Platform, Timer};
use crate::registry::Registry;
use crate::tally::Majority;
use crate::threshold::exceeds_strikes;

/// A link power-cycled by the strike sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Punishment {
    pub node: NodeId,
    pub face: Face,
    pub strikes: u8,
}

/// Links waiting to be powered back on.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    pending_restore: FaceSet,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score every node against `majority` and punish at most one offender.
    pub fn strike_sweep<P: Platform + ?Sized>(
        &mut self,
        registry: &mut Registry,
        topology: &Topology,
        majority: Majority,
        threshold: u8,
        restore_after_ms: u32,
        platform: &mut P,
    ) -> Option<Punishment> {
        for record in registry.records_mut() {
            if majority.agrees_with(record.vote) {
                record.strikes = 0;
            } else {
                record.strikes = record.strikes.saturating_add(1);
            }

            if !exceeds_strikes(record.strikes, threshold) {
                continue;
            }
            let Some(face) = topology.neighbor_face_for(record.id) else {
                continue;
            };

            let punishment = Punishment {
                node: record.id,
                face,
                strikes: record.strikes,
            };
            warn!(node = %record.id, %face, strikes = record.strikes, "power-cycling link of persistent dissenter");

            platform.set_face_power(face, false);
            self.pending_restore.insert(face);
            let at = platform.now_ms().wrapping_add(restore_after_ms);
            platform.schedule(Timer::PowerRestore, at);
            return Some(punishment);
        }
        None
    }

    /// Power every punished link back on. Returns the restored faces.
    pub fn restore_links<P: Platform + ?Sized>(&mut self, platform: &mut P) -> FaceSet {
        let restored = std::mem::take(&mut self.pending_restore);
        for face in restored.iter() {
            debug!(%face, "link power restored");
            platform.set_face_power(face, true);
        }
        restored
    }

    /// Links currently held down.
    pub fn pending_restore(&self) -> FaceSet {
        self.pending_restore
    }

    /// Reclassify peers by how recently they were heard from.
    ///
    /// Returns the number of peers found inactive.
    pub fn liveness_sweep(registry: &mut Registry, now: u32, idle_window_ms: u32) -> usize {
        let mut inactive = 0;
        for record in registry.records_mut().iter_mut().skip(1) {
            let silent_for = now.wrapping_sub(record.host_time);
            record.active = silent_for < idle_window_ms;
            if !record.active {
                record.pings = 0;
                record.strikes = 0;
                inactive += 1;
            }
        }
        inactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Slot, SELF_SLOT};
    use crate::tally::Ballot;
    use suffrage_protocols::Transport;

    #[derive(Default)]
    struct Board {
        now: u32,
        power: Vec<(Face, bool)>,
        timers: Vec<(Timer, u32)>,
    }

    impl Transport for Board {
        fn send(&mut self, _face: Face, _line: &str) {}
    }

    impl Platform for Board {
        fn now_ms(&self) -> u32 {
            self.now
        }
        fn set_status(&mut self, _status: crate::Status) {}
        fn fault_signal(&mut self, _faulty: bool) {}
        fn set_face_power(&mut self, face: Face, powered: bool) {
            self.power.push((face, powered));
        }
        fn schedule(&mut self, timer: Timer, at_ms: u32) {
            self.timers.push((timer, at_ms));
        }
    }

    fn setup() -> (Registry, Topology, Slot, Slot) {
        let mut reg = Registry::new(NodeId(1), 0);
        let a = reg.admit_or_update(NodeId(2), 5000, 0, u16::MAX).unwrap().slot().unwrap();
        let b = reg.admit_or_update(NodeId(3), 5000, 0, u16::MAX).unwrap().slot().unwrap();
        let mut topo = Topology::new();
        topo.learn_neighbor(Face::EAST, NodeId(3));
        (reg, topo, a, b)
    }

    fn vote(reg: &mut Registry, slot: Slot, v: u32) {
        reg.get_mut(slot).vote = Ballot::new(v);
    }

    #[test]
    fn four_disagreeing_sweeps_punish_once() {
        let (mut reg, topo, _, b) = setup();
        let mut sup = Supervisor::new();
        let mut board = Board { now: 10_000, ..Default::default() };
        let majority = Majority::Decided(Ballot::new(7).unwrap());

        for sweep in 1..=3 {
            vote(&mut reg, b, 9);
            assert_eq!(sup.strike_sweep(&mut reg, &topo, majority, 3, 2000, &mut board), None);
            assert_eq!(reg.get(b).strikes, sweep);
        }

        vote(&mut reg, b, 9);
        let punished = sup.strike_sweep(&mut reg, &topo, majority, 3, 2000, &mut board);
        assert_eq!(
            punished,
            Some(Punishment { node: NodeId(3), face: Face::EAST, strikes: 4 })
        );
        assert_eq!(board.power, vec![(Face::EAST, false)]);
        assert_eq!(board.timers, vec![(Timer::PowerRestore, 12_000)]);
        assert!(sup.pending_restore().contains(Face::EAST));
    }

    #[test]
    fn agreeing_clears_strikes() {
        let (mut reg, topo, _, b) = setup();
        let mut sup = Supervisor::new();
        let mut board = Board::default();
        reg.get_mut(b).strikes = 3;
        vote(&mut reg, b, 7);

        sup.strike_sweep(&mut reg, &topo, Majority::Decided(Ballot::new(7).unwrap()), 3, 2000, &mut board);
        assert_eq!(reg.get(b).strikes, 0);
    }

    #[test]
    fn offenders_without_a_face_are_spared() {
        let (mut reg, topo, a, _) = setup();
        let mut sup = Supervisor::new();
        let mut board = Board::default();
        reg.get_mut(a).strikes = 10;
        vote(&mut reg, a, 9);

        let punished = sup.strike_sweep(&mut reg, &topo, Majority::Tie, 3, 2000, &mut board);
        assert_eq!(punished, None);
        assert_eq!(reg.get(a).strikes, 11);
        assert!(board.power.is_empty());
    }

    #[test]
    fn sweep_stops_at_first_punishment() {
        let (mut reg, mut topo, a, b) = setup();
        topo.learn_neighbor(Face::WEST, NodeId(2));
        let mut sup = Supervisor::new();
        let mut board = Board::default();
        reg.get_mut(a).strikes = 3;
        reg.get_mut(b).strikes = 3;

        let punished = sup.strike_sweep(&mut reg, &topo, Majority::Tie, 3, 2000, &mut board);
        assert_eq!(punished.map(|p| p.node), Some(NodeId(2)));
        // b was not scored this time
        assert_eq!(reg.get(b).strikes, 3);
        assert_eq!(board.power.len(), 1);
    }

    #[test]
    fn restore_powers_pending_links() {
        let (mut reg, topo, _, b) = setup();
        let mut sup = Supervisor::new();
        let mut board = Board::default();
        reg.get_mut(b).strikes = 3;
        sup.strike_sweep(&mut reg, &topo, Majority::Tie, 3, 2000, &mut board);

        let restored = sup.restore_links(&mut board);
        assert_eq!(restored.iter().collect::<Vec<_>>(), vec![Face::EAST]);
        assert_eq!(board.power.last(), Some(&(Face::EAST, true)));
        assert!(sup.pending_restore().is_empty());
    }

    #[test]
    fn silent_peers_go_inactive_with_a_clean_slate() {
        let (mut reg, _, a, b) = setup();
        reg.get_mut(a).strikes = 2;
        reg.admit_or_update(NodeId(3), 9000, 4000, u16::MAX).unwrap();

        let inactive = Supervisor::liveness_sweep(&mut reg, 6000, 5000);
        assert_eq!(inactive, 1);

        let rec = reg.get(a);
        assert!(!rec.active);
        assert_eq!(rec.pings, 0);
        assert_eq!(rec.strikes, 0);

        assert!(reg.get(b).active);
        assert!(reg.get(SELF_SLOT).active);
    }
}
