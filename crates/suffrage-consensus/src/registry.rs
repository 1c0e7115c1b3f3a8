//! Node registry: every unit this node has ever heard from.
//!
//! A fixed table of [`REGISTRY_CAPACITY`] records. Self always lives in
//! [`SELF_SLOT`]. Records are appended on first contact and never removed;
//! only their per-round fields are reset. Running out of slots is not
//! recoverable and is reported as [`Error::RegistryFull`].
//!
//! # Packet Keys
//!
//! A result packet is identified by `(id, time)`. A key seen before is a
//! duplicate and must not be processed or relayed again. This is the only
//! loop suppression in the mesh.

use suffrage_topology::NodeId;
use tracing::debug;

use crate::error::{Error, Result};
use crate::tally::Ballot;
use crate::threshold::{exceeds_rate, REGISTRY_CAPACITY, SPAM_AMNESTY};

/// Position of a record in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(usize);

/// Slot of the local node.
pub const SELF_SLOT: Slot = Slot(0);

impl Slot {
    /// Table index of this slot.
    pub const fn index(self) -> usize {
        self.0
    }

    /// Check if this is the local node.
    pub const fn is_self(self) -> bool {
        self.0 == SELF_SLOT.0
    }
}

/// Everything known about one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    /// Unit identifier.
    pub id: NodeId,
    /// Last packet time reported by the unit itself.
    pub node_time: u32,
    /// Local clock when that packet arrived.
    pub host_time: u32,
    /// Fresh packets seen (saturating).
    pub pings: u16,
    /// Heard from within the idle window.
    pub active: bool,
    /// Consecutive rounds in disagreement with the majority.
    pub strikes: u8,
    /// Vote for the current round.
    pub vote: Option<Ballot>,
}

impl NodeRecord {
    const EMPTY: Self = Self {
        id: NodeId(0),
        node_time: 0,
        host_time: 0,
        pings: 0,
        active: false,
        strikes: 0,
        vote: None,
    };
}

/// Result of presenting a packet key to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First packet from this unit; a record was appended.
    New(Slot),
    /// Known unit, new packet. `reached_ceiling` is set on the packet that
    /// brought the ping counter to its ceiling; later packets leave the
    /// counter where it is.
    Updated { slot: Slot, reached_ceiling: bool },
    /// The exact key was seen before. Drop the packet.
    Duplicate,
}

impl Admission {
    /// The slot to continue processing with, unless the packet is a duplicate.
    pub fn slot(self) -> Option<Slot> {
        match self {
            Self::New(slot) | Self::Updated { slot, .. } => Some(slot),
            Self::Duplicate => None,
        }
    }
}

/// Outcome of the per-node rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCheck {
    Within,
    /// Over the rate: the ping counter was reduced and the packet must be dropped.
    Spamming,
}

/// Fixed-capacity table of known units.
#[derive(Debug, Clone)]
pub struct Registry {
    records: [NodeRecord; REGISTRY_CAPACITY],
    len: usize,
}

impl Registry {
    /// A registry holding only the local node, marked active.
    pub fn new(self_id: NodeId, now: u32) -> Self {
        let mut records = [NodeRecord::EMPTY; REGISTRY_CAPACITY];
        records[SELF_SLOT.index()] = NodeRecord {
            id: self_id,
            host_time: now,
            active: true,
            ..NodeRecord::EMPTY
        };
        Self { records, len: 1 }
    }

    /// Look up `id`; append it if unknown.
    ///
    /// A known unit with a different `timestamp` is a new packet: its times are
    /// refreshed, its ping count advances (saturating at `ping_ceiling`) and
    /// it is marked active. The same `timestamp` again is a duplicate.
    pub fn admit_or_update(
        &mut self,
        id: NodeId,
        timestamp: u32,
        now: u32,
        ping_ceiling: u16,
    ) -> Result<Admission> {
        if let Some(slot) = self.slot_of(id) {
            let record = &mut self.records[slot.index()];
            if record.node_time == timestamp {
                return Ok(Admission::Duplicate);
            }

            let mut reached_ceiling = false;
            if record.pings < ping_ceiling {
                record.pings += 1;
                reached_ceiling = record.pings == ping_ceiling;
            }
            record.node_time = timestamp;
            record.host_time = now;
            record.active = true;
            return Ok(Admission::Updated { slot, reached_ceiling });
        }

        if self.len >= REGISTRY_CAPACITY {
            return Err(Error::RegistryFull {
                capacity: REGISTRY_CAPACITY,
            });
        }

        let slot = Slot(self.len);
        self.records[slot.index()] = NodeRecord {
            id,
            node_time: timestamp,
            host_time: now,
            pings: 1,
            active: true,
            ..NodeRecord::EMPTY
        };
        self.len += 1;
        debug!(node = %id, slot = slot.index(), "new node");
        Ok(Admission::New(slot))
    }

    /// Anti-spam guard for a packet stamped `timestamp` by the node in `slot`.
    ///
    /// A node with more pings than seconds on its clock loses
    /// [`SPAM_AMNESTY`] pings and the packet is to be dropped.
    pub fn check_rate(&mut self, slot: Slot, timestamp: u32, divisor_ms: u32) -> RateCheck {
        let record = self.get_mut(slot);
        if exceeds_rate(record.pings, timestamp, divisor_ms) {
            record.pings = record.pings.saturating_sub(SPAM_AMNESTY);
            RateCheck::Spamming
        } else {
            RateCheck::Within
        }
    }

    /// Account for a packet the local node originated at `now`.
    pub fn record_emission(&mut self, now: u32, ping_ceiling: u16) {
        let me = &mut self.records[SELF_SLOT.index()];
        if me.pings < ping_ceiling {
            me.pings += 1;
        }
        me.node_time = now;
        me.host_time = now;
    }

    /// Slot holding `id`, if known.
    pub fn slot_of(&self, id: NodeId) -> Option<Slot> {
        self.records[..self.len]
            .iter()
            .position(|r| r.id == id)
            .map(Slot)
    }

    /// Record in `slot`. Panics on a slot this registry never issued.
    pub fn get(&self, slot: Slot) -> &NodeRecord {
        &self.records[self.checked(slot)]
    }

    pub(crate) fn get_mut(&mut self, slot: Slot) -> &mut NodeRecord {
        let index = self.checked(slot);
        &mut self.records[index]
    }

    /// The local node's record.
    pub fn me(&self) -> &NodeRecord {
        &self.records[SELF_SLOT.index()]
    }

    /// Known records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &NodeRecord)> {
        self.records[..self.len]
            .iter()
            .enumerate()
            .map(|(i, r)| (Slot(i), r))
    }

    pub(crate) fn records_mut(&mut self) -> &mut [NodeRecord] {
        &mut self.records[..self.len]
    }

    /// Number of known units, self included.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: self is registered at construction.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of units currently marked active, self included.
    pub fn active_count(&self) -> usize {
        self.records[..self.len].iter().filter(|r| r.active).count()
    }

    /// Number of units with a recorded vote this round.
    pub fn voted_count(&self) -> usize {
        self.records[..self.len].iter().filter(|r| r.vote.is_some()).count()
    }

    /// Forget every vote. Identity, timestamps, pings and strikes survive.
    pub fn clear_votes(&mut self) {
        for record in self.records_mut() {
            record.vote = None;
        }
    }

    fn checked(&self, slot: Slot) -> usize {
        assert!(slot.index() < self.len, "slot {} not issued (len {})", slot.index(), self.len);
        slot.index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEILING: u16 = u16::MAX;

    fn registry() -> Registry {
        Registry::new(NodeId(100), 0)
    }

    #[test]
    fn self_occupies_slot_zero() {
        let reg = registry();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.slot_of(NodeId(100)), Some(SELF_SLOT));
        assert!(reg.me().active);
        assert_eq!(reg.active_count(), 1);
    }

    #[test]
    fn first_packet_appends() {
        let mut reg = registry();
        let adm = reg.admit_or_update(NodeId(7), 3000, 50, CEILING).unwrap();
        assert_eq!(adm, Admission::New(Slot(1)));

        let rec = reg.get(Slot(1));
        assert_eq!(rec.id, NodeId(7));
        assert_eq!(rec.node_time, 3000);
        assert_eq!(rec.host_time, 50);
        assert_eq!(rec.pings, 1);
    }

    #[test]
    fn same_key_twice_is_duplicate() {
        let mut reg = registry();
        reg.admit_or_update(NodeId(7), 3000, 50, CEILING).unwrap();
        assert_eq!(reg.admit_or_update(NodeId(7), 3000, 60, CEILING).unwrap(), Admission::Duplicate);

        // Exactly one update happened
        let rec = reg.get(Slot(1));
        assert_eq!(rec.pings, 1);
        assert_eq!(rec.host_time, 50);
    }

    #[test]
    fn new_timestamp_updates() {
        let mut reg = registry();
        reg.admit_or_update(NodeId(7), 3000, 50, CEILING).unwrap();
        let adm = reg.admit_or_update(NodeId(7), 4000, 1050, CEILING).unwrap();
        assert_eq!(adm, Admission::Updated { slot: Slot(1), reached_ceiling: false });

        let rec = reg.get(Slot(1));
        assert_eq!(rec.pings, 2);
        assert_eq!(rec.node_time, 4000);
        assert_eq!(rec.host_time, 1050);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn ping_ceiling_is_reported_once() {
        let mut reg = registry();
        reg.admit_or_update(NodeId(7), 1, 0, 3).unwrap();
        assert_eq!(
            reg.admit_or_update(NodeId(7), 2, 0, 3).unwrap(),
            Admission::Updated { slot: Slot(1), reached_ceiling: false }
        );
        assert_eq!(
            reg.admit_or_update(NodeId(7), 3, 0, 3).unwrap(),
            Admission::Updated { slot: Slot(1), reached_ceiling: true }
        );
        for t in 4..8 {
            assert_eq!(
                reg.admit_or_update(NodeId(7), t, 0, 3).unwrap(),
                Admission::Updated { slot: Slot(1), reached_ceiling: false }
            );
        }
        assert_eq!(reg.get(Slot(1)).pings, 3);
        // Timestamps still advance
        assert_eq!(reg.get(Slot(1)).node_time, 7);
    }

    #[test]
    fn full_registry_rejects_new_identifier() {
        let mut reg = registry();
        for i in 1..REGISTRY_CAPACITY as u32 {
            reg.admit_or_update(NodeId(i), 1, 0, CEILING).unwrap();
        }
        assert_eq!(reg.len(), REGISTRY_CAPACITY);

        let err = reg.admit_or_update(NodeId(999), 1, 0, CEILING).unwrap_err();
        assert!(matches!(err, Error::RegistryFull { capacity: REGISTRY_CAPACITY }));

        // Known identifiers are still served
        assert!(reg.admit_or_update(NodeId(5), 2, 0, CEILING).is_ok());
    }

    #[test]
    fn spam_guard_applies_amnesty() {
        let mut reg = registry();
        reg.admit_or_update(NodeId(7), 3000, 0, CEILING).unwrap();
        for t in [3001, 3002, 3003] {
            reg.admit_or_update(NodeId(7), t, 0, CEILING).unwrap();
        }
        // 4 pings at 3 seconds of sender clock
        assert_eq!(reg.check_rate(Slot(1), 3003, 1000), RateCheck::Spamming);
        assert_eq!(reg.get(Slot(1)).pings, 2);
        assert_eq!(reg.check_rate(Slot(1), 3003, 1000), RateCheck::Within);
    }

    #[test]
    fn amnesty_never_underflows() {
        let mut reg = registry();
        reg.admit_or_update(NodeId(7), 10, 0, CEILING).unwrap();
        assert_eq!(reg.check_rate(Slot(1), 10, 1000), RateCheck::Spamming);
        assert_eq!(reg.get(Slot(1)).pings, 0);
    }

    #[test]
    fn clear_votes_keeps_history() {
        let mut reg = registry();
        reg.admit_or_update(NodeId(7), 3000, 0, CEILING).unwrap();
        reg.get_mut(Slot(1)).vote = Ballot::new(5);
        reg.get_mut(Slot(1)).strikes = 2;
        assert_eq!(reg.voted_count(), 1);

        reg.clear_votes();
        let rec = reg.get(Slot(1));
        assert_eq!(rec.vote, None);
        assert_eq!(rec.strikes, 2);
        assert_eq!(rec.node_time, 3000);
    }

    #[test]
    #[should_panic(expected = "not issued")]
    fn unknown_slot_is_a_contract_violation() {
        let reg = registry();
        reg.get(Slot(3));
    }
}
