//! Candidate tally and majority resolution.
//!
//! Each round keeps a list of distinct ballots ("candidates") with their
//! vote counts. A node contributes at most one vote per round, and the
//! first vote it casts is final until the round is flushed.
//!
//! # Invariant
//!
//! The sum of all candidate tallies equals `votes_cast`, which equals the
//! number of registry records holding a vote.
//!
//! # Majority
//!
//! ```text
//! votes_cast < min_voters         → Undecided
//! two or more share the top tally → Tie
//! otherwise                       → Decided(top candidate)
//! ```

use std::fmt;
use std::num::NonZeroU32;

use serde::Serialize;

use crate::registry::{Registry, Slot};
use crate::threshold::{meets_quorum, CANDIDATE_CAPACITY};

/// A workload result cast as a vote. Zero means "no result" and is never a ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Ballot(NonZeroU32);

impl Ballot {
    /// Ballot for a raw result, `None` for the zero sentinel.
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Raw result value.
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Wire form of an optional ballot (0 when absent).
    pub fn raw(ballot: Option<Self>) -> u32 {
        ballot.map_or(0, Self::get)
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A distinct ballot and its vote count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub ballot: Ballot,
    pub votes: u32,
}

/// Outcome of majority resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Majority {
    /// Not enough voters, or nothing to count.
    #[default]
    Undecided,
    /// Two or more candidates share the highest tally.
    Tie,
    /// A single candidate leads.
    Decided(Ballot),
}

impl Majority {
    /// The winning ballot, if there is one.
    pub fn winner(self) -> Option<Ballot> {
        match self {
            Self::Decided(b) => Some(b),
            _ => None,
        }
    }

    /// Whether a node that voted `vote` agrees with this outcome.
    ///
    /// With no majority, only abstaining agrees. A tie agrees with nobody.
    pub fn agrees_with(self, vote: Option<Ballot>) -> bool {
        match self {
            Self::Undecided => vote.is_none(),
            Self::Tie => false,
            Self::Decided(b) => vote == Some(b),
        }
    }
}

/// Why a vote was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The zero sentinel.
    NoBallot,
    /// The node already cast this exact ballot.
    Duplicate,
    /// The node already cast a different ballot this round.
    AlreadyVoted,
}

/// Result of [`Tally::record_vote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Counted; the majority should be re-evaluated.
    Counted,
    /// Not counted, nothing changed.
    Ignored(IgnoreReason),
    /// Counting would put more votes than active nodes on the books: some
    /// vote was taken twice. Nothing changed; the round must be recounted.
    Conflict,
}

/// Vote counts for the current round.
#[derive(Debug, Clone)]
pub struct Tally {
    candidates: [Option<Candidate>; CANDIDATE_CAPACITY],
    len: usize,
    votes_cast: u32,
}

impl Default for Tally {
    fn default() -> Self {
        Self::new()
    }
}

impl Tally {
    pub const fn new() -> Self {
        Self {
            candidates: [None; CANDIDATE_CAPACITY],
            len: 0,
            votes_cast: 0,
        }
    }

    /// Count `ballot` for the node in `slot` and store it on its record.
    pub fn record_vote(&mut self, registry: &mut Registry, slot: Slot, ballot: Option<Ballot>) -> VoteOutcome {
        let Some(ballot) = ballot else {
            return VoteOutcome::Ignored(IgnoreReason::NoBallot);
        };

        match registry.get(slot).vote {
            Some(existing) if existing == ballot => return VoteOutcome::Ignored(IgnoreReason::Duplicate),
            Some(_) => return VoteOutcome::Ignored(IgnoreReason::AlreadyVoted),
            None => {}
        }

        if self.votes_cast as usize + 1 > registry.active_count() {
            return VoteOutcome::Conflict;
        }

        self.votes_cast += 1;
        self.candidate_mut(ballot).votes += 1;
        registry.get_mut(slot).vote = Some(ballot);
        VoteOutcome::Counted
    }

    /// Resolve the current round.
    ///
    /// Candidates are scanned in the order they were first voted for. A tally
    /// equal to the running maximum flags a tie; a strictly greater tally takes
    /// the lead and clears the flag. The result is a tie exactly when the final
    /// maximum is shared, independent of candidate order.
    pub fn resolve_majority(&self, min_voters: u32) -> Majority {
        if !meets_quorum(self.votes_cast, min_voters) {
            return Majority::Undecided;
        }

        let mut max_votes = 0;
        let mut leader = None;
        let mut tie = false;

        for candidate in self.candidates() {
            if candidate.votes > max_votes {
                max_votes = candidate.votes;
                leader = Some(candidate.ballot);
                tie = false;
            } else if candidate.votes == max_votes {
                tie = true;
            }
        }

        match leader {
            _ if tie => Majority::Tie,
            Some(ballot) => Majority::Decided(ballot),
            None => Majority::Undecided,
        }
    }

    /// Drop every candidate and vote.
    pub fn clear(&mut self) {
        self.candidates = [None; CANDIDATE_CAPACITY];
        self.len = 0;
        self.votes_cast = 0;
    }

    /// Votes counted this round.
    pub fn votes_cast(&self) -> u32 {
        self.votes_cast
    }

    /// Candidates in first-vote order.
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates[..self.len].iter().flatten()
    }

    /// Check the tally invariant against `registry`.
    pub fn is_consistent_with(&self, registry: &Registry) -> bool {
        let summed: u32 = self.candidates().map(|c| c.votes).sum();
        summed == self.votes_cast && registry.voted_count() == self.votes_cast as usize
    }

    fn candidate_mut(&mut self, ballot: Ballot) -> &mut Candidate {
        let found = self.candidates().position(|c| c.ballot == ballot);
        let index = match found {
            Some(index) => index,
            None => {
                assert!(self.len < CANDIDATE_CAPACITY, "candidate table overflow");
                self.len += 1;
                self.len - 1
            }
        };
        self.candidates[index].get_or_insert(Candidate { ballot, votes: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SELF_SLOT;
    use crate::threshold::MIN_VOTERS;
    use proptest::prelude::*;
    use suffrage_topology::NodeId;

    fn ballot(v: u32) -> Option<Ballot> {
        Ballot::new(v)
    }

    /// Registry with self plus `peers` active peers, returning their slots.
    fn registry_with(peers: u32) -> (Registry, Vec<Slot>) {
        let mut reg = Registry::new(NodeId(1000), 0);
        let mut slots = vec![SELF_SLOT];
        for i in 1..=peers {
            let adm = reg.admit_or_update(NodeId(i), 5000, 0, u16::MAX).unwrap();
            slots.push(adm.slot().unwrap());
        }
        (reg, slots)
    }

    fn tally_of(votes: &[u32]) -> (Tally, Registry) {
        let (mut reg, slots) = registry_with(votes.len() as u32);
        let mut tally = Tally::new();
        for (slot, &v) in slots.iter().skip(1).zip(votes) {
            assert_eq!(tally.record_vote(&mut reg, *slot, ballot(v)), VoteOutcome::Counted);
        }
        (tally, reg)
    }

    #[test]
    fn zero_is_never_counted() {
        let (mut reg, _) = registry_with(1);
        let mut tally = Tally::new();
        assert_eq!(
            tally.record_vote(&mut reg, SELF_SLOT, None),
            VoteOutcome::Ignored(IgnoreReason::NoBallot)
        );
        assert_eq!(tally.votes_cast(), 0);
        assert_eq!(reg.me().vote, None);
    }

    #[test]
    fn first_vote_is_final() {
        let (mut reg, slots) = registry_with(1);
        let mut tally = Tally::new();
        let peer = slots[1];

        assert_eq!(tally.record_vote(&mut reg, peer, ballot(7)), VoteOutcome::Counted);
        assert_eq!(
            tally.record_vote(&mut reg, peer, ballot(7)),
            VoteOutcome::Ignored(IgnoreReason::Duplicate)
        );
        assert_eq!(
            tally.record_vote(&mut reg, peer, ballot(9)),
            VoteOutcome::Ignored(IgnoreReason::AlreadyVoted)
        );

        assert_eq!(reg.get(peer).vote, ballot(7));
        assert_eq!(tally.votes_cast(), 1);
        assert!(tally.is_consistent_with(&reg));
    }

    #[test]
    fn candidates_append_in_first_vote_order() {
        let (tally, reg) = tally_of(&[9, 7, 9, 4, 7, 9]);
        let seen: Vec<(u32, u32)> = tally.candidates().map(|c| (c.ballot.get(), c.votes)).collect();
        assert_eq!(seen, vec![(9, 3), (7, 2), (4, 1)]);
        assert!(tally.is_consistent_with(&reg));
    }

    #[test]
    fn more_votes_than_active_nodes_is_a_conflict() {
        let (mut reg, slots) = registry_with(1);
        let mut tally = Tally::new();
        tally.record_vote(&mut reg, slots[0], ballot(3));
        tally.record_vote(&mut reg, slots[1], ballot(3));

        // Replay race: the tally still counts a vote the records no longer hold
        reg.get_mut(slots[1]).active = false;
        reg.get_mut(slots[1]).vote = None;

        assert_eq!(tally.record_vote(&mut reg, slots[1], ballot(3)), VoteOutcome::Conflict);
        assert_eq!(tally.votes_cast(), 2);
    }

    #[test]
    fn below_quorum_is_undecided() {
        let (tally, _) = tally_of(&[7]);
        assert_eq!(tally.resolve_majority(MIN_VOTERS), Majority::Undecided);
        assert_eq!(Tally::new().resolve_majority(MIN_VOTERS), Majority::Undecided);
    }

    #[test]
    fn clear_plurality_wins() {
        let (tally, reg) = tally_of(&[7, 7, 9]);
        assert_eq!(tally.resolve_majority(MIN_VOTERS), Majority::Decided(Ballot::new(7).unwrap()));
        assert!(tally.is_consistent_with(&reg));
    }

    #[test]
    fn two_way_split_is_a_tie() {
        let (tally, _) = tally_of(&[7, 9]);
        assert_eq!(tally.resolve_majority(MIN_VOTERS), Majority::Tie);
    }

    #[test]
    fn later_strict_leader_clears_earlier_tie() {
        // Scan sees 1, 1 (tie) then 2
        let (tally, _) = tally_of(&[3, 5, 8, 8]);
        assert_eq!(tally.resolve_majority(MIN_VOTERS), Majority::Decided(Ballot::new(8).unwrap()));
    }

    #[test]
    fn clear_resets_everything() {
        let (mut tally, _) = tally_of(&[7, 7, 9]);
        tally.clear();
        assert_eq!(tally.votes_cast(), 0);
        assert_eq!(tally.candidates().count(), 0);
        assert_eq!(tally.resolve_majority(MIN_VOTERS), Majority::Undecided);
    }

    #[test]
    fn agreement_rules() {
        let seven = Ballot::new(7);
        assert!(Majority::Undecided.agrees_with(None));
        assert!(!Majority::Undecided.agrees_with(seven));
        assert!(!Majority::Tie.agrees_with(seven));
        assert!(!Majority::Tie.agrees_with(None));
        assert!(Majority::Decided(seven.unwrap()).agrees_with(seven));
        assert!(!Majority::Decided(seven.unwrap()).agrees_with(Ballot::new(9)));
    }

    proptest! {
        #[test]
        fn unique_plurality_always_wins(
            votes in prop::collection::vec(1u32..6, 2..31),
        ) {
            let (tally, reg) = tally_of(&votes);
            prop_assert!(tally.is_consistent_with(&reg));

            let mut counts = std::collections::BTreeMap::new();
            for v in &votes {
                *counts.entry(*v).or_insert(0u32) += 1;
            }
            let top = *counts.values().max().unwrap();
            let leaders: Vec<u32> = counts.iter().filter(|(_, c)| **c == top).map(|(v, _)| *v).collect();

            let expected = if leaders.len() == 1 {
                Majority::Decided(Ballot::new(leaders[0]).unwrap())
            } else {
                Majority::Tie
            };
            prop_assert_eq!(tally.resolve_majority(MIN_VOTERS), expected);
        }

        #[test]
        fn resolution_ignores_arrival_order(
            mut votes in prop::collection::vec(1u32..5, 2..20),
            seed in any::<u64>(),
        ) {
            let (forward, _) = tally_of(&votes);
            // Cheap deterministic shuffle
            let len = votes.len();
            for i in 0..len {
                let j = ((seed >> (i % 64)) as usize).wrapping_add(i * 7) % len;
                votes.swap(i, j);
            }
            let (shuffled, _) = tally_of(&votes);
            prop_assert_eq!(forward.resolve_majority(MIN_VOTERS), shuffled.resolve_majority(MIN_VOTERS));
        }
    }
}
