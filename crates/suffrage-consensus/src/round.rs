//! Round and version state.

use serde::Serialize;

use crate::tally::Majority;

/// Where the local node is within the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RoundPhase {
    /// No round-defining calculation.
    #[default]
    Idle,
    /// Workload dispatched, local result pending.
    Computing,
    /// Votes are being tallied for the current version.
    Voting,
}

/// How an incoming round version relates to the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOrder {
    /// Older round; discard.
    Stale,
    /// Same round; merge the vote.
    Current,
    /// Newer round; adopt it.
    Newer,
}

impl VersionOrder {
    pub fn classify(incoming: u32, local: u32) -> Self {
        use std::cmp::Ordering;
        match incoming.cmp(&local) {
            Ordering::Less => Self::Stale,
            Ordering::Equal => Self::Current,
            Ordering::Greater => Self::Newer,
        }
    }
}

/// The current round as seen locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundState {
    /// Workload input, 0 for none.
    pub calc: u32,
    /// Round version. Higher always supersedes.
    pub calc_ver: u32,
    /// Last resolved majority.
    pub majority: Majority,
    pub phase: RoundPhase,
}

impl RoundState {
    /// Adopt a round announced by a peer.
    pub fn adopt(&mut self, calc: u32, calc_ver: u32) {
        self.calc = calc;
        self.calc_ver = calc_ver;
    }

    /// Version for the next locally requested round, `None` once the
    /// counter is exhausted.
    pub fn next_version(&self) -> Option<u32> {
        self.calc_ver.checked_add(1)
    }

    /// Forget the outcome of the round. Input and version stay.
    pub fn reset_outcome(&mut self) {
        self.majority = Majority::Undecided;
        self.phase = RoundPhase::Idle;
    }
}
