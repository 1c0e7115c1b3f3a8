//! Leaderless Majority Voting
//!
//! Every unit in the mesh computes the same workload and floods its answer.
//! Each unit tallies the answers it hears and decides on its own whether it
//! sits with the majority. There is no leader and no agreement protocol:
//! a round is simply the latest calculation version anyone has announced.
//!
//! # Rounds
//!
//! - An operator `c<N>` starts a round with a higher version
//! - A result packet with a higher version pulls every receiver into it
//! - Same version: the sender's vote is merged, once per node
//! - Lower version: ignored
//!
//! # Fault Handling
//!
//! A unit that keeps disagreeing with the majority collects strikes. Past
//! the threshold its link is powered down and later restored. Peers that go
//! silent drop out of the active count and get a clean slate on return.
//!
//! # Step Machine
//!
//! [`ConsensusEngine`] is driven one event at a time and talks to the board
//! only through [`Platform`]. Running out of registry slots or receiving a
//! reboot yields [`Outcome::Reset`]; the runtime replaces the engine.

mod config;
mod engine;
mod error;
mod platform;
mod registry;
mod report;
mod round;
mod supervisor;
mod tally;
mod threshold;
mod workload;

pub use config::{EngineConfig, TableFormat};
pub use engine::{ConsensusEngine, Outcome, ResetReason};
pub use error::{Error, Result};
pub use platform::{Platform, Status, Timer};
pub use registry::{Admission, NodeRecord, RateCheck, Registry, Slot, SELF_SLOT};
pub use report::{NodeRow, StatusSnapshot};
pub use round::{RoundPhase, RoundState, VersionOrder};
pub use supervisor::{Punishment, Supervisor};
pub use tally::{Ballot, Candidate, IgnoreReason, Majority, Tally, VoteOutcome};
pub use threshold::{
    exceeds_rate, exceeds_strikes, meets_quorum, CALCULATION_THRESHOLD, CANDIDATE_CAPACITY,
    MIN_VOTERS, REGISTRY_CAPACITY, STRIKE_THRESHOLD,
};
pub use workload::{Dispatcher, NthPrime, Workload};
