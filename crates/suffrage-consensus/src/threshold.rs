//! Fixed limits and thresholds of the voting protocol.
//!
//! - 32 registry slots, self included; identifiers are never evicted
//! - 2 voters before any majority is declared
//! - more than 3 consecutive disagreeing rounds before a link is punished
//! - at most one fresh packet per elapsed second of the sender's clock

/// Registry slots, self included.
pub const REGISTRY_CAPACITY: usize = 32;

/// Distinct ballots per round. Every candidate has at least one voter.
pub const CANDIDATE_CAPACITY: usize = REGISTRY_CAPACITY;

// Every voter can back a distinct ballot
const _: () = assert!(CANDIDATE_CAPACITY >= REGISTRY_CAPACITY);

/// Minimum number of recorded votes before a majority is declared.
pub const MIN_VOTERS: u32 = 2;

/// Strikes tolerated before a neighbor's link is power-cycled.
pub const STRIKE_THRESHOLD: u8 = 3;

/// Pings removed from a node caught over its rate.
pub const SPAM_AMNESTY: u16 = 2;

/// Sender clock units per allowed ping.
pub const SPAM_RATE_DIVISOR_MS: u32 = 1000;

/// Largest workload input an operator may request.
pub const CALCULATION_THRESHOLD: u32 = 1000;

/// Check if a vote count is enough to declare a majority.
pub const fn meets_quorum(votes: u32, min_voters: u32) -> bool {
    votes >= min_voters
}

/// Check if a node with `strikes` is due for punishment.
pub const fn exceeds_strikes(strikes: u8, threshold: u8) -> bool {
    strikes > threshold
}

/// Check if `pings` outruns the expected rate for a sender clock at `timestamp`.
///
/// A well-behaved sender produces about one fresh packet per second, so its
/// ping count should never exceed the seconds on its own clock.
pub const fn exceeds_rate(pings: u16, timestamp: u32, divisor_ms: u32) -> bool {
    pings as u32 > timestamp / divisor_ms
}
