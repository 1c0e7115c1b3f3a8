//! Board services the engine drives.
//!
//! The engine never touches hardware. Everything it needs from the board
//! (face output, clock, status light, link power, timers) goes through
//! [`Platform`], which the runtime or a test harness implements.

use std::fmt;

use suffrage_protocols::Transport;
use suffrage_topology::Face;

/// Status light of the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// No light: no round, not enough voters, or a tie.
    #[default]
    Off,
    /// Red: the local vote lost.
    Minority,
    /// Green: the local vote won.
    Majority,
    /// Blue: the workload is running.
    Processing,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Minority => write!(f, "minority (red)"),
            Self::Majority => write!(f, "majority (green)"),
            Self::Processing => write!(f, "processing (blue)"),
        }
    }
}

/// One-shot timers the engine schedules. Scheduling a timer again replaces
/// its previous deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Periodic round-status broadcast and liveness sweep.
    Heartbeat,
    /// Periodic status table on the terminal face.
    StatusTable,
    /// Power punished links back on.
    PowerRestore,
}

/// Everything the engine needs from the board.
pub trait Platform: Transport {
    /// Milliseconds since boot. Wraps at `u32::MAX`.
    fn now_ms(&self) -> u32;

    /// Show `status` on the status light.
    fn set_status(&mut self, status: Status);

    /// Flash the fault-injection state: red when `faulty`, green otherwise.
    fn fault_signal(&mut self, faulty: bool);

    /// Switch power to the link on `face`.
    fn set_face_power(&mut self, face: Face, powered: bool);

    /// Fire `timer` at the absolute time `at_ms`.
    fn schedule(&mut self, timer: Timer, at_ms: u32);
}
