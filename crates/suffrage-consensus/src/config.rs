//! Engine configuration.

use crate::threshold::{
    CALCULATION_THRESHOLD, MIN_VOTERS, SPAM_RATE_DIVISOR_MS, STRIKE_THRESHOLD,
};

/// How the status table is written to the terminal face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    /// Boxed text table for a serial console.
    #[default]
    Text,
    /// One JSON object per refresh.
    Json,
}

/// Tunables of one consensus engine. Defaults match the deployed boards.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Heartbeat interval (ms).
    pub heartbeat_period_ms: u32,
    /// Silence after which a peer is considered inactive (ms).
    pub idle_window_ms: u32,
    /// Status table refresh interval (ms).
    pub table_period_ms: u32,
    /// Delay before a punished link is powered again (ms).
    pub power_restore_ms: u32,
    /// Window after boot in which reboot packets are ignored (ms).
    pub reboot_holdoff_ms: u32,
    /// Strikes tolerated before punishment (strictly greater punishes).
    pub strike_threshold: u8,
    /// Votes needed before a majority is declared.
    pub min_voters: u32,
    /// Largest accepted calculation input.
    pub calculation_threshold: u32,
    /// Sender clock units per allowed ping.
    pub spam_rate_divisor_ms: u32,
    /// Ceiling of the per-node ping counter.
    pub ping_ceiling: u16,
    /// Status table rendering.
    pub table_format: TableFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_period_ms: 1000,
            idle_window_ms: 5000,
            table_period_ms: 500,
            power_restore_ms: 2000,
            reboot_holdoff_ms: 500,
            strike_threshold: STRIKE_THRESHOLD,
            min_voters: MIN_VOTERS,
            calculation_threshold: CALCULATION_THRESHOLD,
            spam_rate_divisor_ms: SPAM_RATE_DIVISOR_MS,
            ping_ceiling: u16::MAX,
            table_format: TableFormat::Text,
        }
    }
}

impl EngineConfig {
    /// Set the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_period(mut self, ms: u32) -> Self {
        self.heartbeat_period_ms = ms;
        self
    }

    /// Set the inactivity window.
    #[must_use]
    pub fn with_idle_window(mut self, ms: u32) -> Self {
        self.idle_window_ms = ms;
        self
    }

    /// Set the delay before a punished link is restored.
    #[must_use]
    pub fn with_power_restore(mut self, ms: u32) -> Self {
        self.power_restore_ms = ms;
        self
    }

    /// Set the largest accepted calculation input.
    #[must_use]
    pub fn with_calculation_threshold(mut self, max: u32) -> Self {
        self.calculation_threshold = max;
        self
    }

    /// Set the ping counter ceiling.
    #[must_use]
    pub fn with_ping_ceiling(mut self, ceiling: u16) -> Self {
        self.ping_ceiling = ceiling;
        self
    }

    /// Set the status table format.
    #[must_use]
    pub fn with_table_format(mut self, format: TableFormat) -> Self {
        self.table_format = format;
        self
    }
}
