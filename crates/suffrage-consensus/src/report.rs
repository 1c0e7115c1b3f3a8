//! Status table for the operator terminal.

use std::fmt;

use serde::Serialize;

use crate::config::TableFormat;
use crate::registry::Registry;
use crate::round::{RoundPhase, RoundState};
use crate::tally::Ballot;

/// One registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRow {
    /// Base-36 identifier.
    pub id: String,
    pub active: bool,
    /// Local clock when the node was last heard from.
    pub host_time: u32,
    pub vote: Option<Ballot>,
    pub strikes: u8,
    pub pings: u16,
}

/// Everything the status table shows at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub calculation: u32,
    pub version: u32,
    pub host_time: u32,
    pub phase: RoundPhase,
    /// Declared winner; `None` for no majority or a tie.
    pub majority: Option<Ballot>,
    pub nodes: Vec<NodeRow>,
}

impl StatusSnapshot {
    pub fn capture(round: &RoundState, registry: &Registry, host_time: u32) -> Self {
        let nodes = registry
            .iter()
            .map(|(_, r)| NodeRow {
                id: r.id.to_string(),
                active: r.active,
                host_time: r.host_time,
                vote: r.vote,
                strikes: r.strikes,
                pings: r.pings,
            })
            .collect();

        Self {
            calculation: round.calc,
            version: round.calc_ver,
            host_time,
            phase: round.phase,
            majority: round.majority.winner(),
            nodes,
        }
    }

    /// Render in `format`, one terminal write's worth of text.
    pub fn render(&self, format: TableFormat) -> Result<String, serde_json::Error> {
        match format {
            TableFormat::Text => Ok(self.to_string()),
            TableFormat::Json => serde_json::to_string(self).map(|mut s| {
                s.push('\n');
                s
            }),
        }
    }
}

const RULE: &str = "+---------------------------------------------------------------+";
const DOUBLE_RULE: &str = "+===============================================================+";

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", DOUBLE_RULE)?;
        writeln!(
            f,
            "|CALCULATION: {:>4}  VERSION: {:>10}  HOST TIME: {:010}  |",
            self.calculation, self.version, self.host_time
        )?;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "|{:<8}  {:>6}  {:>10}  {:>8}  {:>9}  {:>12}|",
            "ID", "ACTIVE", "TIME-STAMP", "VOTE", "STRIKES", "PINGS"
        )?;
        writeln!(f, "{}", RULE)?;
        for row in &self.nodes {
            writeln!(
                f,
                "|{:<8}  {:>6}  {:>10}  {:>8}  {:>9}  {:>12}|",
                row.id,
                if row.active { 'A' } else { 'I' },
                row.host_time,
                Ballot::raw(row.vote),
                row.strikes,
                row.pings
            )?;
        }
        writeln!(f, "{}", RULE)?;
        match self.majority {
            Some(b) => writeln!(f, "|MAJORITY: {:<53}|", b)?,
            None => writeln!(f, "|MAJORITY: {:<53}|", "--")?,
        }
        writeln!(f, "{}", DOUBLE_RULE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::Majority;
    use suffrage_topology::NodeId;

    fn snapshot(majority: Majority) -> StatusSnapshot {
        let mut reg = Registry::new(NodeId(35), 0);
        reg.admit_or_update(NodeId(36), 4000, 120, u16::MAX).unwrap();
        let round = RoundState {
            calc: 15,
            calc_ver: 3,
            majority,
            phase: RoundPhase::Voting,
        };
        StatusSnapshot::capture(&round, &reg, 1500)
    }

    #[test]
    fn text_table_rows_line_up() {
        let text = snapshot(Majority::Decided(Ballot::new(47).unwrap())).to_string();
        let lines: Vec<&str> = text.lines().collect();

        let width = lines[0].len();
        assert!(lines.iter().all(|l| l.len() == width), "{}", text);
        assert!(text.contains("000000Z"));
        assert!(text.contains("0000010"));
        assert!(text.contains("|MAJORITY: 47 "));
    }

    #[test]
    fn tie_shows_dashes() {
        let text = snapshot(Majority::Tie).to_string();
        assert!(text.contains("|MAJORITY: -- "));
    }

    #[test]
    fn json_carries_every_row() {
        let json = snapshot(Majority::Undecided).render(TableFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["calculation"], 15);
        assert_eq!(value["majority"], serde_json::Value::Null);
        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["nodes"][1]["id"], "0000010");
        assert_eq!(value["phase"], "Voting");
    }
}
