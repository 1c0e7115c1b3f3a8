//! Wire packets.
//!
//! Every packet is one text line whose first character names its kind:
//!
//! ```text
//! c<calc>                                      calculation request (operator)
//! r<id>,<time>,<calc>,<calc_ver>,<vote>,<nbr>  round result / heartbeat
//! t                                            attach terminal, stream status table
//! x                                            reboot the whole grid
//! ```
//!
//! `<id>` is the sender's base-36 identifier; all other fields are decimal.
//! `(id, time)` is the packet key used for duplicate suppression.

use std::fmt;
use std::str::FromStr;

use suffrage_topology::NodeId;

use crate::error::{Error, Result};

/// A round-bearing result packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultPacket {
    /// Originating unit.
    pub id: NodeId,
    /// Originator's clock when the packet was made (ms).
    pub time: u32,
    /// Workload input of the round.
    pub calc: u32,
    /// Round version.
    pub calc_ver: u32,
    /// Originator's vote for the round, 0 if it has none.
    pub vote: u32,
    /// Set by the originator only; cleared by the first relay.
    pub neighbor: bool,
}

/// Every packet kind the mesh understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
    /// `c<N>`: start a new round for input N.
    Calculation(u32),
    /// `r...`: a vote / heartbeat.
    Result(ResultPacket),
    /// `t`: the sending face becomes the operator terminal.
    Terminal,
    /// `x`: reboot every unit.
    Reboot,
}

impl Packet {
    /// Kind character as it appears on the wire.
    pub const fn kind(&self) -> char {
        match self {
            Self::Calculation(_) => 'c',
            Self::Result(_) => 'r',
            Self::Terminal => 't',
            Self::Reboot => 'x',
        }
    }

    /// Parse one received line (trailing line ending tolerated).
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']).trim();
        let mut chars = line.chars();
        let kind = chars.next().ok_or(Error::Empty)?;
        let body = chars.as_str();

        match kind {
            'c' => parse_calculation(body).map(Self::Calculation),
            'r' => ResultPacket::parse_body(body).map(Self::Result),
            't' | 'x' if !body.is_empty() => {
                Err(Error::malformed(kind, format!("unexpected trailing data {:?}", body)))
            }
            't' => Ok(Self::Terminal),
            'x' => Ok(Self::Reboot),
            other => Err(Error::UnknownKind(other)),
        }
    }
}

fn parse_calculation(body: &str) -> Result<u32> {
    let value: i64 = body
        .trim()
        .parse()
        .map_err(|e| Error::malformed('c', format!("{:?}: {}", body, e)))?;

    if value < 0 {
        return Err(Error::NegativeCalculation(value));
    }
    u32::try_from(value).map_err(|_| Error::malformed('c', format!("{} does not fit in 32 bits", value)))
}

impl ResultPacket {
    /// Number of comma-separated fields in the body.
    pub const FIELD_COUNT: usize = 6;

    fn parse_body(body: &str) -> Result<Self> {
        let fields: Vec<&str> = body.split(',').map(str::trim).collect();
        if fields.len() != Self::FIELD_COUNT {
            return Err(Error::malformed(
                'r',
                format!("expected {} fields, found {}", Self::FIELD_COUNT, fields.len()),
            ));
        }

        let number = |index: usize, name: &str| -> Result<u32> {
            fields[index]
                .parse()
                .map_err(|e| Error::malformed('r', format!("{} {:?}: {}", name, fields[index], e)))
        };

        Ok(Self {
            id: NodeId::decode(fields[0])?,
            time: number(1, "time")?,
            calc: number(2, "calc")?,
            calc_ver: number(3, "calc_ver")?,
            vote: number(4, "vote")?,
            neighbor: number(5, "neighbor")? != 0,
        })
    }
}

impl fmt::Display for ResultPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "r{},{},{},{},{},{}",
            self.id,
            self.time,
            self.calc,
            self.calc_ver,
            self.vote,
            u8::from(self.neighbor)
        )
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calculation(n) => write!(f, "c{}", n),
            Self::Result(r) => r.fmt(f),
            Self::Terminal => f.write_str("t"),
            Self::Reboot => f.write_str("x"),
        }
    }
}

impl FromStr for Packet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
