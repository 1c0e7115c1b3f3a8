//! Node configuration from the environment.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `SUFFRAGE_NODE_ID` | base-36 unit identifier | process id |
//! | `SUFFRAGE_FACE_<N>_BIND` | UDP address face N listens on | face unused |
//! | `SUFFRAGE_FACE_<N>_PEER` | UDP address face N writes to | last sender |
//! | `SUFFRAGE_HEARTBEAT_MS` | heartbeat period | 1000 |
//! | `SUFFRAGE_TABLE_FORMAT` | `text` or `json` | `text` |
//! | `SUFFRAGE_FAULTY` | start with fault injection on | off |
//!
//! Faces are numbered 0 (north), 1 (south), 2 (east), 3 (west).

use std::net::{AddrParseError, SocketAddr};
use std::num::ParseIntError;
use std::time::Duration;

use suffrage_consensus::{EngineConfig, TableFormat};
use suffrage_topology::{Face, NodeId, ParseNodeIdError, FACE_COUNT};
use thiserror::Error;

/// A configuration value that could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a node identifier: {source}")]
    NodeId {
        var: &'static str,
        value: String,
        source: ParseNodeIdError,
    },

    #[error("{var}={value:?} is not a socket address: {source}")]
    Address {
        var: String,
        value: String,
        source: AddrParseError,
    },

    #[error("{var}={value:?} is not a number: {source}")]
    Number {
        var: &'static str,
        value: String,
        source: ParseIntError,
    },

    #[error("{var}={value:?}: expected {expected}")]
    Choice {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Addresses of one face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaceConfig {
    /// Local address to receive on. A face without one is not wired.
    pub bind: Option<SocketAddr>,
    /// Fixed destination. Without one, replies go to whoever wrote last.
    pub peer: Option<SocketAddr>,
}

/// Everything needed to run one unit.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub id: NodeId,
    pub faces: [FaceConfig; FACE_COUNT],
    pub engine: EngineConfig,
    /// Start with fault injection on.
    pub faulty: bool,
    /// Pause between a reset and the next boot.
    pub reset_delay: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: NodeId(std::process::id()),
            faces: [FaceConfig::default(); FACE_COUNT],
            engine: EngineConfig::default(),
            faulty: false,
            reset_delay: Duration::from_millis(250),
        }
    }
}

impl NodeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("SUFFRAGE_NODE_ID") {
            config.id = value.trim().parse().map_err(|source| ConfigError::NodeId {
                var: "SUFFRAGE_NODE_ID",
                value: value.clone(),
                source,
            })?;
        }

        for face in Face::ALL {
            let slot = &mut config.faces[face.index()];
            slot.bind = address(&lookup, &format!("SUFFRAGE_FACE_{}_BIND", face.index()))?;
            slot.peer = address(&lookup, &format!("SUFFRAGE_FACE_{}_PEER", face.index()))?;
        }

        if let Some(value) = lookup("SUFFRAGE_HEARTBEAT_MS") {
            let ms = value.trim().parse().map_err(|source| ConfigError::Number {
                var: "SUFFRAGE_HEARTBEAT_MS",
                value: value.clone(),
                source,
            })?;
            config.engine = config.engine.with_heartbeat_period(ms);
        }

        if let Some(value) = lookup("SUFFRAGE_TABLE_FORMAT") {
            let format = match value.trim().to_ascii_lowercase().as_str() {
                "text" => TableFormat::Text,
                "json" => TableFormat::Json,
                _ => {
                    return Err(ConfigError::Choice {
                        var: "SUFFRAGE_TABLE_FORMAT",
                        value,
                        expected: "text or json",
                    })
                }
            };
            config.engine = config.engine.with_table_format(format);
        }

        if let Some(value) = lookup("SUFFRAGE_FAULTY") {
            config.faulty = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::Choice {
                        var: "SUFFRAGE_FAULTY",
                        value,
                        expected: "a boolean",
                    })
                }
            };
        }

        Ok(config)
    }

    /// Faces with a bind address.
    pub fn wired_faces(&self) -> impl Iterator<Item = (Face, &FaceConfig)> {
        Face::ALL
            .into_iter()
            .map(|f| (f, &self.faces[f.index()]))
            .filter(|(_, c)| c.bind.is_some())
    }
}

fn address(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Result<Option<SocketAddr>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|source| ConfigError::Address {
            var: var.to_string(),
            value,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<NodeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.id, NodeId(std::process::id()));
        assert_eq!(config.wired_faces().count(), 0);
        assert_eq!(config.engine.heartbeat_period_ms, 1000);
        assert_eq!(config.engine.table_format, TableFormat::Text);
        assert!(!config.faulty);
    }

    #[test]
    fn full_environment() {
        let config = load(&[
            ("SUFFRAGE_NODE_ID", "yA"),
            ("SUFFRAGE_FACE_2_BIND", "127.0.0.1:7002"),
            ("SUFFRAGE_FACE_2_PEER", "127.0.0.1:8003"),
            ("SUFFRAGE_HEARTBEAT_MS", "250"),
            ("SUFFRAGE_TABLE_FORMAT", "JSON"),
            ("SUFFRAGE_FAULTY", "1"),
        ])
        .unwrap();

        assert_eq!(config.id, NodeId(1234));
        let wired: Vec<_> = config.wired_faces().map(|(f, _)| f).collect();
        assert_eq!(wired, vec![Face::EAST]);
        assert_eq!(config.faces[2].peer, Some("127.0.0.1:8003".parse().unwrap()));
        assert_eq!(config.engine.heartbeat_period_ms, 250);
        assert_eq!(config.engine.table_format, TableFormat::Json);
        assert!(config.faulty);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = load(&[("SUFFRAGE_FACE_0_BIND", "nowhere")]).unwrap_err();
        assert!(err.to_string().starts_with("SUFFRAGE_FACE_0_BIND="), "{}", err);

        assert!(matches!(
            load(&[("SUFFRAGE_NODE_ID", "a-b")]).unwrap_err(),
            ConfigError::NodeId { .. }
        ));
        assert!(matches!(
            load(&[("SUFFRAGE_HEARTBEAT_MS", "-5")]).unwrap_err(),
            ConfigError::Number { .. }
        ));
        assert!(matches!(
            load(&[("SUFFRAGE_TABLE_FORMAT", "xml")]).unwrap_err(),
            ConfigError::Choice { .. }
        ));
    }
}
