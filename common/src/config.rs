//! Persisted node/client configuration (JSON on disk).
//!
//! Everything a node or client needs to start lives in one struct:
//! identity, listen addresses, and the full node list, loaded and saved
//! with `serde_json`.

use crate::identity::Identity;
use crate::slot::NodeDescriptor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addresses {
    pub swarm: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub identity: Identity,
    pub addresses: Addresses,
    #[serde(default)]
    pub conf_path: Option<String>,
    pub nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    pub disable_delete: bool,
    #[serde(default)]
    pub read_only_client: bool,
    #[serde(default)]
    pub bootstrap_node: Option<String>,
    #[serde(default)]
    pub identity_list: Option<Vec<Identity>>,
    #[serde(default)]
    pub local_store_config: Option<String>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, text)
    }

    /// True when this node is the designated bootstrap peer for the Share
    /// service (it carries the identity list new nodes fetch by index).
    pub fn is_bootstrap(&self) -> bool {
        self.identity_list.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotRange;

    fn sample() -> Config {
        Config {
            identity: Identity::generate(),
            addresses: Addresses {
                swarm: vec!["127.0.0.1:7000".to_string()],
            },
            conf_path: None,
            nodes: vec![NodeDescriptor {
                id: "node-0".to_string(),
                slots: SlotRange::new(0, 16383),
                addresses: vec!["127.0.0.1:7000".to_string()],
            }],
            disable_delete: false,
            read_only_client: false,
            bootstrap_node: None,
            identity_list: None,
            local_store_config: None,
        }
    }

    #[test]
    fn round_trips_through_json() {
        let config = sample();
        let json = serde_json::to_string(&config).unwrap();
        let decoded: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert_eq!(decoded.identity.peer_id(), config.identity.peer_id());
    }

    #[test]
    fn is_bootstrap_reflects_identity_list_presence() {
        let mut config = sample();
        assert!(!config.is_bootstrap());
        config.identity_list = Some(vec![Identity::generate()]);
        assert!(config.is_bootstrap());
    }
}
