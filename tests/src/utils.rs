//! Shared fixtures for in-process cluster tests: spawns real `StorageNode`s
//! on ephemeral ports, assembles the matching `Config`, and hands back a
//! `ClusterClient` wired against them.

use client::cluster_client::ClusterClient;
use client::transport::TcpTransport;
use common::{Addresses, Config, Identity, NodeDescriptor, SlotRange, SlotTable};
use logger::Logger;
use node::{InMemoryStore, StorageNode};
use std::sync::Arc;
use std::time::Duration;

/// The 20-key fixed dataset exercised by the point-operation and query
/// scenarios.
pub fn fixed_dataset() -> Vec<(String, Vec<u8>)> {
    let names = [
        "Filedrive", "FileDAG", "Fileforge", "Filemesh", "Filevault", "Fileswarm", "Fileloom",
        "Fileshard", "Filegrid", "Filekeep", "Fileatlas", "Filebeacon", "Filecache", "Filedock",
        "Fileecho", "Filefort", "Filehaven", "Fileisle", "Filejunction", "Filekite",
    ];
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            (
                name.to_string(),
                format!("value-for-{name}-{i}").into_bytes(),
            )
        })
        .collect()
}

/// A running node plus enough to shut it down between tests.
pub struct NodeHandle {
    pub id: String,
    pub addr: String,
    server: StorageNode,
}

impl NodeHandle {
    pub fn spawn(id: &str) -> Self {
        let server = StorageNode::new(
            id,
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStore::new()),
            Logger::null(),
        );
        Self::start(id, server)
    }

    pub fn spawn_with_timeout(id: &str, timeout: Duration) -> Self {
        let server = StorageNode::new(
            id,
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStore::new()),
            Logger::null(),
        )
        .with_timeout(timeout);
        Self::start(id, server)
    }

    pub fn spawn_with_disable_delete(id: &str) -> Self {
        let server = StorageNode::new(
            id,
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStore::new()),
            Logger::null(),
        )
        .with_disable_delete(true);
        Self::start(id, server)
    }

    fn start(id: &str, mut server: StorageNode) -> Self {
        let addr = server.serve("127.0.0.1:0").expect("node failed to bind");
        NodeHandle {
            id: id.to_string(),
            addr: addr.to_string(),
            server,
        }
    }

    pub fn close(&mut self) {
        self.server.close();
    }
}

/// Spawns `count` nodes and assembles a `Config` whose node list carries
/// the ranges the construction algorithm assigns for that count.
pub fn cluster_of(count: usize) -> (Vec<NodeHandle>, Config) {
    let handles: Vec<NodeHandle> = (0..count)
        .map(|i| NodeHandle::spawn(&format!("node-{i}")))
        .collect();
    let config = config_for(&handles);
    (handles, config)
}

pub fn config_for(handles: &[NodeHandle]) -> Config {
    let descriptors: Vec<NodeDescriptor> = handles
        .iter()
        .map(|h| NodeDescriptor {
            id: h.id.clone(),
            slots: SlotRange::new(0, 0),
            addresses: vec![h.addr.clone()],
        })
        .collect();
    let table = SlotTable::build(descriptors).expect("failed to build slot table");

    Config {
        identity: Identity::generate(),
        addresses: Addresses { swarm: vec![] },
        conf_path: None,
        nodes: table.nodes().to_vec(),
        disable_delete: false,
        read_only_client: false,
        bootstrap_node: None,
        identity_list: None,
        local_store_config: None,
    }
}

pub fn client_for(config: &Config) -> ClusterClient {
    client_for_with_timeout(config, Duration::from_secs(5))
}

pub fn client_for_with_timeout(config: &Config, timeout: Duration) -> ClusterClient {
    let transport = Arc::new(TcpTransport::new(timeout));
    ClusterClient::new(config, transport, Logger::null())
        .expect("failed to build cluster client")
        .with_timeout(timeout)
}
