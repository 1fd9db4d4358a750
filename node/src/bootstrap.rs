//! First-start provisioning: a node with no persisted config contacts a
//! bootstrap peer's Share service, fetches its identity and the node
//! list, and writes a fresh `Config` to disk.

use client::share_client::ShareClient;
use client::transport::PeerTransport;
use common::{ClusterError, Config, Addresses};
use std::sync::Arc;

pub fn provision(
    bootstrapper_addr: &str,
    identity_index: u32,
    listen_addr: &str,
    transport: Arc<dyn PeerTransport>,
) -> Result<Config, ClusterError> {
    let share = ShareClient::new(vec![bootstrapper_addr.to_string()], transport);

    let identity = share.identity(identity_index)?;
    let nodes = share.cluster_nodes()?;

    Ok(Config {
        identity,
        addresses: Addresses {
            swarm: vec![listen_addr.to_string()],
        },
        conf_path: None,
        nodes,
        disable_delete: false,
        read_only_client: false,
        bootstrap_node: Some(bootstrapper_addr.to_string()),
        identity_list: None,
        local_store_config: None,
    })
}
