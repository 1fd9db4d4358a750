//! ClusterClient: owns the `SlotTable` and one `NodeClient` per node,
//! routes point operations, and fans `Query` out across every node.

use crate::node_client::NodeClient;
use crate::transport::{CancelHandle, PeerTransport};
use crate::wire::{Query, QueryEntry};
use common::{ClusterError, ClusterErrorKind, Config, SlotTable};
use logger::Logger;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct ClusterClient {
    table: SlotTable,
    clients: HashMap<String, NodeClient>,
    logger: Logger,
}

impl ClusterClient {
    pub fn new(
        config: &Config,
        transport: Arc<dyn PeerTransport>,
        logger: Logger,
    ) -> Result<Self, ClusterError> {
        let table = SlotTable::restore(config.nodes.clone())?;

        let mut clients = HashMap::with_capacity(config.nodes.len());
        for node in &config.nodes {
            let client = NodeClient::new(
                node.id.clone(),
                node.addresses.clone(),
                Arc::clone(&transport),
                logger.clone(),
            );
            clients.insert(node.id.clone(), client);
        }

        Ok(ClusterClient {
            table,
            clients,
            logger,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        for client in self.clients.values_mut() {
            *client = client.clone().with_timeout(timeout);
        }
        self
    }

    fn client_for_key(&self, key: &str) -> Result<&NodeClient, ClusterError> {
        let node = self.table.node_for_key(key.as_bytes())?;
        self.clients
            .get(&node.id)
            .ok_or_else(|| ClusterError::new_config_invalid(
                format!("no client registered for node '{}'", node.id),
                "cluster_client",
            ))
    }

    pub fn put(&self, key: &str, value: Vec<u8>) -> Result<(), ClusterError> {
        self.client_for_key(key)?.put(key, value)
    }

    pub fn get(&self, key: &str) -> Result<Vec<u8>, ClusterError> {
        self.client_for_key(key)?.get(key)
    }

    pub fn has(&self, key: &str) -> Result<bool, ClusterError> {
        self.client_for_key(key)?.has(key)
    }

    pub fn get_size(&self, key: &str) -> Result<i64, ClusterError> {
        self.client_for_key(key)?.get_size(key)
    }

    pub fn delete(&self, key: &str) -> Result<(), ClusterError> {
        self.client_for_key(key)?.delete(key)
    }

    pub fn nodes_count(&self) -> usize {
        self.table.nodes_count()
    }

    /// Opens one producer thread per node, each running `node.query(spec)`
    /// and forwarding entries onto a shared channel; the returned iterator
    /// drains that channel and cancels every producer if dropped early.
    pub fn query(&self, spec: Query) -> ClusterQueryIter {
        let (tx, rx) = mpsc::channel();
        let mut cancel_handles = Vec::with_capacity(self.clients.len());
        let mut join_handles = Vec::with_capacity(self.clients.len());

        for client in self.clients.values().cloned() {
            let spec = spec.clone();
            let tx = tx.clone();
            let logger = self.logger.clone();

            let mut query_stream = match client.query(spec) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    continue;
                }
            };
            if let Some(handle) = query_stream.cancel_handle() {
                cancel_handles.push(handle);
            }

            let node_id = client.node_id().to_string();
            join_handles.push(thread::spawn(move || {
                for item in query_stream.by_ref() {
                    if tx.send(item).is_err() {
                        // Consumer dropped the receiver; stop pulling entries.
                        break;
                    }
                }
                logger.info(&format!("query producer for node {node_id} finished"), "cluster_client");
            }));
        }
        drop(tx);

        ClusterQueryIter {
            receiver: rx,
            cancel_handles,
            join_handles: Some(join_handles),
            logger: self.logger.clone(),
            done: false,
        }
    }

    pub fn close(&mut self) {
        self.clients.clear();
    }
}

/// Consumer-side handle for a fanned-out Query. Dropping it before it is
/// drained signals every per-node producer to close its stream.
pub struct ClusterQueryIter {
    receiver: Receiver<Result<QueryEntry, ClusterError>>,
    cancel_handles: Vec<Box<dyn CancelHandle>>,
    join_handles: Option<Vec<thread::JoinHandle<()>>>,
    logger: Logger,
    done: bool,
}

impl ClusterQueryIter {
    /// Cancels every producer and waits for them to exit. Safe to call
    /// more than once.
    pub fn close(&mut self) {
        for handle in &self.cancel_handles {
            handle.cancel();
        }
        if let Some(handles) = self.join_handles.take() {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}

impl Iterator for ClusterQueryIter {
    type Item = Result<QueryEntry, ClusterError>;

    /// A query entry carrying a remote error code terminates the whole
    /// merged iterator immediately. A producer killed by a local transport
    /// failure (timeout, protocol error, disconnect) only takes that one
    /// producer down; its error is logged, not surfaced, and draining
    /// continues from the remaining producers.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.receiver.recv() {
                Ok(Err(e)) if e.kind == ClusterErrorKind::Remote => {
                    self.done = true;
                    return Some(Err(e));
                }
                Ok(Err(e)) => {
                    self.logger.warn(
                        &format!("query producer failed, continuing with remaining nodes: {e}"),
                        "cluster_client",
                    );
                    continue;
                }
                Ok(Ok(entry)) => return Some(Ok(entry)),
                Err(_) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

impl Drop for ClusterQueryIter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Addresses, Identity, NodeDescriptor, SlotRange};

    fn single_node_config(address: String) -> Config {
        Config {
            identity: Identity::generate(),
            addresses: Addresses { swarm: vec![] },
            conf_path: None,
            nodes: vec![NodeDescriptor {
                id: "node-0".to_string(),
                slots: SlotRange::new(0, 16383),
                addresses: vec![address],
            }],
            disable_delete: false,
            read_only_client: false,
            bootstrap_node: None,
            identity_list: None,
            local_store_config: None,
        }
    }

    #[test]
    fn rejects_config_whose_single_node_range_is_wrong() {
        let mut config = single_node_config("127.0.0.1:1".to_string());
        config.nodes[0].slots = SlotRange::new(0, 100);
        let transport = Arc::new(crate::transport::TcpTransport::default());
        let result = ClusterClient::new(&config, transport, Logger::null());
        assert!(result.is_err());
    }

    #[test]
    fn builds_a_client_per_configured_node() {
        let config = single_node_config("127.0.0.1:1".to_string());
        let transport = Arc::new(crate::transport::TcpTransport::default());
        let client = ClusterClient::new(&config, transport, Logger::null()).unwrap();
        assert_eq!(client.nodes_count(), 1);
    }

    fn fake_iter(results: Vec<Result<QueryEntry, ClusterError>>) -> ClusterQueryIter {
        let (tx, rx) = mpsc::channel();
        for item in results {
            tx.send(item).unwrap();
        }
        drop(tx);
        ClusterQueryIter {
            receiver: rx,
            cancel_handles: Vec::new(),
            join_handles: Some(Vec::new()),
            logger: Logger::null(),
            done: false,
        }
    }

    fn entry(key: &str) -> QueryEntry {
        QueryEntry {
            code: crate::wire::Code::None,
            msg: String::new(),
            key: key.to_string(),
            value: Vec::new(),
            size: 0,
        }
    }

    #[test]
    fn a_remote_error_entry_terminates_the_merged_iterator() {
        let mut iter = fake_iter(vec![
            Ok(entry("/a")),
            Err(ClusterError::new_remote("store rejected the query", "test")),
            Ok(entry("/b")),
        ]);
        assert!(iter.next().unwrap().is_ok());
        let err = iter.next().unwrap().unwrap_err();
        assert_eq!(err.kind, ClusterErrorKind::Remote);
        assert!(iter.next().is_none());
    }

    #[test]
    fn a_transport_error_only_drops_its_own_producer() {
        let mut iter = fake_iter(vec![
            Err(ClusterError::new_timeout("read", "test")),
            Ok(entry("/a")),
        ]);
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.key, "/a");
        assert!(iter.next().is_none());
    }
}
