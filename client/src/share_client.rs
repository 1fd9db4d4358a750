//! Client side of the bootstrap Share service: fetch the node list or a
//! single identity by index from a designated bootstrap peer.
//!
//! Separate protocol, separate (short) timeout, from the data path. This
//! exists only for first-start provisioning.

use crate::transport::PeerTransport;
use crate::wire::{read_frame, write_frame, Code, InfoType, ShareReply, ShareRequest};
use common::{ClusterError, Identity, NodeDescriptor};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SHARE_TIMEOUT: Duration = Duration::from_secs(20);

pub struct ShareClient {
    addresses: Vec<String>,
    transport: Arc<dyn PeerTransport>,
    timeout: Duration,
}

impl ShareClient {
    pub fn new(addresses: Vec<String>, transport: Arc<dyn PeerTransport>) -> Self {
        ShareClient {
            addresses,
            transport,
            timeout: DEFAULT_SHARE_TIMEOUT,
        }
    }

    fn call(&self, request: &ShareRequest) -> Result<ShareReply, ClusterError> {
        let mut stream = self.transport.open_stream(&self.addresses)?;
        stream.set_write_deadline(Some(self.timeout))?;
        let write_result = write_frame(&mut stream, request);
        stream.set_write_deadline(None)?;
        write_result?;

        stream.set_read_deadline(Some(self.timeout))?;
        let reply: Result<ShareReply, ClusterError> = read_frame(&mut stream);
        stream.set_read_deadline(None)?;
        let reply = reply?;
        stream.shutdown();

        match reply.code {
            Code::None => Ok(reply),
            Code::NotFound => Err(ClusterError::new_not_found("identity index", "share_client")),
            Code::AuthFailed => Err(ClusterError::new_auth_failed("share_client")),
            _ => Err(ClusterError::new_other(reply.msg, "share_client")),
        }
    }

    pub fn cluster_nodes(&self) -> Result<Vec<NodeDescriptor>, ClusterError> {
        let reply = self.call(&ShareRequest {
            kind: InfoType::InfoClusterNodes,
            index: 0,
        })?;
        serde_json::from_slice(&reply.info)
            .map_err(|e| ClusterError::new_protocol(format!("malformed node list: {e}"), "share_client"))
    }

    pub fn identity(&self, index: u32) -> Result<Identity, ClusterError> {
        let reply = self.call(&ShareRequest {
            kind: InfoType::InfoIdentity,
            index,
        })?;
        serde_json::from_slice(&reply.info)
            .map_err(|e| ClusterError::new_protocol(format!("malformed identity: {e}"), "share_client"))
    }
}
