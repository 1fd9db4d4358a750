//! Storage node client: opens one fresh stream per call to a single peer,
//! enforces read/write deadlines, and surfaces typed errors.
//!
//! No reconnect-on-redirect logic here: the `SlotTable` is static once
//! loaded, so a node's address never moves under a client's feet.

use crate::transport::{CancelHandle, PeerStream, PeerTransport};
use crate::wire::{read_frame, write_frame, Action, Code, Query, QueryEntry, Reply, Request};
use common::ClusterError;
use logger::Logger;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DATA_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Clone)]
pub struct NodeClient {
    node_id: String,
    addresses: Vec<String>,
    transport: Arc<dyn PeerTransport>,
    timeout: Duration,
    logger: Logger,
}

impl NodeClient {
    pub fn new(
        node_id: impl Into<String>,
        addresses: Vec<String>,
        transport: Arc<dyn PeerTransport>,
        logger: Logger,
    ) -> Self {
        NodeClient {
            node_id: node_id.into(),
            addresses,
            transport,
            timeout: DEFAULT_DATA_TIMEOUT,
            logger,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    fn open(&self) -> Result<Box<dyn PeerStream>, ClusterError> {
        self.transport.open_stream(&self.addresses)
    }

    fn call(&self, request: &Request) -> Result<Reply, ClusterError> {
        let mut stream = self.open()?;
        stream.set_write_deadline(Some(self.timeout))?;
        let write_result = write_frame(&mut stream, request);
        stream.set_write_deadline(None)?;
        write_result?;

        stream.set_read_deadline(Some(self.timeout))?;
        let reply: Result<Reply, ClusterError> = read_frame(&mut stream);
        stream.set_read_deadline(None)?;
        let reply = reply?;
        stream.shutdown();
        Ok(reply)
    }

    fn point_op(&self, action: Action, key: &str, value: Vec<u8>) -> Result<Reply, ClusterError> {
        let request = Request::point(action, key).with_value(value);
        let reply = self.call(&request)?;
        reply.into_result("node_client")
    }

    pub fn put(&self, key: &str, value: Vec<u8>) -> Result<(), ClusterError> {
        self.point_op(Action::Put, key, value)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Vec<u8>, ClusterError> {
        let reply = self.point_op(Action::Get, key, Vec::new())?;
        Ok(reply.value)
    }

    pub fn has(&self, key: &str) -> Result<bool, ClusterError> {
        let reply = self.point_op(Action::Has, key, Vec::new())?;
        Ok(reply.exists)
    }

    pub fn get_size(&self, key: &str) -> Result<i64, ClusterError> {
        let reply = self.point_op(Action::GetSize, key, Vec::new())?;
        Ok(reply.size)
    }

    pub fn delete(&self, key: &str) -> Result<(), ClusterError> {
        self.point_op(Action::Delete, key, Vec::new())?;
        Ok(())
    }

    pub fn touch_file(&self, key: &str) -> Result<(), ClusterError> {
        self.point_op(Action::TouchFile, key, Vec::new())?;
        Ok(())
    }

    pub fn file_info(&self, key: &str) -> Result<Vec<u8>, ClusterError> {
        Ok(self.point_op(Action::FileInfo, key, Vec::new())?.value)
    }

    pub fn delete_file(&self, key: &str) -> Result<(), ClusterError> {
        self.point_op(Action::DeleteFile, key, Vec::new())?;
        Ok(())
    }

    pub fn list_files(&self, query: Query) -> Result<QueryStream, ClusterError> {
        self.query_with_action(Action::ListFiles, query)
    }

    pub fn query(&self, query: Query) -> Result<QueryStream, ClusterError> {
        self.query_with_action(Action::Query, query)
    }

    fn query_with_action(&self, action: Action, query: Query) -> Result<QueryStream, ClusterError> {
        let mut request = Request::query_request(query);
        request.action = action;

        let mut stream = self.open()?;
        stream.set_write_deadline(Some(self.timeout))?;
        let write_result = write_frame(&mut stream, &request);
        stream.set_write_deadline(None)?;
        write_result?;

        Ok(QueryStream {
            stream: Some(stream),
            timeout: self.timeout,
            node_id: self.node_id.clone(),
            logger: self.logger.clone(),
            finished: false,
        })
    }
}

/// Lazy sequence of `QueryEntry` records for one node's query stream.
///
/// Closing it (explicitly via `close()`, or implicitly on drop) shuts the
/// underlying stream down so the server's reader unblocks promptly. This
/// is the per-producer half of cluster-level query cancellation.
pub struct QueryStream {
    stream: Option<Box<dyn PeerStream>>,
    timeout: Duration,
    node_id: String,
    logger: Logger,
    finished: bool,
}

impl QueryStream {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// A handle that can force-close this stream from another thread, used
    /// by the cluster dispatcher to cancel one producer without touching
    /// its peers.
    pub fn cancel_handle(&self) -> Option<Box<dyn CancelHandle>> {
        self.stream.as_ref().map(|s| s.cancel_handle())
    }

    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown();
        }
        self.finished = true;
    }
}

impl Iterator for QueryStream {
    type Item = Result<QueryEntry, ClusterError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let stream = self.stream.as_mut()?;
        if let Err(e) = stream.set_read_deadline(Some(self.timeout)) {
            self.close();
            return Some(Err(e));
        }
        let entry: Result<QueryEntry, ClusterError> = read_frame(stream);
        let _ = stream.set_read_deadline(None);

        match entry {
            Ok(entry) if entry.is_end() => {
                self.close();
                None
            }
            Ok(entry) if entry.code != Code::None => {
                self.logger.warn(
                    &format!("query entry from node {} carried error: {}", self.node_id, entry.msg),
                    "node_client",
                );
                self.close();
                Some(Err(ClusterError::new_remote(entry.msg, "node_client")))
            }
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl Drop for QueryStream {
    fn drop(&mut self) {
        self.close();
    }
}
