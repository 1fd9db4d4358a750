//! Server side of the bootstrap Share service: serves the node list and
//! per-index identities to nodes/clients starting without a local config.
//!
//! Deliberately the simplest possible request/reply loop: no
//! `ThreadPool`, no interceptor chain, just the same framing as the data
//! path with a shorter default timeout.

use client::wire::{read_frame, write_frame, Code, InfoType, ShareReply, ShareRequest};
use common::{ClusterError, Identity, NodeDescriptor};
use logger::Logger;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_SHARE_TIMEOUT: Duration = Duration::from_secs(20);
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct ShareService {
    nodes: Vec<NodeDescriptor>,
    identity_list: Vec<Identity>,
    timeout: Duration,
    logger: Logger,
    running: Arc<AtomicBool>,
    accept_thread: Option<thread::JoinHandle<()>>,
}

impl ShareService {
    pub fn new(nodes: Vec<NodeDescriptor>, identity_list: Vec<Identity>, logger: Logger) -> Self {
        ShareService {
            nodes,
            identity_list,
            timeout: DEFAULT_SHARE_TIMEOUT,
            logger,
            running: Arc::new(AtomicBool::new(false)),
            accept_thread: None,
        }
    }

    pub fn serve(&mut self, addr: &str) -> Result<std::net::SocketAddr, ClusterError> {
        let listener = TcpListener::bind(addr).map_err(ClusterError::from)?;
        listener.set_nonblocking(true).map_err(ClusterError::from)?;
        let bound_addr = listener.local_addr().map_err(ClusterError::from)?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let nodes = self.nodes.clone();
        let identity_list = self.identity_list.clone();
        let timeout = self.timeout;
        let logger = self.logger.clone();

        self.accept_thread = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _peer)) => {
                        let nodes = nodes.clone();
                        let identity_list = identity_list.clone();
                        let logger = logger.clone();
                        thread::spawn(move || {
                            handle_stream(stream, &nodes, &identity_list, timeout, &logger);
                        });
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(ACCEPT_POLL_INTERVAL);
                    }
                    Err(e) => {
                        logger.error(&format!("share accept failed: {e}"), "share");
                        break;
                    }
                }
            }
        }));

        self.logger.info(&format!("share service listening on {bound_addr}"), "share");
        Ok(bound_addr)
    }

    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ShareService {
    fn drop(&mut self) {
        self.close();
    }
}

fn handle_stream(
    mut stream: TcpStream,
    nodes: &[NodeDescriptor],
    identity_list: &[Identity],
    timeout: Duration,
    logger: &Logger,
) {
    let _ = stream.set_read_timeout(Some(timeout));
    let request: Result<ShareRequest, ClusterError> = read_frame(&mut stream);
    let _ = stream.set_read_timeout(None);

    let request = match request {
        Ok(request) => request,
        Err(e) => {
            logger.info(&format!("share read failed: {e}"), "share");
            return;
        }
    };

    let reply = match request.kind {
        InfoType::InfoClusterNodes => match serde_json::to_vec(nodes) {
            Ok(info) => ShareReply {
                code: Code::None,
                msg: String::new(),
                kind: InfoType::InfoClusterNodes,
                info,
            },
            Err(e) => ShareReply {
                code: Code::Other,
                msg: e.to_string(),
                kind: InfoType::InfoClusterNodes,
                info: Vec::new(),
            },
        },
        InfoType::InfoIdentity => match identity_list.get(request.index as usize) {
            Some(identity) => match serde_json::to_vec(identity) {
                Ok(info) => ShareReply {
                    code: Code::None,
                    msg: String::new(),
                    kind: InfoType::InfoIdentity,
                    info,
                },
                Err(e) => ShareReply {
                    code: Code::Other,
                    msg: e.to_string(),
                    kind: InfoType::InfoIdentity,
                    info: Vec::new(),
                },
            },
            None => ShareReply {
                code: Code::NotFound,
                msg: format!("no identity at index {}", request.index),
                kind: InfoType::InfoIdentity,
                info: Vec::new(),
            },
        },
    };

    let _ = stream.set_write_timeout(Some(timeout));
    if let Err(e) = write_frame(&mut stream, &reply) {
        logger.info(&format!("share write failed: {e}"), "share");
    }
    let _ = stream.set_write_timeout(None);
}
