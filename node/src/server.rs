//! Storage node server: accepts framed requests, dispatches to the local
//! `LocalStore`, streams query results.
//!
//! The accept loop hands each connection to a shared `ThreadPool`; per
//! stream, one request is read, run through the interceptor chain, and
//! dispatched against the fixed CBOR action table.

use crate::local_store::LocalStore;
use client::wire::{read_frame, write_frame, Action, Code, QueryEntry, Reply, Request};
use common::thread_pool::ThreadPool;
use common::ClusterError;
use logger::Logger;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::interceptor::Interceptor;

pub const DEFAULT_DATA_TIMEOUT: Duration = Duration::from_secs(180);
// A short hold-open after the final reply so the client has time to
// finish reading before the socket closes; kept in the hundreds-of-ms
// range here rather than full seconds so the integration tests stay fast.
const STREAM_GRACE_PERIOD: Duration = Duration::from_millis(200);
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct StorageNode {
    id: String,
    local_store: Arc<dyn LocalStore>,
    file_store: Arc<dyn LocalStore>,
    disable_delete: bool,
    interceptors: Vec<Box<dyn Interceptor>>,
    logger: Logger,
    pool: Arc<ThreadPool>,
    timeout: Duration,
    running: Arc<AtomicBool>,
    accept_thread: Option<thread::JoinHandle<()>>,
}

impl StorageNode {
    pub fn new(
        id: impl Into<String>,
        local_store: Arc<dyn LocalStore>,
        file_store: Arc<dyn LocalStore>,
        logger: Logger,
    ) -> Self {
        StorageNode {
            id: id.into(),
            local_store,
            file_store,
            disable_delete: false,
            interceptors: Vec::new(),
            logger,
            pool: Arc::new(ThreadPool::new(8)),
            timeout: DEFAULT_DATA_TIMEOUT,
            running: Arc::new(AtomicBool::new(false)),
            accept_thread: None,
        }
    }

    pub fn with_disable_delete(mut self, disable_delete: bool) -> Self {
        self.disable_delete = disable_delete;
        self
    }

    pub fn with_interceptor(mut self, interceptor: Box<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Binds `addr` and starts accepting connections, dispatching each to
    /// the shared `ThreadPool`. Returns the address actually bound (useful
    /// when `addr` asks for an ephemeral port).
    pub fn serve(&mut self, addr: &str) -> Result<std::net::SocketAddr, ClusterError> {
        let listener = TcpListener::bind(addr).map_err(ClusterError::from)?;
        listener.set_nonblocking(true).map_err(ClusterError::from)?;
        let bound_addr = listener.local_addr().map_err(ClusterError::from)?;

        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let pool = Arc::clone(&self.pool);
        let local_store = Arc::clone(&self.local_store);
        let file_store = Arc::clone(&self.file_store);
        let logger = self.logger.clone();
        let node_id = self.id.clone();
        let disable_delete = self.disable_delete;
        let timeout = self.timeout;

        let interceptors: Arc<[Box<dyn Interceptor>]> = self.interceptors.drain(..).collect();

        self.accept_thread = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _peer)) => {
                        let local_store = Arc::clone(&local_store);
                        let file_store = Arc::clone(&file_store);
                        let logger = logger.clone();
                        let node_id = node_id.clone();
                        let interceptors = Arc::clone(&interceptors);
                        let _ = pool.execute(move || {
                            handle_connection(
                                stream,
                                local_store,
                                file_store,
                                disable_delete,
                                &interceptors,
                                timeout,
                                &logger,
                                &node_id,
                            );
                        });
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(ACCEPT_POLL_INTERVAL);
                    }
                    Err(e) => {
                        logger.error(&format!("accept failed: {e}"), "server");
                        break;
                    }
                }
            }
        }));

        self.logger.info(&format!("node {} listening on {}", self.id, bound_addr), "server");
        Ok(bound_addr)
    }

    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StorageNode {
    fn drop(&mut self) {
        self.close();
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_connection(
    mut stream: TcpStream,
    local_store: Arc<dyn LocalStore>,
    file_store: Arc<dyn LocalStore>,
    disable_delete: bool,
    interceptors: &[Box<dyn Interceptor>],
    timeout: Duration,
    logger: &Logger,
    node_id: &str,
) {
    let _ = stream.set_read_timeout(Some(timeout));
    let request: Result<Request, ClusterError> = read_frame(&mut stream);
    let _ = stream.set_read_timeout(None);

    let request = match request {
        Ok(request) => request,
        Err(e) => {
            logger.info(&format!("read request failed: {e}"), "server");
            return;
        }
    };

    for interceptor in interceptors {
        if let Some(reply) = interceptor.intercept(&request) {
            let _ = stream.set_write_timeout(Some(timeout));
            let _ = write_frame(&mut stream, &reply);
            let _ = stream.set_write_timeout(None);
            return;
        }
    }

    let result = dispatch(
        &mut stream,
        &request,
        &local_store,
        &file_store,
        disable_delete,
        timeout,
    );

    if let Err(e) = result {
        logger.warn(&format!("node {node_id} stream error: {e}"), "server");
    }

    thread::sleep(STREAM_GRACE_PERIOD);
}

fn write_reply(stream: &mut TcpStream, reply: &Reply, timeout: Duration) -> Result<(), ClusterError> {
    let _ = stream.set_write_timeout(Some(timeout));
    let result = write_frame(stream, reply);
    let _ = stream.set_write_timeout(None);
    result
}

fn dispatch(
    stream: &mut TcpStream,
    request: &Request,
    local_store: &Arc<dyn LocalStore>,
    file_store: &Arc<dyn LocalStore>,
    disable_delete: bool,
    timeout: Duration,
) -> Result<(), ClusterError> {
    match request.action {
        Action::Put => {
            let reply = match local_store.put(&request.key, request.value.clone()) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::error(Code::Other, e.to_string()),
            };
            write_reply(stream, &reply, timeout)
        }
        Action::Get => {
            let reply = match local_store.get(&request.key) {
                Ok(value) => Reply {
                    code: Code::None,
                    msg: String::new(),
                    size: value.len() as i64,
                    value,
                    exists: true,
                },
                Err(e) if e.is_not_found() => Reply::error(Code::NotFound, e.to_string()),
                Err(e) => Reply::error(Code::Other, e.to_string()),
            };
            write_reply(stream, &reply, timeout)
        }
        Action::Has => {
            let reply = match local_store.has(&request.key) {
                Ok(exists) => Reply {
                    exists,
                    ..Reply::ok()
                },
                Err(e) => Reply::error(Code::Other, e.to_string()),
            };
            write_reply(stream, &reply, timeout)
        }
        Action::GetSize => {
            let reply = match local_store.get_size(&request.key) {
                Ok(size) => Reply { size, ..Reply::ok() },
                Err(e) if e.is_not_found() => Reply::error(Code::NotFound, e.to_string()),
                Err(e) => Reply::error(Code::Other, e.to_string()),
            };
            write_reply(stream, &reply, timeout)
        }
        Action::Delete => {
            let reply = if disable_delete {
                Reply::ok()
            } else {
                match local_store.delete(&request.key) {
                    Ok(()) => Reply::ok(),
                    Err(e) => Reply::error(Code::Other, e.to_string()),
                }
            };
            write_reply(stream, &reply, timeout)
        }
        Action::TouchFile => {
            let reply = match file_store.put(&request.key, Vec::new()) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::error(Code::Other, e.to_string()),
            };
            write_reply(stream, &reply, timeout)
        }
        Action::FileInfo => {
            let reply = match file_store.get(&request.key) {
                Ok(value) => Reply {
                    size: value.len() as i64,
                    value,
                    exists: true,
                    ..Reply::ok()
                },
                Err(e) if e.is_not_found() => Reply::error(Code::NotFound, e.to_string()),
                Err(e) => Reply::error(Code::Other, e.to_string()),
            };
            write_reply(stream, &reply, timeout)
        }
        Action::DeleteFile => {
            let reply = if disable_delete {
                Reply::ok()
            } else {
                match file_store.delete(&request.key) {
                    Ok(()) => Reply::ok(),
                    Err(e) => Reply::error(Code::Other, e.to_string()),
                }
            };
            write_reply(stream, &reply, timeout)
        }
        Action::Query => stream_query(stream, &request.query, local_store, timeout),
        Action::ListFiles => stream_query(stream, &request.query, file_store, timeout),
    }
}

fn stream_query(
    stream: &mut TcpStream,
    query: &client::wire::Query,
    store: &Arc<dyn LocalStore>,
    timeout: Duration,
) -> Result<(), ClusterError> {
    let entries = store.query(&query.prefix, query.offset, query.limit, query.keys_only)?;
    for entry in entries {
        let record = QueryEntry {
            code: Code::None,
            msg: String::new(),
            key: entry.key,
            value: entry.value.unwrap_or_default(),
            size: entry.size,
        };
        let _ = stream.set_write_timeout(Some(timeout));
        let result = write_frame(stream, &record);
        let _ = stream.set_write_timeout(None);
        result?;
    }
    let _ = stream.set_write_timeout(Some(timeout));
    let result = write_frame(stream, &QueryEntry::end());
    let _ = stream.set_write_timeout(None);
    result
}
