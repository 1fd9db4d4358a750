//! `PeerTransport`: an addressable-stream abstraction with read/write
//! deadlines, standing in for a full peer-to-peer host library (connection
//! management, multiplexing, transport security).
//!
//! The only concrete implementation shipped here is a plain TCP stream; the
//! trait exists so a QUIC or libp2p-backed transport could be dropped in
//! without touching `NodeClient` or `ClusterClient`.

use common::ClusterError;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// A handle that can force-close a `PeerStream` from another thread,
/// unblocking whatever read or write is currently in flight on it.
pub trait CancelHandle: Send {
    fn cancel(&self);
}

/// One open duplex stream to a peer, with independently settable deadlines.
pub trait PeerStream: Read + Write + Send {
    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> Result<(), ClusterError>;
    fn set_write_deadline(&mut self, timeout: Option<Duration>) -> Result<(), ClusterError>;
    fn shutdown(&mut self);
    fn cancel_handle(&self) -> Box<dyn CancelHandle>;
}

struct TcpCancelHandle(TcpStream);

impl CancelHandle for TcpCancelHandle {
    fn cancel(&self) {
        let _ = self.0.shutdown(std::net::Shutdown::Both);
    }
}

impl PeerStream for TcpStream {
    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> Result<(), ClusterError> {
        self.set_read_timeout(timeout).map_err(ClusterError::from)
    }

    fn set_write_deadline(&mut self, timeout: Option<Duration>) -> Result<(), ClusterError> {
        self.set_write_timeout(timeout).map_err(ClusterError::from)
    }

    fn shutdown(&mut self) {
        let _ = TcpStream::shutdown(self, std::net::Shutdown::Both);
    }

    fn cancel_handle(&self) -> Box<dyn CancelHandle> {
        match self.try_clone() {
            Ok(clone) => Box::new(TcpCancelHandle(clone)),
            Err(_) => Box::new(NoopCancelHandle),
        }
    }
}

struct NoopCancelHandle;

impl CancelHandle for NoopCancelHandle {
    fn cancel(&self) {}
}

/// Opens addressable streams to peers. Safe for concurrent stream creation.
pub trait PeerTransport: Send + Sync {
    fn open_stream(&self, addresses: &[String]) -> Result<Box<dyn PeerStream>, ClusterError>;
}

/// Reference transport: connects over plain TCP, trying each configured
/// address in order until one succeeds.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        TcpTransport { connect_timeout }
    }
}

impl PeerTransport for TcpTransport {
    fn open_stream(&self, addresses: &[String]) -> Result<Box<dyn PeerStream>, ClusterError> {
        if addresses.is_empty() {
            return Err(ClusterError::new_unavailable("<no addresses>", "transport"));
        }
        let mut last_err = None;
        for address in addresses {
            match address.parse() {
                Ok(socket_addr) => {
                    match TcpStream::connect_timeout(&socket_addr, self.connect_timeout) {
                        Ok(stream) => return Ok(Box::new(stream)),
                        Err(e) => last_err = Some(e.to_string()),
                    }
                }
                Err(e) => last_err = Some(e.to_string()),
            }
        }
        Err(ClusterError::new_unavailable(
            &format!("{} ({})", addresses.join(","), last_err.unwrap_or_default()),
            "transport",
        ))
    }
}
