//! Crate-wide error taxonomy shared by the node server, the node client and
//! the cluster dispatcher.
//!
//! One enum of kinds, one constructor per kind, a human-readable message
//! carried on the struct rather than reconstructed from the kind at
//! display time.

use std::fmt;
use std::io;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterErrorKind {
    /// Key absent from the local store.
    NotFound,
    /// Read or write deadline exceeded.
    Timeout,
    /// Target peer unreachable or stream open failed.
    Unavailable,
    /// Malformed or unexpected record on the wire.
    Protocol,
    /// An interceptor rejected the request.
    AuthFailed,
    /// SlotTable construction/restoration failed, or a node id referenced by
    /// the SlotTable has no corresponding client in the dispatcher map.
    ConfigInvalid,
    /// The underlying `LocalStore` failed; message carries details.
    LocalStore,
    /// The caller's scope was dropped before the operation completed.
    Cancelled,
    /// A peer's reply or query entry carried a non-`None` status code;
    /// the failure originated on the remote side, not in the local
    /// transport or codec.
    Remote,
    /// Catch-all carrying a textual message.
    Other,
}

#[derive(Debug, Clone)]
pub struct ClusterError {
    pub kind: ClusterErrorKind,
    pub message: String,
    pub module: String,
}

impl ClusterError {
    fn build(kind: ClusterErrorKind, message: impl Into<String>, module: &str) -> Self {
        ClusterError {
            kind,
            message: message.into(),
            module: module.to_string(),
        }
    }

    pub fn new_not_found(key: &str, module: &str) -> Self {
        Self::build(
            ClusterErrorKind::NotFound,
            format!("key not found: '{key}'"),
            module,
        )
    }

    pub fn new_timeout(operation: &str, module: &str) -> Self {
        Self::build(
            ClusterErrorKind::Timeout,
            format!("timed out waiting for '{operation}'"),
            module,
        )
    }

    pub fn new_unavailable(peer: &str, module: &str) -> Self {
        Self::build(
            ClusterErrorKind::Unavailable,
            format!("peer unreachable: '{peer}'"),
            module,
        )
    }

    pub fn new_protocol(detail: impl Into<String>, module: &str) -> Self {
        Self::build(ClusterErrorKind::Protocol, detail, module)
    }

    pub fn new_auth_failed(module: &str) -> Self {
        Self::build(
            ClusterErrorKind::AuthFailed,
            "access token rejected",
            module,
        )
    }

    pub fn new_config_invalid(detail: impl Into<String>, module: &str) -> Self {
        Self::build(ClusterErrorKind::ConfigInvalid, detail, module)
    }

    pub fn new_local_store(detail: impl Into<String>, module: &str) -> Self {
        Self::build(ClusterErrorKind::LocalStore, detail, module)
    }

    pub fn new_cancelled(module: &str) -> Self {
        Self::build(ClusterErrorKind::Cancelled, "operation cancelled", module)
    }

    pub fn new_other(detail: impl Into<String>, module: &str) -> Self {
        Self::build(ClusterErrorKind::Other, detail, module)
    }

    pub fn new_remote(detail: impl Into<String>, module: &str) -> Self {
        Self::build(ClusterErrorKind::Remote, detail, module)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ClusterErrorKind::NotFound
    }

    pub fn is_remote(&self) -> bool {
        self.kind == ClusterErrorKind::Remote
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} [{}]: {}", self.kind, self.module, self.message)
    }
}

impl std::error::Error for ClusterError {}

impl From<io::Error> for ClusterError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                ClusterError::new_timeout(&err.to_string(), "io")
            }
            io::ErrorKind::NotFound => ClusterError::new_not_found(&err.to_string(), "io"),
            _ => ClusterError::new_other(err.to_string(), "io"),
        }
    }
}
