//! Request interceptors run before dispatch; any one of them may
//! short-circuit the request with a reply of its own (auth rejection,
//! key rewriting under a tenant prefix, etc).

use client::wire::{Code, Reply, Request};
use std::collections::HashSet;

pub trait Interceptor: Send + Sync {
    /// Returns `Some(reply)` to short-circuit the request, `None` to let
    /// it continue to the next interceptor (or to dispatch).
    fn intercept(&self, request: &Request) -> Option<Reply>;
}

/// Rejects any request whose `access_token` is not in a fixed allow-list.
/// One illustrative scheme among many the abstract interceptor chain could
/// carry; nothing in the wire contract mandates this particular check.
pub struct AccessTokenInterceptor {
    allowed: HashSet<String>,
}

impl AccessTokenInterceptor {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        AccessTokenInterceptor {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl Interceptor for AccessTokenInterceptor {
    fn intercept(&self, request: &Request) -> Option<Reply> {
        if self.allowed.contains(&request.access_token) {
            None
        } else {
            Some(Reply::error(Code::AuthFailed, "access token rejected"))
        }
    }
}
