//! Peer identity: a stable fingerprint paired with an opaque local secret.
//!
//! Both are 160-bit random values, hex-encoded. No public-key
//! cryptography is implemented; `secret_key` is a local-only value of
//! the same shape, never transmitted.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    peer_id: String,
    secret_key: String,
}

impl Identity {
    pub fn generate() -> Self {
        Identity {
            peer_id: random_hex_160(),
            secret_key: random_hex_160(),
        }
    }

    pub fn from_parts(peer_id: String, secret_key: String) -> Self {
        Identity {
            peer_id,
            secret_key,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

fn random_hex_160() -> String {
    let mut bytes = [0u8; 20];
    rand::fill(&mut bytes);
    hex::encode(bytes)
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.peer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identities_are_distinct() {
        let a = Identity::generate();
        let b = Identity::generate();
        assert_ne!(a.peer_id(), b.peer_id());
        assert_ne!(a.secret_key(), b.secret_key());
    }

    #[test]
    fn peer_id_is_40_hex_chars_for_160_bits() {
        let id = Identity::generate();
        assert_eq!(id.peer_id().len(), 40);
        assert!(id.peer_id().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
