//! Pluggable local key/value engine.
//!
//! `LocalStore` is the trait boundary; `InMemoryStore` is the one
//! reference implementation shipped here. Real deployments are expected
//! to plug in a file-sharded directory store, an embedded LSM, or an
//! object store; none of those engines are implemented by this crate.

use common::ClusterError;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub key: String,
    pub value: Option<Vec<u8>>,
    pub size: i64,
}

/// The operation surface every local engine must satisfy. `query` rejects
/// anything beyond prefix/offset/limit/keys_only with `Other` at the
/// server layer (this trait has no room to express additional filters).
pub trait LocalStore: Send + Sync {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), ClusterError>;
    fn get(&self, key: &str) -> Result<Vec<u8>, ClusterError>;
    fn has(&self, key: &str) -> Result<bool, ClusterError>;
    fn get_size(&self, key: &str) -> Result<i64, ClusterError>;
    fn delete(&self, key: &str) -> Result<(), ClusterError>;
    fn query(
        &self,
        prefix: &str,
        offset: i64,
        limit: i64,
        keys_only: bool,
    ) -> Result<Vec<StoreEntry>, ClusterError>;
}

/// Reference `LocalStore`: an ordered in-memory map, guarded by a single
/// `RwLock` so concurrent readers don't block each other while writers
/// are serialized.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

/// Keys are stored datastore-path style, always carrying a leading `/`; a
/// caller handing over a bare name gets it normalized rather than
/// rejected, same convention as e.g. IPFS's `go-datastore` keys.
fn normalize_key(key: &str) -> String {
    if key.is_empty() || key.starts_with('/') {
        key.to_string()
    } else {
        format!("/{key}")
    }
}

impl LocalStore for InMemoryStore {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), ClusterError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ClusterError::new_local_store("lock poisoned", "local_store"))?;
        entries.insert(normalize_key(key), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ClusterError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ClusterError::new_local_store("lock poisoned", "local_store"))?;
        entries
            .get(&normalize_key(key))
            .cloned()
            .ok_or_else(|| ClusterError::new_not_found(key, "local_store"))
    }

    fn has(&self, key: &str) -> Result<bool, ClusterError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ClusterError::new_local_store("lock poisoned", "local_store"))?;
        Ok(entries.contains_key(&normalize_key(key)))
    }

    fn get_size(&self, key: &str) -> Result<i64, ClusterError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ClusterError::new_local_store("lock poisoned", "local_store"))?;
        entries
            .get(&normalize_key(key))
            .map(|v| v.len() as i64)
            .ok_or_else(|| ClusterError::new_not_found(key, "local_store"))
    }

    fn delete(&self, key: &str) -> Result<(), ClusterError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ClusterError::new_local_store("lock poisoned", "local_store"))?;
        entries.remove(&normalize_key(key));
        Ok(())
    }

    fn query(
        &self,
        prefix: &str,
        offset: i64,
        limit: i64,
        keys_only: bool,
    ) -> Result<Vec<StoreEntry>, ClusterError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ClusterError::new_local_store("lock poisoned", "local_store"))?;

        let prefix = normalize_key(prefix);
        let matching = entries
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .skip(offset.max(0) as usize);

        let take_n = if limit < 0 { usize::MAX } else { limit as usize };

        Ok(matching
            .take(take_n)
            .map(|(k, v)| StoreEntry {
                key: k.clone(),
                value: if keys_only { None } else { Some(v.clone()) },
                size: v.len() as i64,
            })
            .collect())
    }
}
