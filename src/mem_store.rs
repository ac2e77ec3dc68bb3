//! In-memory reference backend for the storage contract.
//!
//! [`MemStore`] is not part of the identity logic; it is a storage backend
//! implementing [`KvStorage`] over a [`BTreeMap`], intended for tests,
//! development and as a reference for database-backed implementations. All
//! access is thread-safe through a [`RwLock`]; prefix handles share the same
//! underlying map.

use crate::traits::{KvStorage, KvTx, StorageError, TxCommit};
use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

/// In-memory storage backend with prefix scoping.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    kvs: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    prefix: Vec<u8>,
}

impl MemStore {
    /// Creates a new empty store rooted at the empty prefix.
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl KvStorage for MemStore {
    type Tx = MemTx;

    fn new_tx(&self) -> Result<MemTx, StorageError> {
        Ok(MemTx {
            store: self.clone(),
            writes: BTreeMap::new(),
        })
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        self.kvs
            .read()
            .expect("store lock poisoned")
            .get(&self.full_key(key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn list(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let full = self.full_key(prefix);
        let kvs = self.kvs.read().expect("store lock poisoned");
        Ok(kvs
            .range(full.clone()..)
            .take_while(|(k, _)| k.starts_with(&full))
            .map(|(k, v)| (k[self.prefix.len()..].to_vec(), v.clone()))
            .collect())
    }

    fn with_prefix(&self, prefix: &[u8]) -> Self {
        Self {
            kvs: Arc::clone(&self.kvs),
            prefix: self.full_key(prefix),
        }
    }
}

/// A buffered write batch against a [`MemStore`]. Keys are resolved through
/// the originating handle's prefix.
pub struct MemTx {
    store: MemStore,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvTx for MemTx {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        let full = self.store.full_key(key);
        if let Some(v) = self.writes.get(&full) {
            return Ok(v.clone());
        }
        self.store.get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(self.store.full_key(key), value.to_vec());
    }
}

impl TxCommit for MemTx {
    fn commit(self) -> Result<(), StorageError> {
        let mut kvs = self.store.kvs.write().expect("store lock poisoned");
        kvs.extend(self.writes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_isolation_and_read_your_writes() {
        let store = MemStore::new();
        let mut tx = store.new_tx().unwrap();
        tx.put(b"k", b"v");

        // Buffered writes are visible to the transaction but not the store.
        assert_eq!(tx.get(b"k").unwrap(), b"v");
        assert_eq!(store.get(b"k"), Err(StorageError::NotFound));

        tx.commit().unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"v");
    }

    #[test]
    fn test_dropped_tx_discards_writes() {
        let store = MemStore::new();
        let mut tx = store.new_tx().unwrap();
        tx.put(b"k", b"v");
        drop(tx);
        assert_eq!(store.get(b"k"), Err(StorageError::NotFound));
    }

    #[test]
    fn test_prefix_scoping() {
        let store = MemStore::new();
        let a = store.with_prefix(b"a/");
        let b = store.with_prefix(b"b/");

        let mut tx = a.new_tx().unwrap();
        tx.put(b"k", b"va");
        tx.commit().unwrap();

        assert_eq!(a.get(b"k").unwrap(), b"va");
        assert_eq!(b.get(b"k"), Err(StorageError::NotFound));
        // The parent handle sees the fully-qualified key.
        assert_eq!(store.get(b"a/k").unwrap(), b"va");

        // Nested prefixes compose.
        let ab = a.with_prefix(b"b/");
        let mut tx = ab.new_tx().unwrap();
        tx.put(b"k", b"vab");
        tx.commit().unwrap();
        assert_eq!(store.get(b"a/b/k").unwrap(), b"vab");
    }

    #[test]
    fn test_list_strips_handle_prefix() {
        let store = MemStore::new();
        let scoped = store.with_prefix(b"s/");
        let mut tx = scoped.new_tx().unwrap();
        tx.put(b"list/0", b"a");
        tx.put(b"list/1", b"b");
        tx.put(b"other", b"c");
        tx.commit().unwrap();

        let entries = scoped.list(b"list/").unwrap();
        assert_eq!(
            entries,
            vec![
                (b"list/0".to_vec(), b"a".to_vec()),
                (b"list/1".to_vec(), b"b".to_vec()),
            ]
        );
        assert!(store.list(b"s/list/").unwrap().len() == 2);
    }
}
