//! Transactional key-value storage contract shared by the trees, the issuer
//! and the off-chain publisher.

use thiserror::Error;

/// Error type for storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The key is not present in the store.
    #[error("key not found")]
    NotFound,
    /// The backend failed; the in-flight operation was rolled back.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// An open write batch. Writes are buffered and invisible to other readers
/// until committed; reads observe the batch's own writes first and fall
/// through to committed data.
pub trait KvTx {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError>;
    fn put(&mut self, key: &[u8], value: &[u8]);
}

/// Atomically applies a transaction. Dropping an uncommitted transaction
/// discards it.
pub trait TxCommit {
    fn commit(self) -> Result<(), StorageError>;
}

/// A key-value store with prefix scoping. Handles are cheap to clone; all
/// clones and derived prefixes share the same underlying data. Isolation is
/// read-committed with a single writer and concurrent readers.
pub trait KvStorage: Clone + Send + Sync {
    type Tx: KvTx + TxCommit;

    /// Begins a write batch.
    fn new_tx(&self) -> Result<Self::Tx, StorageError>;

    /// Reads a committed value.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError>;

    /// Lists committed entries under `prefix`, sorted by key. Returned keys
    /// keep the scan prefix but are stripped of the handle's own prefix.
    fn list(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    /// Derives a sub-store whose keys are silently prefixed by `prefix`.
    fn with_prefix(&self, prefix: &[u8]) -> Self;
}

/// View of an open transaction under an additional key prefix, so one commit
/// can span the issuer's bookkeeping and the node writes of its trees.
pub struct PrefixedTx<'t, T> {
    tx: &'t mut T,
    prefix: Vec<u8>,
}

impl<'t, T: KvTx> PrefixedTx<'t, T> {
    pub fn new(tx: &'t mut T, prefix: &[u8]) -> Self {
        Self {
            tx,
            prefix: prefix.to_vec(),
        }
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl<T: KvTx> KvTx for PrefixedTx<'_, T> {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        self.tx.get(&self.full_key(key))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        let full = self.full_key(key);
        self.tx.put(&full, value);
    }
}
