//! Off-chain publisher: a ring-buffer cache of serialised tree snapshots per
//! published identity state.
//!
//! Each published state occupies one slot holding the state, the three roots
//! it commits to and the serialised roots and revocations trees, so that
//! verifiers can obtain existence and non-revocation proofs against a
//! historical state. The cursor advance commits in the same transaction as
//! the slot records, so a crash can never leak a half-written slot.

use crate::constant::{
    KEY_CACHE_IDX, KEY_CONFIG, KEY_PUB_CLAIMS_ROOT, KEY_PUB_IDEN_STATE,
    KEY_PUB_REVOCATIONS_ROOT, KEY_PUB_REVOCATIONS_TREE, KEY_PUB_ROOTS_ROOT, KEY_PUB_ROOTS_TREE,
};
use crate::smt::{MerkleTree, SmtError};
use crate::traits::{KvStorage, KvTx, StorageError, TxCommit};
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

/// Error type for publisher operations.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// No cached slot holds the queried identity state.
    #[error("identity state not found in the cache")]
    IdenStateNotFound,
    /// The cache length must be non-zero.
    #[error("cache length must be non-zero")]
    BadCacheLen,
    /// Persisted publisher data failed to decode.
    #[error("publisher storage is corrupted: {0}")]
    CorruptState(String),
    #[error(transparent)]
    Smt(#[from] SmtError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Publisher configuration, persisted as the JSON `config` blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Number of ring slots; storage is bounded by `cache_len` times two tree
    /// dumps.
    pub cache_len: u8,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { cache_len: 1 }
    }
}

/// The public data of one published state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicData {
    pub iden_state: Hash,
    pub claims_tree_root: Hash,
    pub roots_tree_root: Hash,
    /// Serialised roots tree, as produced by `dump_tree`.
    pub roots_tree: Vec<u8>,
    pub revocations_tree_root: Hash,
    /// Serialised revocations tree.
    pub revocations_tree: Vec<u8>,
}

/// Ring-buffer snapshot cache over its own prefix-scoped storage. `publish`
/// takes the write lock for the serialisation and the commit; readers share
/// the read lock.
#[derive(Debug)]
pub struct Publisher<S: KvStorage> {
    storage: S,
    cfg: PublisherConfig,
    rw: RwLock<()>,
}

impl<S: KvStorage> Publisher<S> {
    /// Creates a fresh publisher: persists the configuration and the zero
    /// cursor.
    pub fn new(cfg: PublisherConfig, storage: S) -> Result<Self, PublisherError> {
        if cfg.cache_len == 0 {
            return Err(PublisherError::BadCacheLen);
        }
        let cfg_blob =
            serde_json::to_vec(&cfg).map_err(|e| PublisherError::CorruptState(e.to_string()))?;
        let mut tx = storage.new_tx()?;
        tx.put(KEY_CONFIG, &cfg_blob);
        tx.put(KEY_CACHE_IDX, &[0u8]);
        tx.commit()?;
        Ok(Self {
            storage,
            cfg,
            rw: RwLock::new(()),
        })
    }

    /// Re-opens a persisted publisher.
    pub fn load(storage: S) -> Result<Self, PublisherError> {
        let cfg: PublisherConfig = serde_json::from_slice(&storage.get(KEY_CONFIG)?)
            .map_err(|e| PublisherError::CorruptState(format!("undecodable config: {e}")))?;
        if cfg.cache_len == 0 {
            return Err(PublisherError::BadCacheLen);
        }
        Ok(Self {
            storage,
            cfg,
            rw: RwLock::new(()),
        })
    }

    pub fn config(&self) -> PublisherConfig {
        self.cfg
    }

    /// Serialises the roots and revocations trees at the given roots and
    /// writes the slot atomically, advancing the cursor in the same
    /// transaction.
    pub fn publish<T: KvStorage>(
        &self,
        iden_state: &Hash,
        claims_root: &Hash,
        revocations_root: &Hash,
        roots_root: &Hash,
        roots_tree: &MerkleTree<T>,
        revocations_tree: &MerkleTree<T>,
    ) -> Result<(), PublisherError> {
        let _guard = self.rw.write().expect("publisher lock poisoned");

        let mut roots_blob = Vec::new();
        roots_tree.dump_tree(&mut roots_blob, Some(roots_root))?;
        let mut revocations_blob = Vec::new();
        revocations_tree.dump_tree(&mut revocations_blob, Some(revocations_root))?;

        let mut tx = self.storage.new_tx()?;
        let idx = self.cache_idx(&tx)?;
        tx.put(&slot_key(KEY_PUB_IDEN_STATE, idx), &iden_state.0);
        tx.put(&slot_key(KEY_PUB_CLAIMS_ROOT, idx), &claims_root.0);
        tx.put(&slot_key(KEY_PUB_ROOTS_ROOT, idx), &roots_root.0);
        tx.put(&slot_key(KEY_PUB_ROOTS_TREE, idx), &roots_blob);
        tx.put(
            &slot_key(KEY_PUB_REVOCATIONS_ROOT, idx),
            &revocations_root.0,
        );
        tx.put(&slot_key(KEY_PUB_REVOCATIONS_TREE, idx), &revocations_blob);
        tx.put(KEY_CACHE_IDX, &[self.next_idx(idx)]);
        tx.commit()?;
        debug!(state = %iden_state, slot = idx, "published off-chain state");
        Ok(())
    }

    /// The public data of `query_state`, or of the most recently published
    /// state when `None`.
    pub fn get_public_data(
        &self,
        query_state: Option<&Hash>,
    ) -> Result<PublicData, PublisherError> {
        let _guard = self.rw.read().expect("publisher lock poisoned");

        let idx = match query_state {
            None => {
                let cursor = self.cache_idx_committed()?;
                self.prev_idx(cursor)
            }
            Some(state) => self.find_slot(state)?,
        };

        let read_hash = |base: &[u8]| -> Result<Hash, PublisherError> {
            Hash::from_slice(&self.storage.get(&slot_key(base, idx))?)
                .ok_or_else(|| PublisherError::CorruptState("undecodable cached root".to_string()))
        };
        Ok(PublicData {
            iden_state: read_hash(KEY_PUB_IDEN_STATE)?,
            claims_tree_root: read_hash(KEY_PUB_CLAIMS_ROOT)?,
            roots_tree_root: read_hash(KEY_PUB_ROOTS_ROOT)?,
            roots_tree: self.storage.get(&slot_key(KEY_PUB_ROOTS_TREE, idx))?,
            revocations_tree_root: read_hash(KEY_PUB_REVOCATIONS_ROOT)?,
            revocations_tree: self
                .storage
                .get(&slot_key(KEY_PUB_REVOCATIONS_TREE, idx))?,
        })
    }

    fn find_slot(&self, state: &Hash) -> Result<u8, PublisherError> {
        for idx in 0..self.cfg.cache_len {
            match self.storage.get(&slot_key(KEY_PUB_IDEN_STATE, idx)) {
                Ok(bytes) if bytes == state.0 => return Ok(idx),
                Ok(_) => continue,
                Err(StorageError::NotFound) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(PublisherError::IdenStateNotFound)
    }

    fn cache_idx<T: KvTx>(&self, tx: &T) -> Result<u8, PublisherError> {
        decode_idx(&tx.get(KEY_CACHE_IDX)?)
    }

    fn cache_idx_committed(&self) -> Result<u8, PublisherError> {
        decode_idx(&self.storage.get(KEY_CACHE_IDX)?)
    }

    /// `(idx + 1) mod cache_len`.
    fn next_idx(&self, idx: u8) -> u8 {
        ((idx as u16 + 1) % self.cfg.cache_len as u16) as u8
    }

    /// `(idx - 1) mod cache_len`, wrap-around made explicit instead of
    /// leaning on unsigned underflow.
    fn prev_idx(&self, idx: u8) -> u8 {
        ((idx as u16 + self.cfg.cache_len as u16 - 1) % self.cfg.cache_len as u16) as u8
    }
}

fn slot_key(base: &[u8], idx: u8) -> Vec<u8> {
    let mut key = base.to_vec();
    key.push(idx);
    key
}

fn decode_idx(bytes: &[u8]) -> Result<u8, PublisherError> {
    match bytes {
        [idx] => Ok(*idx),
        _ => Err(PublisherError::CorruptState(
            "undecodable cache cursor".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;
    use crate::mem_store::MemStore;
    use crate::smt::verify_proof;

    fn tree_with_digits(seed: &str) -> MerkleTree<MemStore> {
        let mut mt = MerkleTree::new(MemStore::new(), 140).unwrap();
        for d in 0..10u8 {
            let leaf = hash_bytes(format!("{seed}{d}").as_bytes());
            mt.add(&leaf, &leaf).unwrap();
        }
        mt
    }

    /// Publish two ten-leaf trees and read the slot back.
    #[test]
    fn test_publish_round_trip() {
        let rot = tree_with_digits("");
        let ret = tree_with_digits("");
        let publisher =
            Publisher::new(PublisherConfig { cache_len: 1 }, MemStore::new()).unwrap();

        let state = hash_bytes(b"idenState0");
        let claims_root = hash_bytes(b"claimsRoot0");
        publisher
            .publish(
                &state,
                &claims_root,
                &ret.root_key(),
                &rot.root_key(),
                &rot,
                &ret,
            )
            .unwrap();

        let data = publisher.get_public_data(None).unwrap();
        assert_eq!(data.iden_state, state);
        assert_eq!(data.claims_tree_root, claims_root);
        assert_eq!(data.roots_tree_root, rot.root_key());
        assert_eq!(data.revocations_tree_root, ret.root_key());

        // Blobs re-import to the published roots and keep proving.
        let mut imported = MerkleTree::new(MemStore::new(), 140).unwrap();
        let root = imported
            .import_tree(&mut data.roots_tree.as_slice())
            .unwrap();
        assert_eq!(root, rot.root_key());
        let leaf = hash_bytes(b"3");
        let proof = imported.generate_proof(&leaf).unwrap();
        assert!(proof.existence());
        assert!(verify_proof(&root, &proof, &leaf, &leaf));

        // Querying by state hits the same slot; unknown states miss.
        assert_eq!(publisher.get_public_data(Some(&state)).unwrap(), data);
        assert!(matches!(
            publisher.get_public_data(Some(&hash_bytes(b"nope"))),
            Err(PublisherError::IdenStateNotFound)
        ));
    }

    /// After more publishes than slots, the ring holds the most recent
    /// states.
    #[test]
    fn test_ring_wraps() {
        let rot = tree_with_digits("r");
        let ret = tree_with_digits("v");
        let publisher =
            Publisher::new(PublisherConfig { cache_len: 3 }, MemStore::new()).unwrap();

        let states: Vec<Hash> = (0..5u8)
            .map(|i| hash_bytes(format!("idenState{i}").as_bytes()))
            .collect();
        for state in &states {
            publisher
                .publish(
                    state,
                    &hash_bytes(b"claimsRoot"),
                    &ret.root_key(),
                    &rot.root_key(),
                    &rot,
                    &ret,
                )
                .unwrap();
        }

        // The latest slot answers the default query.
        assert_eq!(
            publisher.get_public_data(None).unwrap().iden_state,
            states[4]
        );
        // The three most recent states are cached, the two oldest evicted.
        for state in &states[2..] {
            assert_eq!(
                publisher.get_public_data(Some(state)).unwrap().iden_state,
                *state
            );
        }
        for state in &states[..2] {
            assert!(matches!(
                publisher.get_public_data(Some(state)),
                Err(PublisherError::IdenStateNotFound)
            ));
        }
    }

    #[test]
    fn test_load_round_trip() {
        let store = MemStore::new();
        let publisher =
            Publisher::new(PublisherConfig { cache_len: 2 }, store.clone()).unwrap();
        drop(publisher);
        let reloaded = Publisher::load(store).unwrap();
        assert_eq!(reloaded.config().cache_len, 2);

        assert!(matches!(
            Publisher::new(PublisherConfig { cache_len: 0 }, MemStore::new()),
            Err(PublisherError::BadCacheLen)
        ));
    }

    #[test]
    fn test_empty_cache_has_no_data() {
        let publisher = Publisher::new(PublisherConfig::default(), MemStore::new()).unwrap();
        assert!(publisher.get_public_data(None).is_err());
    }
}
