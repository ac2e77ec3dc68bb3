//! Append-only log of every identity state the issuer has reached.
//!
//! Entry `i` lives under `idenstatelist/<u32 be>` and stores the state, the
//! three tree roots it commits to, and the registry transaction handle once
//! the state has been submitted. An explicit big-endian length key keeps
//! index lookups single point reads.

use super::IssuerError;
use crate::constant::{ELEM_BYTES_LEN, PREFIX_STATE_LIST};
use crate::registry::TxHandle;
use crate::traits::{KvStorage, KvTx, StorageError};
use crate::types::Hash;

const KEY_LEN_SUFFIX: &[u8] = b"len";
const ROOTS_BYTES: usize = 4 * ELEM_BYTES_LEN;

/// One logged state and the roots it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLogEntry {
    pub state: Hash,
    pub claims_root: Hash,
    pub revocations_root: Hash,
    pub roots_root: Hash,
    /// Registry submission handle; absent for the genesis entry and for a
    /// staged state whose submission has not succeeded yet.
    pub tx: Option<TxHandle>,
}

impl StateLogEntry {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ROOTS_BYTES);
        for h in [
            &self.state,
            &self.claims_root,
            &self.revocations_root,
            &self.roots_root,
        ] {
            out.extend_from_slice(&h.0);
        }
        if let Some(tx) = &self.tx {
            out.extend_from_slice(&tx.0);
        }
        out
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ROOTS_BYTES {
            return None;
        }
        let hash_at = |i: usize| Hash::from_slice(&bytes[i * ELEM_BYTES_LEN..(i + 1) * ELEM_BYTES_LEN]);
        let tx_bytes = &bytes[ROOTS_BYTES..];
        Some(Self {
            state: hash_at(0)?,
            claims_root: hash_at(1)?,
            revocations_root: hash_at(2)?,
            roots_root: hash_at(3)?,
            tx: (!tx_bytes.is_empty()).then(|| TxHandle(tx_bytes.to_vec())),
        })
    }
}

/// The log handle. Writes participate in the caller's transaction so a state
/// append commits atomically with the rest of a transition.
#[derive(Debug)]
pub(super) struct IdenStateList<S: KvStorage> {
    storage: S,
}

impl<S: KvStorage> IdenStateList<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn length(&self) -> Result<u32, IssuerError> {
        match self.storage.get(&len_key()) {
            Ok(bytes) => decode_len(&bytes),
            Err(StorageError::NotFound) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, idx: u32) -> Result<StateLogEntry, IssuerError> {
        let bytes = self.storage.get(&entry_key(idx))?;
        StateLogEntry::decode(&bytes)
            .ok_or_else(|| IssuerError::CorruptState(format!("undecodable state log entry {idx}")))
    }

    /// Appends an entry inside an open transaction and returns its index.
    pub fn append_in<T: KvTx>(
        &self,
        tx: &mut T,
        entry: &StateLogEntry,
    ) -> Result<u32, IssuerError> {
        let len = match tx.get(&len_key()) {
            Ok(bytes) => decode_len(&bytes)?,
            Err(StorageError::NotFound) => 0,
            Err(e) => return Err(e.into()),
        };
        tx.put(&entry_key(len), &entry.encode());
        tx.put(&len_key(), &(len + 1).to_be_bytes());
        Ok(len)
    }

    /// Rewrites an existing entry, used to attach the registry transaction
    /// handle after submission.
    pub fn put_in<T: KvTx>(&self, tx: &mut T, idx: u32, entry: &StateLogEntry) {
        tx.put(&entry_key(idx), &entry.encode());
    }
}

fn entry_key(idx: u32) -> Vec<u8> {
    let mut key = PREFIX_STATE_LIST.to_vec();
    key.extend_from_slice(&idx.to_be_bytes());
    key
}

fn len_key() -> Vec<u8> {
    let mut key = PREFIX_STATE_LIST.to_vec();
    key.extend_from_slice(KEY_LEN_SUFFIX);
    key
}

fn decode_len(bytes: &[u8]) -> Result<u32, IssuerError> {
    Ok(u32::from_be_bytes(bytes.try_into().map_err(|_| {
        IssuerError::CorruptState("undecodable state log length".to_string())
    })?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_store::MemStore;
    use crate::traits::TxCommit;

    fn entry(i: u64, tx: Option<TxHandle>) -> StateLogEntry {
        StateLogEntry {
            state: Hash::from_u64(i),
            claims_root: Hash::from_u64(i + 1),
            revocations_root: Hash::from_u64(i + 2),
            roots_root: Hash::from_u64(i + 3),
            tx,
        }
    }

    #[test]
    fn test_append_and_get() {
        let store = MemStore::new();
        let log = IdenStateList::new(store.clone());
        assert_eq!(log.length().unwrap(), 0);

        let mut tx = store.new_tx().unwrap();
        assert_eq!(log.append_in(&mut tx, &entry(1, None)).unwrap(), 0);
        // Read-your-writes keeps indexes strictly increasing within one
        // transaction.
        assert_eq!(
            log.append_in(&mut tx, &entry(2, Some(TxHandle(vec![9]))))
                .unwrap(),
            1
        );
        tx.commit().unwrap();

        assert_eq!(log.length().unwrap(), 2);
        assert_eq!(log.get(0).unwrap(), entry(1, None));
        assert_eq!(log.get(1).unwrap(), entry(2, Some(TxHandle(vec![9]))));
        assert!(log.get(2).is_err());
    }

    #[test]
    fn test_put_in_attaches_tx_handle() {
        let store = MemStore::new();
        let log = IdenStateList::new(store.clone());

        let mut tx = store.new_tx().unwrap();
        log.append_in(&mut tx, &entry(1, None)).unwrap();
        tx.commit().unwrap();

        let mut updated = log.get(0).unwrap();
        updated.tx = Some(TxHandle(b"tx".to_vec()));
        let mut tx = store.new_tx().unwrap();
        log.put_in(&mut tx, 0, &updated);
        tx.commit().unwrap();

        assert_eq!(log.get(0).unwrap().tx, Some(TxHandle(b"tx".to_vec())));
        assert_eq!(log.length().unwrap(), 1);
    }
}
