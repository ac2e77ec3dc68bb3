//! Core wire types shared by the trees, the claims codec and the issuer.

use crate::constant::{DATA_LEN, ELEM_BYTES_LEN, ENTRY_BYTES_LEN, INDEX_SLOTS};
use crate::hash::{hash_elems, HashError};
use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A serialised field element: 32 bytes, big-endian. Equality is bytewise and
/// the all-zero value is the sentinel for "empty".
#[derive(
    Clone,
    Copy,
    Default,
    Deref,
    DerefMut,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct Hash(pub [u8; ELEM_BYTES_LEN]);

/// The zero hash, referencing the empty tree node.
pub const HASH_ZERO: Hash = Hash([0u8; ELEM_BYTES_LEN]);

impl Hash {
    /// Whether this is the empty sentinel.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ELEM_BYTES_LEN]
    }

    /// Parses a hash from exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        Some(Self(bytes.try_into().ok()?))
    }

    /// Lowercase hex encoding of the big-endian bytes.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl From<[u8; ELEM_BYTES_LEN]> for Hash {
    #[inline]
    fn from(bytes: [u8; ELEM_BYTES_LEN]) -> Self {
        Self(bytes)
    }
}

/// One 32-byte entry slot, big-endian.
pub type ElemBytes = [u8; ELEM_BYTES_LEN];

/// A fixed tree entry of eight field-element slots: index slots `i_0..i_3`
/// followed by value slots `v_0..v_3`. The index hash identifies the entry in
/// a tree, the value hash binds its payload.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Entry {
    pub data: [ElemBytes; DATA_LEN],
}

impl Entry {
    pub fn new(data: [ElemBytes; DATA_LEN]) -> Self {
        Self { data }
    }

    /// The four index slots.
    #[inline]
    pub fn index(&self) -> &[ElemBytes] {
        &self.data[..INDEX_SLOTS]
    }

    /// The four value slots.
    #[inline]
    pub fn value(&self) -> &[ElemBytes] {
        &self.data[INDEX_SLOTS..]
    }

    /// Poseidon hash of the index slots. Identifies the entry in a tree.
    pub fn h_index(&self) -> Result<Hash, HashError> {
        hash_elems_of(&self.data[..INDEX_SLOTS])
    }

    /// Poseidon hash of the value slots.
    pub fn h_value(&self) -> Result<Hash, HashError> {
        hash_elems_of(&self.data[INDEX_SLOTS..])
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_BYTES_LEN] {
        let mut out = [0u8; ENTRY_BYTES_LEN];
        for (i, slot) in self.data.iter().enumerate() {
            out[i * ELEM_BYTES_LEN..(i + 1) * ELEM_BYTES_LEN].copy_from_slice(slot);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ENTRY_BYTES_LEN {
            return None;
        }
        let mut data = [[0u8; ELEM_BYTES_LEN]; DATA_LEN];
        for (i, slot) in data.iter_mut().enumerate() {
            slot.copy_from_slice(&bytes[i * ELEM_BYTES_LEN..(i + 1) * ELEM_BYTES_LEN]);
        }
        Some(Self { data })
    }
}

fn hash_elems_of(slots: &[ElemBytes]) -> Result<Hash, HashError> {
    let elems = slots
        .iter()
        .map(|s| Hash(*s).to_fr())
        .collect::<Result<Vec<_>, _>>()?;
    hash_elems(&elems)
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_list();
        for slot in &self.data {
            dbg.entry(&hex::encode(slot));
        }
        dbg.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::check_in_field;

    #[test]
    fn test_entry_bytes_round_trip() {
        let mut data = [[0u8; ELEM_BYTES_LEN]; DATA_LEN];
        for (i, slot) in data.iter_mut().enumerate() {
            slot[ELEM_BYTES_LEN - 1] = i as u8 + 1;
        }
        let entry = Entry::new(data);
        let bytes = entry.to_bytes();
        assert_eq!(Entry::from_bytes(&bytes), Some(entry));
        assert_eq!(Entry::from_bytes(&bytes[1..]), None);
    }

    #[test]
    fn test_entry_index_value_split() {
        let mut data = [[0u8; ELEM_BYTES_LEN]; DATA_LEN];
        data[0][ELEM_BYTES_LEN - 1] = 0xaa;
        data[4][ELEM_BYTES_LEN - 1] = 0xbb;
        let entry = Entry::new(data);
        assert_eq!(entry.index().len(), 4);
        assert_eq!(entry.value().len(), 4);
        assert_eq!(entry.index()[0][ELEM_BYTES_LEN - 1], 0xaa);
        assert_eq!(entry.value()[0][ELEM_BYTES_LEN - 1], 0xbb);
        // Index and value hashes only depend on their own slots.
        let mut other = data;
        other[5][0] = 0x01;
        let entry2 = Entry::new(other);
        assert!(check_in_field(&other[5]));
        assert_eq!(entry.h_index().unwrap(), entry2.h_index().unwrap());
        assert_ne!(entry.h_value().unwrap(), entry2.h_value().unwrap());
    }
}
