//! Typed claims encoded into fixed eight-slot tree entries.
//!
//! Every claim type reserves the low bytes of the first index slot for a
//! 64-bit type tag and a 32-bit version, and the low bytes of the first value
//! slot for the revocation nonce. Keeping the nonce on the value side means a
//! claim's position in the claims tree never depends on its revocation state.

use crate::constant::{
    CLAIM_TYPE_AUTHORIZE_KSIGN_BABYJUB, CLAIM_TYPE_BASIC, ELEM_BYTES_LEN,
};
use crate::hash::check_in_field;
use crate::types::{ElemBytes, Entry};
use thiserror::Error;

mod authorize_ksign;
mod basic;

pub use authorize_ksign::ClaimAuthorizeKSignBabyJub;
pub use basic::ClaimBasic;

/// Error type for the claim codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimError {
    /// An entry slot does not encode a reduced field element.
    #[error("entry element exceeds the field modulus")]
    EntryNotInField,
}

/// Whether all eight slots of an entry are reduced field elements.
pub fn check_entry_in_field(entry: &Entry) -> bool {
    entry.data.iter().all(check_in_field)
}

/// A typed interpretation of an [`Entry`], discriminated by the 64-bit type
/// tag. Unknown tags are accepted as an opaque claim retaining the raw entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    Basic(ClaimBasic),
    AuthorizeKSignBabyJub(ClaimAuthorizeKSignBabyJub),
    Opaque(Entry),
}

impl Claim {
    /// Decodes an entry into its claim variant. The codec is total and
    /// symmetric: `Claim::from_entry(c.entry())` reproduces `c` and
    /// `claim.entry()` is byte-identical to the input entry.
    pub fn from_entry(entry: &Entry) -> Result<Self, ClaimError> {
        if !check_entry_in_field(entry) {
            return Err(ClaimError::EntryNotInField);
        }
        Ok(match claim_type(entry) {
            CLAIM_TYPE_BASIC => Claim::Basic(ClaimBasic::from_entry(entry)),
            CLAIM_TYPE_AUTHORIZE_KSIGN_BABYJUB => {
                Claim::AuthorizeKSignBabyJub(ClaimAuthorizeKSignBabyJub::from_entry(entry))
            }
            _ => Claim::Opaque(*entry),
        })
    }

    /// Encodes the claim back into its entry form.
    pub fn entry(&self) -> Entry {
        match self {
            Claim::Basic(c) => c.entry(),
            Claim::AuthorizeKSignBabyJub(c) => c.entry(),
            Claim::Opaque(e) => *e,
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            Claim::Basic(c) => c.version,
            Claim::AuthorizeKSignBabyJub(c) => c.version,
            Claim::Opaque(e) => claim_version(e),
        }
    }

    pub fn revocation_nonce(&self) -> u32 {
        match self {
            Claim::Basic(c) => c.revocation_nonce,
            Claim::AuthorizeKSignBabyJub(c) => c.revocation_nonce,
            Claim::Opaque(e) => revocation_nonce(e),
        }
    }

    /// Rewrites the claim's version, moving it to a new index position in the
    /// claims tree.
    pub fn set_version(&mut self, version: u32) {
        match self {
            Claim::Basic(c) => c.version = version,
            Claim::AuthorizeKSignBabyJub(c) => c.version = version,
            Claim::Opaque(e) => set_claim_version(e, version),
        }
    }
}

/// Builds the revocations-tree entry marking `(nonce, version)` revoked: the
/// nonce in the first index slot, the version in the second, values zero.
pub fn new_revocation_leaf(nonce: u32, version: u32) -> Entry {
    let mut entry = Entry::default();
    entry.data[0][ELEM_BYTES_LEN - 4..].copy_from_slice(&nonce.to_be_bytes());
    entry.data[1][ELEM_BYTES_LEN - 4..].copy_from_slice(&version.to_be_bytes());
    entry
}

/// The 64-bit claim type, big-endian in the low bytes of `i_0`.
pub fn claim_type(entry: &Entry) -> u64 {
    u64::from_be_bytes(entry.data[0][ELEM_BYTES_LEN - 8..].try_into().unwrap())
}

/// The 32-bit claim version, big-endian in `i_0` just above the type tag.
pub fn claim_version(entry: &Entry) -> u32 {
    u32::from_be_bytes(
        entry.data[0][ELEM_BYTES_LEN - 12..ELEM_BYTES_LEN - 8]
            .try_into()
            .unwrap(),
    )
}

/// The 32-bit revocation nonce, big-endian in the low bytes of `v_0`.
pub fn revocation_nonce(entry: &Entry) -> u32 {
    u32::from_be_bytes(entry.data[4][ELEM_BYTES_LEN - 4..].try_into().unwrap())
}

pub(crate) fn set_claim_type(entry: &mut Entry, claim_type: u64) {
    entry.data[0][ELEM_BYTES_LEN - 8..].copy_from_slice(&claim_type.to_be_bytes());
}

pub(crate) fn set_claim_version(entry: &mut Entry, version: u32) {
    entry.data[0][ELEM_BYTES_LEN - 12..ELEM_BYTES_LEN - 8]
        .copy_from_slice(&version.to_be_bytes());
}

pub(crate) fn set_revocation_nonce(entry: &mut Entry, nonce: u32) {
    entry.data[4][ELEM_BYTES_LEN - 4..].copy_from_slice(&nonce.to_be_bytes());
}

/// Convenience slice assignment keeping the top byte of a slot zero.
pub(crate) fn copy_to_slot(slot: &mut ElemBytes, offset: usize, bytes: &[u8]) {
    debug_assert!(1 + offset + bytes.len() <= ELEM_BYTES_LEN);
    slot[1 + offset..1 + offset + bytes.len()].copy_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::{CLAIM_BASIC_INDEX_LEN, CLAIM_BASIC_VALUE_LEN};

    #[test]
    fn test_header_layout() {
        let mut entry = Entry::default();
        set_claim_type(&mut entry, 0x1122334455667788);
        set_claim_version(&mut entry, 7);
        set_revocation_nonce(&mut entry, 5678);
        assert_eq!(claim_type(&entry), 0x1122334455667788);
        assert_eq!(claim_version(&entry), 7);
        assert_eq!(revocation_nonce(&entry), 5678);
        // Header fields stay inside their slots.
        assert_eq!(entry.data[1], [0u8; ELEM_BYTES_LEN]);
        assert_eq!(entry.data[5], [0u8; ELEM_BYTES_LEN]);
    }

    #[test]
    fn test_dispatcher_round_trip() {
        let basic = Claim::Basic(ClaimBasic::new(
            [0x11; CLAIM_BASIC_INDEX_LEN],
            [0x22; CLAIM_BASIC_VALUE_LEN],
            42,
        ));
        let entry = basic.entry();
        assert_eq!(Claim::from_entry(&entry).unwrap(), basic);
        assert_eq!(Claim::from_entry(&entry).unwrap().entry(), entry);
    }

    #[test]
    fn test_unknown_type_is_opaque() {
        let mut entry = Entry::default();
        set_claim_type(&mut entry, 0xfefe);
        set_claim_version(&mut entry, 3);
        set_revocation_nonce(&mut entry, 9);
        let claim = Claim::from_entry(&entry).unwrap();
        assert!(matches!(claim, Claim::Opaque(_)));
        assert_eq!(claim.version(), 3);
        assert_eq!(claim.revocation_nonce(), 9);
        // Opaque claims round-trip byte-for-byte.
        assert_eq!(claim.entry(), entry);
    }

    #[test]
    fn test_out_of_field_entry_rejected() {
        let mut entry = Entry::default();
        entry.data[3] = [0xff; ELEM_BYTES_LEN];
        assert!(!check_entry_in_field(&entry));
        assert_eq!(Claim::from_entry(&entry), Err(ClaimError::EntryNotInField));
    }

    #[test]
    fn test_revocation_leaf_layout() {
        let entry = new_revocation_leaf(0xa1b2c3d4, 2);
        assert_eq!(
            entry.data[0][ELEM_BYTES_LEN - 4..],
            0xa1b2c3d4u32.to_be_bytes()
        );
        assert_eq!(entry.data[1][ELEM_BYTES_LEN - 4..], 2u32.to_be_bytes());
        assert!(entry.value().iter().all(|v| *v == [0u8; ELEM_BYTES_LEN]));
        // Different versions of the same nonce occupy different indexes.
        assert_ne!(
            entry.h_index().unwrap(),
            new_revocation_leaf(0xa1b2c3d4, 3).h_index().unwrap()
        );
    }

    #[test]
    fn test_set_version_moves_index() {
        let mut claim = Claim::Basic(ClaimBasic::new(
            [1; CLAIM_BASIC_INDEX_LEN],
            [2; CLAIM_BASIC_VALUE_LEN],
            1,
        ));
        let hi0 = claim.entry().h_index().unwrap();
        let hv0 = claim.entry().h_value().unwrap();
        claim.set_version(5);
        assert_eq!(claim.version(), 5);
        assert_ne!(claim.entry().h_index().unwrap(), hi0);
        // The value side, nonce included, is untouched.
        assert_eq!(claim.entry().h_value().unwrap(), hv0);
    }
}
