//! Claim authorizing a Baby JubJub operational key.

use super::{
    claim_version, revocation_nonce, set_claim_type, set_claim_version, set_revocation_nonce,
};
use crate::constant::{CLAIM_TYPE_AUTHORIZE_KSIGN_BABYJUB, ELEM_BYTES_LEN};
use crate::types::{Entry, Hash};

/// Authorizes the key with compressed coordinates `(sign, ay)` to operate on
/// behalf of the issuer. The key is part of the claim index, so each
/// authorized key occupies its own position in the claims tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimAuthorizeKSignBabyJub {
    pub version: u32,
    pub revocation_nonce: u32,
    /// Whether the key's x coordinate is the "negative" root.
    pub sign: bool,
    /// Big-endian y coordinate of the public key, a base-field element.
    pub ay: Hash,
}

impl ClaimAuthorizeKSignBabyJub {
    pub fn new(sign: bool, ay: Hash, revocation_nonce: u32) -> Self {
        Self {
            version: 0,
            revocation_nonce,
            sign,
            ay,
        }
    }

    pub(super) fn from_entry(entry: &Entry) -> Self {
        Self {
            version: claim_version(entry),
            revocation_nonce: revocation_nonce(entry),
            sign: entry.data[1][ELEM_BYTES_LEN - 1] != 0,
            ay: Hash(entry.data[2]),
        }
    }

    pub fn entry(&self) -> Entry {
        let mut entry = Entry::default();
        set_claim_type(&mut entry, CLAIM_TYPE_AUTHORIZE_KSIGN_BABYJUB);
        set_claim_version(&mut entry, self.version);
        set_revocation_nonce(&mut entry, self.revocation_nonce);
        entry.data[1][ELEM_BYTES_LEN - 1] = self.sign as u8;
        entry.data[2] = self.ay.0;
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{check_entry_in_field, Claim};
    use crate::keystore::MemKeyStore;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_entry_round_trip() {
        let mut ks = MemKeyStore::new();
        let pk = ks.new_key(&mut SmallRng::seed_from_u64(7)).unwrap();
        let (sign, ay) = crate::keystore::pk_sign_ay(&pk).unwrap();

        let mut claim = ClaimAuthorizeKSignBabyJub::new(sign, ay, 5678);
        claim.version = 1;
        let entry = claim.entry();
        assert!(check_entry_in_field(&entry));
        assert_eq!(ClaimAuthorizeKSignBabyJub::from_entry(&entry), claim);
        assert_eq!(
            Claim::from_entry(&entry).unwrap(),
            Claim::AuthorizeKSignBabyJub(claim)
        );
    }

    #[test]
    fn test_key_is_part_of_index() {
        let a = ClaimAuthorizeKSignBabyJub::new(false, Hash::from_u64(10), 0);
        let b = ClaimAuthorizeKSignBabyJub::new(true, Hash::from_u64(10), 0);
        let c = ClaimAuthorizeKSignBabyJub::new(false, Hash::from_u64(11), 0);
        let ha = a.entry().h_index().unwrap();
        assert_ne!(ha, b.entry().h_index().unwrap());
        assert_ne!(ha, c.entry().h_index().unwrap());
        // The nonce lives on the value side.
        let d = ClaimAuthorizeKSignBabyJub::new(false, Hash::from_u64(10), 3);
        assert_eq!(ha, d.entry().h_index().unwrap());
    }
}
