//! Free-form claim carrying opaque index and value payloads.

use super::{
    claim_version, copy_to_slot, revocation_nonce, set_claim_type, set_claim_version,
    set_revocation_nonce,
};
use crate::constant::{CLAIM_BASIC_INDEX_LEN, CLAIM_BASIC_VALUE_LEN, CLAIM_TYPE_BASIC};
use crate::types::Entry;

/// A claim binding 62 bytes of caller-defined index data to 93 bytes of
/// caller-defined value data. Payload bytes are spread over 31-byte slot
/// pieces so every slot stays a valid field element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimBasic {
    pub version: u32,
    pub revocation_nonce: u32,
    pub index_data: [u8; CLAIM_BASIC_INDEX_LEN],
    pub value_data: [u8; CLAIM_BASIC_VALUE_LEN],
}

impl ClaimBasic {
    pub fn new(
        index_data: [u8; CLAIM_BASIC_INDEX_LEN],
        value_data: [u8; CLAIM_BASIC_VALUE_LEN],
        revocation_nonce: u32,
    ) -> Self {
        Self {
            version: 0,
            revocation_nonce,
            index_data,
            value_data,
        }
    }

    pub(super) fn from_entry(entry: &Entry) -> Self {
        let mut index_data = [0u8; CLAIM_BASIC_INDEX_LEN];
        index_data[..31].copy_from_slice(&entry.data[1][1..]);
        index_data[31..].copy_from_slice(&entry.data[2][1..]);
        let mut value_data = [0u8; CLAIM_BASIC_VALUE_LEN];
        value_data[..31].copy_from_slice(&entry.data[5][1..]);
        value_data[31..62].copy_from_slice(&entry.data[6][1..]);
        value_data[62..].copy_from_slice(&entry.data[7][1..]);
        Self {
            version: claim_version(entry),
            revocation_nonce: revocation_nonce(entry),
            index_data,
            value_data,
        }
    }

    pub fn entry(&self) -> Entry {
        let mut entry = Entry::default();
        set_claim_type(&mut entry, CLAIM_TYPE_BASIC);
        set_claim_version(&mut entry, self.version);
        set_revocation_nonce(&mut entry, self.revocation_nonce);
        copy_to_slot(&mut entry.data[1], 0, &self.index_data[..31]);
        copy_to_slot(&mut entry.data[2], 0, &self.index_data[31..]);
        copy_to_slot(&mut entry.data[5], 0, &self.value_data[..31]);
        copy_to_slot(&mut entry.data[6], 0, &self.value_data[31..62]);
        copy_to_slot(&mut entry.data[7], 0, &self.value_data[62..]);
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::check_entry_in_field;

    #[test]
    fn test_entry_round_trip() {
        let mut index_data = [0u8; CLAIM_BASIC_INDEX_LEN];
        let mut value_data = [0u8; CLAIM_BASIC_VALUE_LEN];
        for (i, b) in index_data.iter_mut().enumerate() {
            *b = i as u8;
        }
        for (i, b) in value_data.iter_mut().enumerate() {
            *b = 0xff - i as u8;
        }
        let mut claim = ClaimBasic::new(index_data, value_data, 1234);
        claim.version = 9;

        let entry = claim.entry();
        assert!(check_entry_in_field(&entry));
        assert_eq!(ClaimBasic::from_entry(&entry), claim);
        assert_eq!(ClaimBasic::from_entry(&entry).entry(), entry);
    }

    #[test]
    fn test_index_only_affects_h_index() {
        let base = ClaimBasic::new(
            [0; CLAIM_BASIC_INDEX_LEN],
            [0; CLAIM_BASIC_VALUE_LEN],
            1,
        );
        let mut other_value = base;
        other_value.value_data[0] = 1;
        assert_eq!(
            base.entry().h_index().unwrap(),
            other_value.entry().h_index().unwrap()
        );
        assert_ne!(
            base.entry().h_value().unwrap(),
            other_value.entry().h_value().unwrap()
        );

        let mut other_index = base;
        other_index.index_data[61] = 1;
        assert_ne!(
            base.entry().h_index().unwrap(),
            other_index.entry().h_index().unwrap()
        );
    }
}
