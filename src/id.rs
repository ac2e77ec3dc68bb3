//! Issuer identifier derived from the genesis identity state.

use crate::constant::{
    ID_CHECKSUM_LEN, ID_GENESIS_LEN, ID_LEN, ID_TYPE_BJ_P0, ID_TYPE_LEN,
};
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for identifier decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("identifier must be {ID_LEN} bytes")]
    InvalidLength,
    #[error("identifier checksum mismatch")]
    InvalidChecksum,
}

/// A stable 31-byte issuer identifier: a two-byte type, a 27-byte cut of the
/// genesis identity state and a two-byte checksum. It never changes over the
/// issuer's lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id(pub [u8; ID_LEN]);

impl Id {
    /// Derives the identifier from the genesis identity state: the one-way
    /// function binding an issuer to its initial key-and-revocation
    /// commitment.
    pub fn from_genesis_state(genesis_state: &Hash) -> Self {
        let mut bytes = [0u8; ID_LEN];
        bytes[..ID_TYPE_LEN].copy_from_slice(&ID_TYPE_BJ_P0);
        bytes[ID_TYPE_LEN..ID_TYPE_LEN + ID_GENESIS_LEN]
            .copy_from_slice(&genesis_state.0[genesis_state.0.len() - ID_GENESIS_LEN..]);
        let checksum = checksum(&bytes[..ID_TYPE_LEN + ID_GENESIS_LEN]);
        bytes[ID_LEN - ID_CHECKSUM_LEN..].copy_from_slice(&checksum);
        Self(bytes)
    }

    /// Parses and validates an identifier.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        let arr: [u8; ID_LEN] = bytes.try_into().map_err(|_| IdError::InvalidLength)?;
        let expected = checksum(&arr[..ID_LEN - ID_CHECKSUM_LEN]);
        if arr[ID_LEN - ID_CHECKSUM_LEN..] != expected {
            return Err(IdError::InvalidChecksum);
        }
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }
}

/// Big-endian wrapping byte sum over the type and genesis parts.
fn checksum(bytes: &[u8]) -> [u8; ID_CHECKSUM_LEN] {
    let sum = bytes
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(*b as u16));
    sum.to_be_bytes()
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", hex::encode(self.0))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
