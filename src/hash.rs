//! Poseidon hashing over the BN254 scalar field and the bit helpers used for
//! tree paths and proof bitmaps.

use crate::constant::{ELEM_BYTES_LEN, MAX_HASH_ELEMS};
use crate::types::{ElemBytes, Hash};
use ark_ff::{BigInt, BigInteger, PrimeField, Zero};
use light_poseidon::{Poseidon, PoseidonHasher};
use thiserror::Error;

/// A BN254 scalar field element. All tree hashes and entry slots are
/// big-endian encodings of this type.
pub type Fr = ark_bn254::Fr;

/// Errors of the field codecs and the Poseidon wrappers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// A 32-byte value does not reduce to a field element.
    #[error("value is not a member of the field")]
    OutOfField,
    /// Poseidon arity out of range.
    #[error("poseidon arity must be 1..={MAX_HASH_ELEMS}, got {0}")]
    InvalidInputLen(usize),
    /// Unexpected permutation failure.
    #[error("poseidon failure: {0}")]
    Poseidon(String),
    /// Malformed hex input.
    #[error("invalid hex encoding")]
    InvalidHex,
}

/// Interprets 32 big-endian bytes as a 4-limb integer, without reduction.
pub(crate) fn be_bytes_to_bigint(bytes: &ElemBytes) -> BigInt<4> {
    let mut limbs = [0u64; 4];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let start = ELEM_BYTES_LEN - 8 * (i + 1);
        *limb = u64::from_be_bytes(bytes[start..start + 8].try_into().unwrap());
    }
    BigInt::new(limbs)
}

/// Whether 32 big-endian bytes encode a reduced field element.
pub fn check_in_field(bytes: &ElemBytes) -> bool {
    Fr::from_bigint(be_bytes_to_bigint(bytes)).is_some()
}

impl Hash {
    /// Decodes the hash into a field element, rejecting values `>= Q`.
    pub fn to_fr(&self) -> Result<Fr, HashError> {
        Fr::from_bigint(be_bytes_to_bigint(&self.0)).ok_or(HashError::OutOfField)
    }

    /// Big-endian encoding of a field element.
    pub fn from_fr(f: &Fr) -> Self {
        let bytes = f.into_bigint().to_bytes_be();
        let mut out = [0u8; ELEM_BYTES_LEN];
        out[ELEM_BYTES_LEN - bytes.len()..].copy_from_slice(&bytes);
        Self(out)
    }

    /// Hash of a small integer, used for tree indexes in tests and for the
    /// leaf tag of the node hash.
    pub fn from_u64(v: u64) -> Self {
        Self::from_fr(&Fr::from(v))
    }

    /// Parses a 64-character hex string, rejecting values `>= Q`.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let bytes = hex::decode(s).map_err(|_| HashError::InvalidHex)?;
        let arr: ElemBytes = bytes.try_into().map_err(|_| HashError::InvalidHex)?;
        let h = Self(arr);
        h.to_fr()?;
        Ok(h)
    }
}

/// Poseidon hash of `1..=8` field elements.
pub fn hash_elems(elems: &[Fr]) -> Result<Hash, HashError> {
    if elems.is_empty() || elems.len() > MAX_HASH_ELEMS {
        return Err(HashError::InvalidInputLen(elems.len()));
    }
    let mut poseidon = Poseidon::<Fr>::new_circom(elems.len())
        .map_err(|e| HashError::Poseidon(e.to_string()))?;
    let out = poseidon
        .hash(elems)
        .map_err(|e| HashError::Poseidon(e.to_string()))?;
    Ok(Hash::from_fr(&out))
}

/// Hash of an arbitrary byte string: the input is chunked into 31-byte
/// big-endian pieces (each below the modulus by construction) and folded,
/// `acc = H(acc, chunk)`, seeded with `H(first_chunk)`.
pub fn hash_bytes(msg: &[u8]) -> Hash {
    let mut chunks = msg.chunks(31).map(Fr::from_be_bytes_mod_order);
    let first = chunks.next().unwrap_or_else(Fr::zero);
    // Arities 1 and 2 are always valid, so these hashes cannot fail.
    let mut acc = hash_elems(&[first]).expect("poseidon arity 1");
    for chunk in chunks {
        let prev = acc.to_fr().expect("poseidon output is reduced");
        acc = hash_elems(&[prev, chunk]).expect("poseidon arity 2");
    }
    acc
}

/// Sets bit `i` of `buf`, addressing the `(i % 8)`-th most significant bit of
/// byte `i / 8`. This is the order of proof sibling bitmaps.
#[inline]
pub fn set_bit_be(buf: &mut [u8], i: usize) {
    buf[i / 8] |= 1 << (7 - i % 8);
}

/// Tests bit `i` of `buf` in the same order as [`set_bit_be`].
#[inline]
pub fn test_bit_be(buf: &[u8], i: usize) -> bool {
    buf[i / 8] & (1 << (7 - i % 8)) != 0
}

/// The traversal path of an index: bit `d` selects the child at depth `d`,
/// counting from the least significant bit of the integer the hash encodes.
pub fn path_from_index(h_index: &Hash, levels: usize) -> Vec<bool> {
    (0..levels)
        .map(|d| h_index.0[ELEM_BYTES_LEN - 1 - d / 8] & (1 << (d % 8)) != 0)
        .collect()
}
