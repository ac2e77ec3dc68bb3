//! EdDSA-Poseidon signing over Baby JubJub and the in-memory reference key
//! store.
//!
//! The issuer treats the key store as a signing oracle behind the
//! [`KeyStore`] trait; [`MemKeyStore`] is the reference implementation used in
//! tests and development. Signatures are 64 bytes, the compressed nonce point
//! followed by the big-endian scalar, and verify against the compressed
//! public key with the cofactorless check `S·B = R8 + c·A` (deserialisation
//! enforces prime-subgroup membership).

use crate::hash::{be_bytes_to_bigint, hash_bytes, hash_elems};
use crate::types::Hash;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::{EdwardsAffine, EdwardsProjective, Fr as BjjScalar};
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::RngCore;
use std::collections::HashMap;
use thiserror::Error;

/// Error type for key-store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// The public key is not present in the store.
    #[error("key not found in the key store")]
    KeyNotFound,
    /// A key or signature failed to decode.
    #[error("malformed key or signature encoding")]
    InvalidEncoding,
    /// The signature does not verify against the key and message.
    #[error("signature verification failed")]
    SignatureInvalid,
    /// The backend failed.
    #[error("key store backend failure: {0}")]
    Backend(String),
}

/// A compressed Baby JubJub public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyComp(pub [u8; 32]);

/// A compact EdDSA signature: compressed `R8` followed by the 32-byte
/// big-endian `S` scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureComp(pub [u8; 64]);

/// A signing oracle holding the issuer's operational keys.
pub trait KeyStore {
    /// Signs `msg` with the secret key behind `pk`.
    fn sign(&self, pk: &PublicKeyComp, msg: &[u8]) -> Result<SignatureComp, KeyStoreError>;
}

/// In-memory reference key store.
#[derive(Debug, Default, Clone)]
pub struct MemKeyStore {
    keys: HashMap<PublicKeyComp, BjjScalar>,
}

impl MemKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh key pair and returns the public key.
    pub fn new_key<R: RngCore>(&mut self, rng: &mut R) -> Result<PublicKeyComp, KeyStoreError> {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        self.import_key(&seed)
    }

    /// Derives a key pair from 32 seed bytes and returns the public key.
    pub fn import_key(&mut self, seed: &[u8; 32]) -> Result<PublicKeyComp, KeyStoreError> {
        let sk = BjjScalar::from_be_bytes_mod_order(seed);
        let pk = compress_point(&(EdwardsAffine::generator() * sk).into_affine())?;
        self.keys.insert(pk, sk);
        Ok(pk)
    }
}

impl KeyStore for MemKeyStore {
    fn sign(&self, pk: &PublicKeyComp, msg: &[u8]) -> Result<SignatureComp, KeyStoreError> {
        let sk = self.keys.get(pk).ok_or(KeyStoreError::KeyNotFound)?;
        eddsa_sign(sk, msg)
    }
}

/// Verifies a signature produced by [`KeyStore::sign`].
pub fn verify_sig(
    pk: &PublicKeyComp,
    msg: &[u8],
    sig: &SignatureComp,
) -> Result<(), KeyStoreError> {
    let a = decompress_point(&pk.0)?;
    let r8 = decompress_point(sig.0[..32].try_into().expect("32-byte slice"))?;
    let s_bytes: [u8; 32] = sig.0[32..].try_into().expect("32-byte slice");
    let s = BjjScalar::from_bigint(be_bytes_to_bigint(&s_bytes))
        .ok_or(KeyStoreError::InvalidEncoding)?;

    let c = challenge(&r8, &a, msg)?;
    let lhs = EdwardsAffine::generator() * s;
    let rhs = EdwardsProjective::from(r8) + a * c;
    if lhs == rhs {
        Ok(())
    } else {
        Err(KeyStoreError::SignatureInvalid)
    }
}

/// The `(sign, ay)` coordinates of a compressed key, as embedded in
/// key-authorization claims. The sign marks which square root the x
/// coordinate is.
pub fn pk_sign_ay(pk: &PublicKeyComp) -> Result<(bool, Hash), KeyStoreError> {
    let point = decompress_point(&pk.0)?;
    let neg_x = -point.x;
    let sign = point.x.into_bigint() > neg_x.into_bigint();
    Ok((sign, Hash::from_fr(&point.y)))
}

fn eddsa_sign(sk: &BjjScalar, msg: &[u8]) -> Result<SignatureComp, KeyStoreError> {
    let sk = *sk;
    let a = (EdwardsAffine::generator() * sk).into_affine();

    // Deterministic nonce bound to the key and the message.
    let mut nonce_input = sk.into_bigint().to_bytes_be();
    nonce_input.extend_from_slice(msg);
    let r = BjjScalar::from_be_bytes_mod_order(&hash_bytes(&nonce_input).0);

    let r8 = (EdwardsAffine::generator() * r).into_affine();
    let c = challenge(&r8, &a, msg)?;
    let s = r + c * sk;

    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&compress_point(&r8)?.0);
    let s_bytes = s.into_bigint().to_bytes_be();
    out[64 - s_bytes.len()..].copy_from_slice(&s_bytes);
    Ok(SignatureComp(out))
}

/// Poseidon challenge `H(R8.x, R8.y, A.x, A.y, H_bytes(msg))`, mapped into
/// the scalar field.
fn challenge(
    r8: &EdwardsAffine,
    a: &EdwardsAffine,
    msg: &[u8],
) -> Result<BjjScalar, KeyStoreError> {
    let m = hash_bytes(msg)
        .to_fr()
        .map_err(|e| KeyStoreError::Backend(e.to_string()))?;
    let h = hash_elems(&[r8.x, r8.y, a.x, a.y, m])
        .map_err(|e| KeyStoreError::Backend(e.to_string()))?;
    Ok(BjjScalar::from_be_bytes_mod_order(&h.0))
}

fn compress_point(point: &EdwardsAffine) -> Result<PublicKeyComp, KeyStoreError> {
    let mut bytes = Vec::with_capacity(32);
    point
        .serialize_compressed(&mut bytes)
        .map_err(|_| KeyStoreError::InvalidEncoding)?;
    Ok(PublicKeyComp(
        bytes
            .try_into()
            .map_err(|_| KeyStoreError::InvalidEncoding)?,
    ))
}

fn decompress_point(bytes: &[u8; 32]) -> Result<EdwardsAffine, KeyStoreError> {
    EdwardsAffine::deserialize_compressed(&bytes[..])
        .map_err(|_| KeyStoreError::InvalidEncoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_sign_and_verify() {
        let mut ks = MemKeyStore::new();
        let pk = ks.new_key(&mut SmallRng::seed_from_u64(1)).unwrap();
        let sig = ks.sign(&pk, b"hello").unwrap();
        assert!(verify_sig(&pk, b"hello", &sig).is_ok());

        // Signing is deterministic.
        assert_eq!(sig, ks.sign(&pk, b"hello").unwrap());
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let mut ks = MemKeyStore::new();
        let mut rng = SmallRng::seed_from_u64(2);
        let pk = ks.new_key(&mut rng).unwrap();
        let other = ks.new_key(&mut rng).unwrap();
        let sig = ks.sign(&pk, b"hello").unwrap();

        assert_eq!(
            verify_sig(&pk, b"goodbye", &sig),
            Err(KeyStoreError::SignatureInvalid)
        );
        assert_eq!(
            verify_sig(&other, b"hello", &sig),
            Err(KeyStoreError::SignatureInvalid)
        );

        let mut bad = sig;
        bad.0[40] ^= 0x01;
        assert!(verify_sig(&pk, b"hello", &bad).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let ks = MemKeyStore::new();
        assert_eq!(
            ks.sign(&PublicKeyComp([0u8; 32]), b"x"),
            Err(KeyStoreError::KeyNotFound)
        );
    }

    #[test]
    fn test_sign_ay_round_trip() {
        let mut ks = MemKeyStore::new();
        let pk = ks.new_key(&mut SmallRng::seed_from_u64(3)).unwrap();
        let (sign, ay) = pk_sign_ay(&pk).unwrap();
        // The y coordinate is a reduced base-field element.
        assert!(ay.to_fr().is_ok());
        let _ = sign;
    }
}
