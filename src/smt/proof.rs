//! Inclusion/exclusion proofs and their bit-packed wire format.

use super::node::{leaf_key, middle_key};
use super::SmtError;
use crate::constant::ELEM_BYTES_LEN;
use crate::hash::{path_from_index, set_bit_be, test_bit_be};
use crate::types::{Hash, HASH_ZERO};

/// Header flag: the proof denies membership.
const FLAG_EXCLUSION: u8 = 1 << 0;
/// Header flag: exclusion because the path ends in an empty subtree (as
/// opposed to another occupant leaf).
const FLAG_EXCLUSION_BY_EMPTY: u8 = 1 << 1;
/// Header flag: the auxiliary occupant leaf follows the siblings.
const FLAG_AUX_LEAF: u8 = 1 << 2;

/// A sibling path proving that a leaf does or does not belong to a tree at a
/// given root.
///
/// The sibling column holds one hash per traversed level, top-down, with the
/// zero hash standing in for empty siblings. Exclusion proofs optionally carry
/// the `(h_index, h_value)` pair of the leaf actually occupying the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    existence: bool,
    siblings: Vec<Hash>,
    aux_node: Option<(Hash, Hash)>,
}

impl Proof {
    pub(crate) fn new_inclusion(siblings: Vec<Hash>) -> Self {
        Self {
            existence: true,
            siblings,
            aux_node: None,
        }
    }

    pub(crate) fn new_exclusion(siblings: Vec<Hash>, aux_node: Option<(Hash, Hash)>) -> Self {
        Self {
            existence: false,
            siblings,
            aux_node,
        }
    }

    /// Whether this proof asserts membership.
    #[inline]
    pub fn existence(&self) -> bool {
        self.existence
    }

    /// The traversed sibling column, empties included as zero hashes.
    #[inline]
    pub fn siblings(&self) -> &[Hash] {
        &self.siblings
    }

    /// The occupant leaf of an exclusion-by-other-leaf proof.
    #[inline]
    pub fn aux_node(&self) -> Option<&(Hash, Hash)> {
        self.aux_node.as_ref()
    }

    /// Serialises the proof: a header byte, the traversal depth, a
    /// `max_levels`-bit big-endian bitmap flagging non-empty siblings, the
    /// non-empty sibling hashes top-down and, for exclusion by another leaf,
    /// the occupant `(h_index, h_value)` pair.
    pub fn to_bytes(&self, max_levels: usize) -> Result<Vec<u8>, SmtError> {
        if self.siblings.len() > max_levels || self.siblings.len() > u8::MAX as usize {
            return Err(SmtError::InvalidProof);
        }
        let mut header = 0u8;
        if !self.existence {
            header |= FLAG_EXCLUSION;
            if self.aux_node.is_none() {
                header |= FLAG_EXCLUSION_BY_EMPTY;
            } else {
                header |= FLAG_AUX_LEAF;
            }
        }
        let mut bitmap = vec![0u8; max_levels.div_ceil(8)];
        for (i, sib) in self.siblings.iter().enumerate() {
            if !sib.is_zero() {
                set_bit_be(&mut bitmap, i);
            }
        }
        let mut out = vec![header, self.siblings.len() as u8];
        out.extend_from_slice(&bitmap);
        for sib in self.siblings.iter().filter(|s| !s.is_zero()) {
            out.extend_from_slice(&sib.0);
        }
        if let Some((hi, hv)) = &self.aux_node {
            out.extend_from_slice(&hi.0);
            out.extend_from_slice(&hv.0);
        }
        Ok(out)
    }

    /// Parses a proof serialised with [`to_bytes`](Self::to_bytes) for a tree
    /// of the given depth.
    pub fn from_bytes(bytes: &[u8], max_levels: usize) -> Result<Self, SmtError> {
        let bitmap_len = max_levels.div_ceil(8);
        if bytes.len() < 2 + bitmap_len {
            return Err(SmtError::InvalidProof);
        }
        let header = bytes[0];
        let depth = bytes[1] as usize;
        if depth > max_levels {
            return Err(SmtError::InvalidProof);
        }
        let bitmap = &bytes[2..2 + bitmap_len];
        // Bits at or beyond the recorded depth must be clear.
        for i in depth..max_levels {
            if test_bit_be(bitmap, i) {
                return Err(SmtError::InvalidProof);
            }
        }

        let existence = header & FLAG_EXCLUSION == 0;
        let has_aux = header & FLAG_AUX_LEAF != 0;
        if existence && has_aux {
            return Err(SmtError::InvalidProof);
        }
        if !existence && (header & FLAG_EXCLUSION_BY_EMPTY != 0) == has_aux {
            return Err(SmtError::InvalidProof);
        }

        let mut rest = &bytes[2 + bitmap_len..];
        let mut siblings = Vec::with_capacity(depth);
        for i in 0..depth {
            if test_bit_be(bitmap, i) {
                if rest.len() < ELEM_BYTES_LEN {
                    return Err(SmtError::InvalidProof);
                }
                let sib = Hash::from_slice(&rest[..ELEM_BYTES_LEN]).ok_or(SmtError::InvalidProof)?;
                if sib.is_zero() {
                    return Err(SmtError::InvalidProof);
                }
                siblings.push(sib);
                rest = &rest[ELEM_BYTES_LEN..];
            } else {
                siblings.push(HASH_ZERO);
            }
        }
        let aux_node = if has_aux {
            if rest.len() < 2 * ELEM_BYTES_LEN {
                return Err(SmtError::InvalidProof);
            }
            let hi = Hash::from_slice(&rest[..ELEM_BYTES_LEN]).ok_or(SmtError::InvalidProof)?;
            let hv =
                Hash::from_slice(&rest[ELEM_BYTES_LEN..2 * ELEM_BYTES_LEN]).ok_or(SmtError::InvalidProof)?;
            rest = &rest[2 * ELEM_BYTES_LEN..];
            Some((hi, hv))
        } else {
            None
        };
        if !rest.is_empty() {
            return Err(SmtError::InvalidProof);
        }
        Ok(Self {
            existence,
            siblings,
            aux_node,
        })
    }
}

/// Verifies a proof against a root. Inclusion proofs rebuild the leaf from
/// `(h_index, h_value)`; exclusion proofs start from the occupant leaf (which
/// must share the traversed path prefix while differing in index) or from the
/// empty hash, then fold the sibling column bottom-up into the root.
pub fn verify_proof(root: &Hash, proof: &Proof, h_index: &Hash, h_value: &Hash) -> bool {
    let depth = proof.siblings.len();
    let path = path_from_index(h_index, depth.max(1));
    let mut mid = if proof.existence {
        match leaf_key(h_index, h_value) {
            Ok(k) => k,
            Err(_) => return false,
        }
    } else if let Some((aux_hi, aux_hv)) = &proof.aux_node {
        if aux_hi == h_index {
            return false;
        }
        // The occupant must sit on the queried path.
        let aux_path = path_from_index(aux_hi, depth.max(1));
        if aux_path[..depth] != path[..depth] {
            return false;
        }
        match leaf_key(aux_hi, aux_hv) {
            Ok(k) => k,
            Err(_) => return false,
        }
    } else {
        HASH_ZERO
    };

    for lvl in (0..depth).rev() {
        let sib = &proof.siblings[lvl];
        let combined = if path[lvl] {
            middle_key(sib, &mid)
        } else {
            middle_key(&mid, sib)
        };
        mid = match combined {
            Ok(k) => k,
            Err(_) => return false,
        };
    }
    mid == *root
}
