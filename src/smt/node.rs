//! Tree node model and its content-addressed on-disk codec.

use super::SmtError;
use crate::constant::{
    ELEM_BYTES_LEN, NODE_PAYLOAD_LEN, NODE_TAG_EMPTY, NODE_TAG_LEAF, NODE_TAG_MIDDLE,
};
use crate::hash::{hash_elems, Fr, HashError};
use crate::types::{Hash, HASH_ZERO};
use ark_ff::One;

/// A tree node. Empty nodes are never materialised in storage; they are
/// referenced by the zero hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Empty,
    /// A terminal entry: `hash = H(h_index, h_value, 1)`.
    Leaf { h_index: Hash, h_value: Hash },
    /// An interior node: `hash = H(left, right)`.
    Middle { left: Hash, right: Hash },
}

impl Node {
    /// The content address of the node, equal to its hash.
    pub fn key(&self) -> Result<Hash, HashError> {
        match self {
            Node::Empty => Ok(HASH_ZERO),
            Node::Leaf { h_index, h_value } => leaf_key(h_index, h_value),
            Node::Middle { left, right } => middle_key(left, right),
        }
    }

    /// One-byte tag followed by the 64-byte payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Node::Empty => vec![NODE_TAG_EMPTY],
            Node::Leaf { h_index, h_value } => encode(NODE_TAG_LEAF, h_index, h_value),
            Node::Middle { left, right } => encode(NODE_TAG_MIDDLE, left, right),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SmtError> {
        let (&tag, payload) = bytes.split_first().ok_or(SmtError::InvalidNode)?;
        if tag == NODE_TAG_EMPTY {
            return if payload.is_empty() {
                Ok(Node::Empty)
            } else {
                Err(SmtError::InvalidNode)
            };
        }
        if payload.len() != NODE_PAYLOAD_LEN {
            return Err(SmtError::InvalidNode);
        }
        let a = Hash::from_slice(&payload[..ELEM_BYTES_LEN]).ok_or(SmtError::InvalidNode)?;
        let b = Hash::from_slice(&payload[ELEM_BYTES_LEN..]).ok_or(SmtError::InvalidNode)?;
        match tag {
            NODE_TAG_LEAF => Ok(Node::Leaf {
                h_index: a,
                h_value: b,
            }),
            NODE_TAG_MIDDLE => Ok(Node::Middle { left: a, right: b }),
            _ => Err(SmtError::InvalidNode),
        }
    }
}

fn encode(tag: u8, a: &Hash, b: &Hash) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + NODE_PAYLOAD_LEN);
    out.push(tag);
    out.extend_from_slice(&a.0);
    out.extend_from_slice(&b.0);
    out
}

/// `H(h_index, h_value, 1)`. The trailing one domain-separates leaves from
/// interior nodes.
pub(crate) fn leaf_key(h_index: &Hash, h_value: &Hash) -> Result<Hash, HashError> {
    hash_elems(&[h_index.to_fr()?, h_value.to_fr()?, Fr::one()])
}

/// `H(left, right)`.
pub(crate) fn middle_key(left: &Hash, right: &Hash) -> Result<Hash, HashError> {
    hash_elems(&[left.to_fr()?, right.to_fr()?])
}
