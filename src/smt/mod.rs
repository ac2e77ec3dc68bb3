//! Sparse Merkle tree over the BN254 scalar field.
//!
//! A tree of depth up to [`MAX_LEVELS_CAP`](crate::constant::MAX_LEVELS_CAP)
//! whose interior nodes are Poseidon hashes and whose nodes live
//! content-addressed in a [`KvStorage`](crate::traits::KvStorage). Old nodes
//! are never deleted, so any historical root remains fully resolvable and
//! read-only [`Snapshot`]s can serve proofs against past states.

use crate::hash::HashError;
use crate::traits::StorageError;
use thiserror::Error;

mod node;
mod proof;
mod tree;

pub use node::Node;
pub use proof::{verify_proof, Proof};
pub use tree::{MerkleTree, Snapshot};

/// Error type for tree operations.
#[derive(Debug, Error)]
pub enum SmtError {
    /// A leaf with the same index hash is already present.
    #[error("entry index already exists in the tree")]
    EntryIndexAlreadyExists,
    /// Traversal hit the maximum depth without terminating.
    #[error("reached maximum tree level")]
    ReachedMaxLevel,
    /// Traversal ended at an empty node.
    #[error("key not found in the tree")]
    NotFound,
    /// The requested depth exceeds the supported maximum.
    #[error("unsupported max levels: {0}")]
    InvalidMaxLevels(usize),
    /// A stored node or root pointer failed to decode.
    #[error("invalid node encoding")]
    InvalidNode,
    /// A serialised proof failed to decode.
    #[error("invalid proof encoding")]
    InvalidProof,
    /// A dumped tree failed to re-import.
    #[error("tree import failed: {0}")]
    BadImport(String),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
