//! Off-chain core of a self-sovereign identity issuer.
//!
//! An issuer maintains three Poseidon-hashed sparse Merkle trees — issued
//! claims, revoked claim nonces and the history of claims-tree roots — whose
//! roots commit to a single identity state. New states are staged in an
//! append-only log, served off-chain through a snapshot cache and anchored in
//! an external on-chain registry, so that verifiers can check existence and
//! non-revocation proofs against any published state.

pub mod constant;
pub mod hash;
pub mod types;
pub use types::{ElemBytes, Entry, Hash, HASH_ZERO};

pub mod traits;
pub use traits::{KvStorage, KvTx, PrefixedTx, StorageError, TxCommit};
pub mod mem_store;
pub use mem_store::MemStore;

pub mod smt;
pub use smt::{verify_proof, MerkleTree, Proof, SmtError};

pub mod claims;
pub use claims::{Claim, ClaimBasic};

pub mod id;
pub use id::Id;
pub mod keystore;
pub mod registry;

pub mod issuer;
pub use issuer::{Config, CredentialExistence, Issuer, IssuerError};
pub mod publisher;
pub use publisher::{PublicData, Publisher, PublisherConfig};
