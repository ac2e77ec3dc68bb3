//! The issuer state machine.
//!
//! An issuer owns three sparse Merkle trees sharing one storage: the claims
//! tree (issued claims), the revocations tree (revoked `(nonce, version)`
//! pairs) and the roots tree (history of claims-tree roots). Their roots hash
//! into a single identity state; every transition is staged locally in an
//! append-only state log, published off-chain through the snapshot cache and
//! submitted to the external registry, whose confirmation moves the on-chain
//! pointer forward.
//!
//! Mutating operations take `&mut self` and read-only operations `&self`, so
//! the exclusive/shared locking the state machine requires is enforced by the
//! borrow system; callers sharing an issuer across threads wrap it in an
//! `RwLock`.

use crate::claims::{
    check_entry_in_field, claim_version, new_revocation_leaf, revocation_nonce, Claim, ClaimError,
};
use crate::constant::{
    KEY_CONFIG, KEY_ID, KEY_KOP, KEY_STATE_ON_CHAIN, KEY_STATE_ON_CHAIN_DATA, KEY_STATE_PENDING,
    DEFAULT_MAX_LEVELS, PREFIX_CLAIMS_TREE, PREFIX_CLAIM_STATE, PREFIX_OFFCHAIN,
    PREFIX_REVOCATIONS_TREE, PREFIX_ROOTS_TREE, SIG_PREFIX_SET_STATE,
};
use crate::hash::{hash_elems, HashError};
use crate::id::Id;
use crate::keystore::{KeyStore, KeyStoreError, PublicKeyComp, SignatureComp};
use crate::publisher::{Publisher, PublisherConfig, PublisherError};
use crate::registry::{IdenStateData, RegistryError, StateRegistry};
use crate::smt::{MerkleTree, Proof, SmtError};
use crate::traits::{KvStorage, KvTx, PrefixedTx, StorageError, TxCommit};
use crate::types::{Entry, Hash, HASH_ZERO};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

mod state_log;

use state_log::{IdenStateList, StateLogEntry};

/// Error type for issuer operations.
#[derive(Debug, Error)]
pub enum IssuerError {
    /// The storage already holds an issuer.
    #[error("storage already holds an issuer")]
    AlreadyExists,
    /// A claim with the same index is already in the claims tree.
    #[error("claim already exists in the claims tree")]
    ClaimAlreadyExists,
    /// The claim was never issued by this issuer.
    #[error("claim not found")]
    ClaimNotFound,
    /// No identity state has been confirmed on chain yet, so no credential
    /// can be proven.
    #[error("identity state is not on chain yet")]
    IdenStateOnChainZero,
    /// The claim was issued after the last on-chain state; publish and sync
    /// before proving it.
    #[error("claim is not included in the on-chain state")]
    ClaimNotFoundStateOnChain,
    /// The registry reports a state that is neither the pending nor the
    /// confirmed one.
    #[error("on-chain state matches neither the pending nor the confirmed state")]
    UnexpectedOnChainState,
    /// No registry collaborator was configured.
    #[error("registry is not configured")]
    NoRegistry,
    /// Persisted issuer data failed to decode.
    #[error("issuer storage is corrupted: {0}")]
    CorruptState(String),
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Smt(#[from] SmtError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error(transparent)]
    Publisher(#[from] PublisherError),
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Issuer configuration, persisted as the JSON `config` blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub max_levels_claims: usize,
    pub max_levels_revocations: usize,
    pub max_levels_roots: usize,
    /// Slots of the off-chain snapshot cache.
    pub offchain_cache_len: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_levels_claims: DEFAULT_MAX_LEVELS,
            max_levels_revocations: DEFAULT_MAX_LEVELS,
            max_levels_roots: DEFAULT_MAX_LEVELS,
            offchain_cache_len: 1,
        }
    }
}

/// A proven credential: the claim, its inclusion proof in the claims tree and
/// its non-revocation proof in the revocations tree, both against the roots
/// committed by the confirmed on-chain state.
#[derive(Debug, Clone)]
pub struct CredentialExistence {
    pub id: Id,
    pub iden_state_data: IdenStateData,
    pub claim: Claim,
    pub proof_claim: Proof,
    /// Exclusion proof of the claim's `(nonce, version)` pair, unless the
    /// claim was already revoked at the proven state.
    pub proof_not_revoked: Proof,
    pub claims_tree_root: Hash,
    pub revocations_tree_root: Hash,
    pub roots_tree_root: Hash,
}

/// `H(claims_root, revocations_root, roots_root)`.
pub fn iden_state_from_roots(
    claims_root: &Hash,
    revocations_root: &Hash,
    roots_root: &Hash,
) -> Result<Hash, HashError> {
    hash_elems(&[
        claims_root.to_fr()?,
        revocations_root.to_fr()?,
        roots_root.to_fr()?,
    ])
}

/// The issuer state machine over one storage, a signing oracle and an
/// optional registry.
#[derive(Debug)]
pub struct Issuer<S: KvStorage, K, R> {
    cfg: Config,
    id: Id,
    kop: PublicKeyComp,
    storage: S,
    keystore: K,
    registry: Option<R>,
    claims_tree: MerkleTree<S>,
    revocations_tree: MerkleTree<S>,
    roots_tree: MerkleTree<S>,
    publisher: Publisher<S>,
    state_log: IdenStateList<S>,
    iden_state_on_chain: Hash,
    iden_state_pending: Hash,
}

impl<S, K, R> Issuer<S, K, R>
where
    S: KvStorage,
    K: KeyStore,
    R: StateRegistry,
{
    /// Creates a fresh issuer: builds the three trees, inserts the initial
    /// claims at state index zero, derives the identifier from the genesis
    /// state `H(claims_root, 0, 0)` and seeds the state log with it.
    pub fn new(
        cfg: Config,
        kop: PublicKeyComp,
        initial_claims: &[Claim],
        storage: S,
        keystore: K,
        registry: Option<R>,
    ) -> Result<Self, IssuerError> {
        if storage.get(KEY_ID).is_ok() {
            return Err(IssuerError::AlreadyExists);
        }
        let claims_tree =
            MerkleTree::new(storage.with_prefix(PREFIX_CLAIMS_TREE), cfg.max_levels_claims)?;
        let revocations_tree = MerkleTree::new(
            storage.with_prefix(PREFIX_REVOCATIONS_TREE),
            cfg.max_levels_revocations,
        )?;
        let roots_tree =
            MerkleTree::new(storage.with_prefix(PREFIX_ROOTS_TREE), cfg.max_levels_roots)?;
        let publisher = Publisher::new(
            PublisherConfig {
                cache_len: cfg.offchain_cache_len,
            },
            storage.with_prefix(PREFIX_OFFCHAIN),
        )?;
        let state_log = IdenStateList::new(storage.clone());

        let mut issuer = Self {
            cfg,
            id: Id::from_genesis_state(&HASH_ZERO),
            kop,
            storage,
            keystore,
            registry,
            claims_tree,
            revocations_tree,
            roots_tree,
            publisher,
            state_log,
            iden_state_on_chain: HASH_ZERO,
            iden_state_pending: HASH_ZERO,
        };

        // Claims present at genesis belong to state index zero.
        for claim in initial_claims {
            issuer.insert_claim(claim, 0)?;
        }

        let genesis_state = issuer.state()?;
        issuer.id = Id::from_genesis_state(&genesis_state);

        let cfg_blob = serde_json::to_vec(&issuer.cfg)
            .map_err(|e| IssuerError::CorruptState(e.to_string()))?;
        let mut tx = issuer.storage.new_tx()?;
        tx.put(KEY_CONFIG, &cfg_blob);
        tx.put(KEY_ID, issuer.id.as_bytes());
        tx.put(KEY_KOP, &issuer.kop.0);
        tx.put(KEY_STATE_ON_CHAIN, &HASH_ZERO.0);
        tx.put(KEY_STATE_PENDING, &HASH_ZERO.0);
        issuer.state_log.append_in(
            &mut tx,
            &StateLogEntry {
                state: genesis_state,
                claims_root: issuer.claims_tree.root_key(),
                revocations_root: issuer.revocations_tree.root_key(),
                roots_root: issuer.roots_tree.root_key(),
                tx: None,
            },
        )?;
        tx.commit()?;

        info!(id = %issuer.id, state = %genesis_state, "created issuer");
        Ok(issuer)
    }

    /// Re-opens a persisted issuer.
    pub fn load(storage: S, keystore: K, registry: Option<R>) -> Result<Self, IssuerError> {
        let cfg: Config = serde_json::from_slice(&storage.get(KEY_CONFIG)?)
            .map_err(|e| IssuerError::CorruptState(format!("undecodable config: {e}")))?;
        let id = Id::from_bytes(&storage.get(KEY_ID)?)
            .map_err(|e| IssuerError::CorruptState(format!("undecodable identifier: {e}")))?;
        let kop = PublicKeyComp(storage.get(KEY_KOP)?.try_into().map_err(|_| {
            IssuerError::CorruptState("undecodable operational key".to_string())
        })?);

        let claims_tree =
            MerkleTree::new(storage.with_prefix(PREFIX_CLAIMS_TREE), cfg.max_levels_claims)?;
        let revocations_tree = MerkleTree::new(
            storage.with_prefix(PREFIX_REVOCATIONS_TREE),
            cfg.max_levels_revocations,
        )?;
        let roots_tree =
            MerkleTree::new(storage.with_prefix(PREFIX_ROOTS_TREE), cfg.max_levels_roots)?;
        let publisher = Publisher::load(storage.with_prefix(PREFIX_OFFCHAIN))?;
        let state_log = IdenStateList::new(storage.clone());

        let read_pointer = |key: &[u8]| -> Result<Hash, IssuerError> {
            Hash::from_slice(&storage.get(key)?)
                .ok_or_else(|| IssuerError::CorruptState("undecodable state pointer".to_string()))
        };
        let iden_state_on_chain = read_pointer(KEY_STATE_ON_CHAIN)?;
        let iden_state_pending = read_pointer(KEY_STATE_PENDING)?;

        Ok(Self {
            cfg,
            id,
            kop,
            storage,
            keystore,
            registry,
            claims_tree,
            revocations_tree,
            roots_tree,
            publisher,
            state_log,
            iden_state_on_chain,
            iden_state_pending,
        })
    }

    /// The issuer identifier, stable over its whole lifetime.
    pub fn id(&self) -> Id {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The current identity state, recomputed from the three tree roots.
    pub fn state(&self) -> Result<Hash, IssuerError> {
        Ok(iden_state_from_roots(
            &self.claims_tree.root_key(),
            &self.revocations_tree.root_key(),
            &self.roots_tree.root_key(),
        )?)
    }

    /// The latest state confirmed by the registry; zero before the first
    /// successful sync.
    pub fn iden_state_on_chain(&self) -> Hash {
        self.iden_state_on_chain
    }

    /// The latest state submitted but not yet confirmed; zero when nothing is
    /// in flight.
    pub fn iden_state_pending(&self) -> Hash {
        self.iden_state_pending
    }

    pub fn claims_tree_root(&self) -> Hash {
        self.claims_tree.root_key()
    }

    pub fn revocations_tree_root(&self) -> Hash {
        self.revocations_tree.root_key()
    }

    pub fn roots_tree_root(&self) -> Hash {
        self.roots_tree.root_key()
    }

    /// The off-chain snapshot cache serving public data per published state.
    pub fn publisher(&self) -> &Publisher<S> {
        &self.publisher
    }

    /// The configured registry collaborator, if any.
    pub fn registry(&self) -> Option<&R> {
        self.registry.as_ref()
    }

    /// Adds a claim to the claims tree. The claim becomes provable once the
    /// next published state is confirmed on chain.
    pub fn issue_claim(&mut self, claim: &Claim) -> Result<(), IssuerError> {
        let next_state_idx = self.state_log.length()?;
        self.insert_claim(claim, next_state_idx)?;
        debug!(state_idx = next_state_idx, "issued claim");
        Ok(())
    }

    /// Revokes the claim stored under `h_index` by inserting its
    /// `(nonce, version)` pair into the revocations tree.
    pub fn revoke_claim(&mut self, h_index: &Hash) -> Result<(), IssuerError> {
        let (_, entry) = self.stored_claim(h_index)?;
        let leaf = new_revocation_leaf(revocation_nonce(&entry), claim_version(&entry));

        let mut tx = self.storage.new_tx()?;
        let new_root = {
            let mut scoped = PrefixedTx::new(&mut tx, PREFIX_REVOCATIONS_TREE);
            self.revocations_tree
                .add_raw(&mut scoped, &leaf.h_index()?, &leaf.h_value()?)?
        };
        tx.commit()?;
        self.revocations_tree.set_root(new_root);
        info!(h_index = %h_index, "revoked claim");
        Ok(())
    }

    /// Re-issues the claim stored under `h_index` with a new version and
    /// revokes the superseded one, atomically. Returns the superseding claim.
    pub fn update_claim(
        &mut self,
        h_index: &Hash,
        new_version: u32,
    ) -> Result<Claim, IssuerError> {
        let (_, entry) = self.stored_claim(h_index)?;
        let claim = Claim::from_entry(&entry)?;
        let revocation_leaf = new_revocation_leaf(claim.revocation_nonce(), claim.version());
        let mut superseding = claim.clone();
        superseding.set_version(new_version);
        let new_entry = superseding.entry();
        let new_hi = new_entry.h_index()?;

        let next_state_idx = self.state_log.length()?;
        let mut tx = self.storage.new_tx()?;
        let rev_root = {
            let mut scoped = PrefixedTx::new(&mut tx, PREFIX_REVOCATIONS_TREE);
            self.revocations_tree.add_raw(
                &mut scoped,
                &revocation_leaf.h_index()?,
                &revocation_leaf.h_value()?,
            )?
        };
        let claims_root = {
            let mut scoped = PrefixedTx::new(&mut tx, PREFIX_CLAIMS_TREE);
            self.claims_tree
                .add_raw(&mut scoped, &new_hi, &new_entry.h_value()?)
                .map_err(claim_add_error)?
        };
        tx.put(
            &claim_state_key(&new_hi),
            &claim_state_record(next_state_idx, &new_entry),
        );
        tx.commit()?;
        self.revocations_tree.set_root(rev_root);
        self.claims_tree.set_root(claims_root);
        info!(h_index = %h_index, new_version, "updated claim");
        Ok(superseding)
    }

    /// Stages the current state and submits it to the registry: appends the
    /// claims root to the roots tree, appends the recomputed state to the
    /// state log, publishes both auxiliary trees off-chain keyed by the new
    /// state, signs `setState ‖ old_state ‖ new_state` and calls the registry.
    /// A no-op when nothing changed; resumes the registry submission when a
    /// staged state has no transaction handle yet.
    pub fn publish_state(&mut self) -> Result<(), IssuerError> {
        let current = self.state()?;
        let len = self.state_log.length()?;
        if len == 0 {
            return Err(IssuerError::CorruptState("empty state log".to_string()));
        }
        let last = self.state_log.get(len - 1)?;

        if current == last.state {
            // The genesis entry never carries a transaction handle; anything
            // later without one is an interrupted submission to resume.
            if last.tx.is_some() || len == 1 {
                debug!(state = %current, "no state change to publish");
                return Ok(());
            }
            // An interruption between the log commit and the cache commit
            // leaves the staged state unpublished off-chain.
            if matches!(
                self.publisher.get_public_data(Some(&last.state)),
                Err(PublisherError::IdenStateNotFound)
            ) {
                self.publisher.publish(
                    &last.state,
                    &last.claims_root,
                    &last.revocations_root,
                    &last.roots_root,
                    &self.roots_tree,
                    &self.revocations_tree,
                )?;
            }
        } else {
            self.stage_state()?;
        }

        let len = self.state_log.length()?;
        let staged = self.state_log.get(len - 1)?;
        let new_state = staged.state;
        let genesis = self.state_log.get(0)?.state;
        let old_state = if self.iden_state_on_chain.is_zero() {
            genesis
        } else {
            self.iden_state_on_chain
        };

        let mut msg = old_state.0.to_vec();
        msg.extend_from_slice(&new_state.0);
        let sig = self.sign_binary(SIG_PREFIX_SET_STATE, &msg)?;

        let registry = self.registry.as_ref().ok_or(IssuerError::NoRegistry)?;
        let tx_handle = if self.iden_state_on_chain.is_zero() {
            registry.init_state(&self.id, &genesis, &new_state, &[], &[], &sig)?
        } else {
            registry.set_state(&self.id, &new_state, &[], &[], &sig)?
        };

        let mut tx = self.storage.new_tx()?;
        self.state_log.put_in(
            &mut tx,
            len - 1,
            &StateLogEntry {
                tx: Some(tx_handle),
                ..staged
            },
        );
        tx.put(KEY_STATE_PENDING, &new_state.0);
        tx.commit()?;
        self.iden_state_pending = new_state;
        info!(old = %old_state, new = %new_state, "submitted state transition");
        Ok(())
    }

    /// Queries the registry and advances the confirmed pointer when the
    /// pending state landed on chain. Idempotent and safe to call repeatedly.
    pub fn sync_iden_state_public(&mut self) -> Result<(), IssuerError> {
        let registry = self.registry.as_ref().ok_or(IssuerError::NoRegistry)?;
        let data = registry.get_state(&self.id)?;

        if !self.iden_state_pending.is_zero() && data.iden_state == self.iden_state_pending {
            let data_blob = serde_json::to_vec(&data)
                .map_err(|e| IssuerError::CorruptState(e.to_string()))?;
            let mut tx = self.storage.new_tx()?;
            tx.put(KEY_STATE_ON_CHAIN, &data.iden_state.0);
            tx.put(KEY_STATE_ON_CHAIN_DATA, &data_blob);
            tx.put(KEY_STATE_PENDING, &HASH_ZERO.0);
            tx.commit()?;
            self.iden_state_on_chain = data.iden_state;
            self.iden_state_pending = HASH_ZERO;
            info!(state = %data.iden_state, "identity state confirmed on chain");
            return Ok(());
        }
        if data.iden_state == self.iden_state_on_chain {
            return Ok(());
        }
        Err(IssuerError::UnexpectedOnChainState)
    }

    /// Builds the existence credential of an issued claim against the
    /// confirmed on-chain state.
    pub fn gen_credential_existence(
        &self,
        claim: &Claim,
    ) -> Result<CredentialExistence, IssuerError> {
        if self.iden_state_on_chain.is_zero() {
            return Err(IssuerError::IdenStateOnChainZero);
        }
        let entry = claim.entry();
        let h_index = entry.h_index()?;
        let (claim_state_idx, stored_entry) = self.stored_claim(&h_index)?;

        let on_chain_idx = self.log_index_of(&self.iden_state_on_chain)?;
        if claim_state_idx > on_chain_idx {
            return Err(IssuerError::ClaimNotFoundStateOnChain);
        }
        let log_entry = self.state_log.get(on_chain_idx)?;

        let claims_snapshot = self.claims_tree.snapshot(log_entry.claims_root)?;
        let proof_claim = claims_snapshot.generate_proof(&h_index)?;
        if !proof_claim.existence() {
            return Err(IssuerError::CorruptState(format!(
                "claim missing from logged claims root {}",
                log_entry.claims_root
            )));
        }

        let revocation_leaf = new_revocation_leaf(
            revocation_nonce(&stored_entry),
            claim_version(&stored_entry),
        );
        let revocations_snapshot = self
            .revocations_tree
            .snapshot(log_entry.revocations_root)?;
        let proof_not_revoked =
            revocations_snapshot.generate_proof(&revocation_leaf.h_index()?)?;

        let iden_state_data = match self.storage.get(KEY_STATE_ON_CHAIN_DATA) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| IssuerError::CorruptState(format!("undecodable state data: {e}")))?,
            Err(StorageError::NotFound) => IdenStateData::new(self.iden_state_on_chain),
            Err(e) => return Err(e.into()),
        };

        Ok(CredentialExistence {
            id: self.id,
            iden_state_data,
            claim: claim.clone(),
            proof_claim,
            proof_not_revoked,
            claims_tree_root: log_entry.claims_root,
            revocations_tree_root: log_entry.revocations_root,
            roots_tree_root: log_entry.roots_root,
        })
    }

    /// Signs `H(domain_tag ‖ data)` with the operational key.
    pub fn sign_binary(
        &self,
        domain_tag: &[u8],
        data: &[u8],
    ) -> Result<SignatureComp, IssuerError> {
        let mut msg = domain_tag.to_vec();
        msg.extend_from_slice(data);
        Ok(self.keystore.sign(&self.kop, &msg)?)
    }

    /// Appends the claims root to the roots tree (ignoring a root already
    /// recorded there), recomputes the state and appends it to the state log,
    /// then hands both auxiliary trees to the off-chain publisher. The log
    /// append and the tree writes commit in one transaction, before the
    /// registry is involved, which makes the publish retry-safe.
    fn stage_state(&mut self) -> Result<(), IssuerError> {
        let claims_root = self.claims_tree.root_key();
        let revocations_root = self.revocations_tree.root_key();

        let mut tx = self.storage.new_tx()?;
        let roots_root = {
            let mut scoped = PrefixedTx::new(&mut tx, PREFIX_ROOTS_TREE);
            match self
                .roots_tree
                .add_raw(&mut scoped, &claims_root, &HASH_ZERO)
            {
                Ok(root) => root,
                Err(SmtError::EntryIndexAlreadyExists) => self.roots_tree.root_key(),
                Err(e) => return Err(e.into()),
            }
        };
        let new_state = iden_state_from_roots(&claims_root, &revocations_root, &roots_root)?;
        self.state_log.append_in(
            &mut tx,
            &StateLogEntry {
                state: new_state,
                claims_root,
                revocations_root,
                roots_root,
                tx: None,
            },
        )?;
        tx.commit()?;
        self.roots_tree.set_root(roots_root);

        self.publisher.publish(
            &new_state,
            &claims_root,
            &revocations_root,
            &roots_root,
            &self.roots_tree,
            &self.revocations_tree,
        )?;
        debug!(state = %new_state, "staged state");
        Ok(())
    }

    /// Inserts a claim and its bookkeeping record in one transaction.
    fn insert_claim(&mut self, claim: &Claim, state_idx: u32) -> Result<(), IssuerError> {
        let entry = claim.entry();
        if !check_entry_in_field(&entry) {
            return Err(ClaimError::EntryNotInField.into());
        }
        let h_index = entry.h_index()?;
        let h_value = entry.h_value()?;

        let mut tx = self.storage.new_tx()?;
        let new_root = {
            let mut scoped = PrefixedTx::new(&mut tx, PREFIX_CLAIMS_TREE);
            self.claims_tree
                .add_raw(&mut scoped, &h_index, &h_value)
                .map_err(claim_add_error)?
        };
        tx.put(&claim_state_key(&h_index), &claim_state_record(state_idx, &entry));
        tx.commit()?;
        self.claims_tree.set_root(new_root);
        Ok(())
    }

    /// The bookkeeping record of an issued claim: its first state index and
    /// its full entry.
    fn stored_claim(&self, h_index: &Hash) -> Result<(u32, Entry), IssuerError> {
        let bytes = match self.storage.get(&claim_state_key(h_index)) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound) => return Err(IssuerError::ClaimNotFound),
            Err(e) => return Err(e.into()),
        };
        if bytes.len() < 4 {
            return Err(IssuerError::CorruptState(
                "undecodable claim record".to_string(),
            ));
        }
        let idx = u32::from_be_bytes(bytes[..4].try_into().expect("4-byte slice"));
        let entry = Entry::from_bytes(&bytes[4..]).ok_or_else(|| {
            IssuerError::CorruptState("undecodable claim record entry".to_string())
        })?;
        Ok((idx, entry))
    }

    /// Index of a state in the log, scanning from the tail.
    fn log_index_of(&self, state: &Hash) -> Result<u32, IssuerError> {
        let len = self.state_log.length()?;
        for idx in (0..len).rev() {
            if self.state_log.get(idx)?.state == *state {
                return Ok(idx);
            }
        }
        Err(IssuerError::CorruptState(format!(
            "state {state} missing from the state log"
        )))
    }
}

fn claim_add_error(err: SmtError) -> IssuerError {
    match err {
        SmtError::EntryIndexAlreadyExists => IssuerError::ClaimAlreadyExists,
        e => e.into(),
    }
}

fn claim_state_key(h_index: &Hash) -> Vec<u8> {
    let mut key = PREFIX_CLAIM_STATE.to_vec();
    key.extend_from_slice(&h_index.0);
    key
}

fn claim_state_record(state_idx: u32, entry: &Entry) -> Vec<u8> {
    let mut record = state_idx.to_be_bytes().to_vec();
    record.extend_from_slice(&entry.to_bytes());
    record
}
