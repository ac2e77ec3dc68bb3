//! On-chain state registry collaborator interface and a scripted reference
//! mock.
//!
//! The registry is an opaque collaborator: consensus, fees and transaction
//! broadcast live behind [`StateRegistry`]. Calls block on I/O and may be
//! cancelled by the implementation, in which case the issuer's staged state
//! survives and a later publish resumes it.

use crate::id::Id;
use crate::keystore::SignatureComp;
use crate::types::{Hash, HASH_ZERO};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;

/// Error type for registry calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry call failed: {0}")]
    Call(String),
}

/// The on-chain record of an identity state. All-zero when the identifier has
/// never been registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdenStateData {
    pub block_n: u64,
    pub block_ts: i64,
    pub iden_state: Hash,
}

impl IdenStateData {
    pub fn new(iden_state: Hash) -> Self {
        Self {
            block_n: 0,
            block_ts: 0,
            iden_state,
        }
    }
}

/// Opaque handle of a submitted registry transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle(pub Vec<u8>);

/// Access to the identity-states registry.
pub trait StateRegistry {
    /// The current state of `id`; all-zero when absent.
    fn get_state(&self, id: &Id) -> Result<IdenStateData, RegistryError>;

    /// The state of `id` closest (equal or older) to the given block number.
    fn get_state_by_block(&self, id: &Id, block_n: u64) -> Result<IdenStateData, RegistryError>;

    /// The state of `id` closest (equal or older) to the given timestamp.
    fn get_state_by_time(&self, id: &Id, block_ts: i64) -> Result<IdenStateData, RegistryError>;

    /// Registers the first state transition of `id`.
    #[allow(clippy::too_many_arguments)]
    fn init_state(
        &self,
        id: &Id,
        genesis_state: &Hash,
        new_state: &Hash,
        kop_proof: &[u8],
        transition_proof: &[u8],
        sig: &SignatureComp,
    ) -> Result<TxHandle, RegistryError>;

    /// Registers a subsequent state transition of `id`.
    fn set_state(
        &self,
        id: &Id,
        new_state: &Hash,
        kop_proof: &[u8],
        transition_proof: &[u8],
        sig: &SignatureComp,
    ) -> Result<TxHandle, RegistryError>;
}

/// A recorded write call of the [`ScriptedRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    InitState {
        id: Id,
        genesis_state: Hash,
        new_state: Hash,
        sig: SignatureComp,
    },
    SetState {
        id: Id,
        new_state: Hash,
        sig: SignatureComp,
    },
}

#[derive(Debug, Default)]
struct Script {
    get_state: VecDeque<IdenStateData>,
    get_state_by_block: VecDeque<IdenStateData>,
    get_state_by_time: VecDeque<IdenStateData>,
    calls: Vec<RegistryCall>,
}

/// Scripted in-memory registry for tests and development: read responses are
/// queued up front, write calls are recorded and answered with a transaction
/// handle carrying the submitted state.
#[derive(Debug, Default)]
pub struct ScriptedRegistry {
    script: Mutex<Script>,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next [`StateRegistry::get_state`] response.
    pub fn push_get_state(&self, data: IdenStateData) {
        self.lock().get_state.push_back(data);
    }

    pub fn push_get_state_by_block(&self, data: IdenStateData) {
        self.lock().get_state_by_block.push_back(data);
    }

    pub fn push_get_state_by_time(&self, data: IdenStateData) {
        self.lock().get_state_by_time.push_back(data);
    }

    /// The write calls observed so far.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("registry lock poisoned")
    }

    fn pop(
        queue: &mut VecDeque<IdenStateData>,
        method: &str,
    ) -> Result<IdenStateData, RegistryError> {
        queue
            .pop_front()
            .ok_or_else(|| RegistryError::Call(format!("no scripted response for {method}")))
    }
}

impl StateRegistry for ScriptedRegistry {
    fn get_state(&self, _id: &Id) -> Result<IdenStateData, RegistryError> {
        Self::pop(&mut self.lock().get_state, "get_state")
    }

    fn get_state_by_block(&self, _id: &Id, _block_n: u64) -> Result<IdenStateData, RegistryError> {
        Self::pop(&mut self.lock().get_state_by_block, "get_state_by_block")
    }

    fn get_state_by_time(&self, _id: &Id, _block_ts: i64) -> Result<IdenStateData, RegistryError> {
        Self::pop(&mut self.lock().get_state_by_time, "get_state_by_time")
    }

    fn init_state(
        &self,
        id: &Id,
        genesis_state: &Hash,
        new_state: &Hash,
        _kop_proof: &[u8],
        _transition_proof: &[u8],
        sig: &SignatureComp,
    ) -> Result<TxHandle, RegistryError> {
        self.lock().calls.push(RegistryCall::InitState {
            id: *id,
            genesis_state: *genesis_state,
            new_state: *new_state,
            sig: *sig,
        });
        Ok(TxHandle(new_state.0.to_vec()))
    }

    fn set_state(
        &self,
        id: &Id,
        new_state: &Hash,
        _kop_proof: &[u8],
        _transition_proof: &[u8],
        sig: &SignatureComp,
    ) -> Result<TxHandle, RegistryError> {
        self.lock().calls.push(RegistryCall::SetState {
            id: *id,
            new_state: *new_state,
            sig: *sig,
        });
        Ok(TxHandle(new_state.0.to_vec()))
    }
}

/// Convenience for scripting an absent identifier.
pub fn zero_state_data() -> IdenStateData {
    IdenStateData::new(HASH_ZERO)
}
