//! In-memory chain used by unit tests

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;

use crate::error::{Error, Result};

use super::chain::SafeChain;
use super::types::{GasParams, SubmissionReceipt, TokenInfo};

/// A submitted `execTransaction`
#[derive(Debug, Clone)]
pub struct Submission {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub signatures: Bytes,
    pub nonce: U256,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub owners: Vec<Address>,
    pub threshold: u64,
    pub nonce: U256,
    pub modules: Vec<Address>,
    pub operators: Vec<Address>,
    pub tokens: Vec<Address>,
    pub token_info: HashMap<Address, TokenInfo>,
    pub balances: HashMap<(Address, Address), U256>,
    pub custody: HashMap<(Address, Address), U256>,
    pub submissions: Vec<Submission>,
    /// Index of the submission that reverts
    pub revert_at: Option<usize>,
    pub fail_reads: bool,
    pub proxies_created: usize,
}

pub struct MockChain {
    pub state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(owners: Vec<Address>, threshold: u64, nonce: u64) -> Self {
        Self {
            state: Mutex::new(MockState {
                owners,
                threshold,
                nonce: U256::from(nonce),
                ..Default::default()
            }),
        }
    }

    pub fn with_state(f: impl FnOnce(&mut MockState)) -> Self {
        let mut state = MockState {
            threshold: 1,
            ..Default::default()
        };
        f(&mut state);
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    fn read<T>(&self, f: impl FnOnce(&MockState) -> T) -> Result<T> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(Error::ChainRead("connection refused".to_string()));
        }
        Ok(f(&state))
    }
}

/// Deterministic stand-in for the Safe's transaction hash
pub fn mock_operation_hash(to: Address, value: U256, data: &[u8], nonce: U256) -> B256 {
    let mut preimage = Vec::with_capacity(20 + 32 + data.len() + 32);
    preimage.extend_from_slice(to.as_slice());
    preimage.extend_from_slice(&value.to_be_bytes::<32>());
    preimage.extend_from_slice(data);
    preimage.extend_from_slice(&nonce.to_be_bytes::<32>());
    keccak256(preimage)
}

#[async_trait]
impl SafeChain for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        self.read(|_| 1337)
    }

    async fn owners(&self, _safe: Address) -> Result<Vec<Address>> {
        self.read(|s| s.owners.clone())
    }

    async fn threshold(&self, _safe: Address) -> Result<u64> {
        self.read(|s| s.threshold)
    }

    async fn nonce(&self, _safe: Address) -> Result<U256> {
        self.read(|s| s.nonce)
    }

    async fn modules(&self, _safe: Address) -> Result<Vec<Address>> {
        self.read(|s| s.modules.clone())
    }

    async fn whitelisted_operators(&self, _module: Address) -> Result<Vec<Address>> {
        self.read(|s| s.operators.clone())
    }

    async fn whitelisted_tokens(&self, _module: Address) -> Result<Vec<Address>> {
        self.read(|s| s.tokens.clone())
    }

    async fn transaction_hash(
        &self,
        _safe: Address,
        to: Address,
        value: U256,
        data: Bytes,
        nonce: U256,
    ) -> Result<B256> {
        self.read(|_| mock_operation_hash(to, value, &data, nonce))
    }

    async fn exec_transaction(
        &self,
        _safe: Address,
        to: Address,
        value: U256,
        data: Bytes,
        signatures: Bytes,
        _gas: GasParams,
    ) -> Result<SubmissionReceipt> {
        let mut state = self.state.lock().unwrap();
        let index = state.submissions.len();
        let nonce = state.nonce;
        state.submissions.push(Submission {
            to,
            value,
            data,
            signatures,
            nonce,
        });

        let tx_hash = keccak256(U256::from(index).to_be_bytes::<32>());
        if state.revert_at == Some(index) {
            return Ok(SubmissionReceipt {
                tx_hash,
                success: false,
            });
        }

        state.nonce += U256::from(1);
        Ok(SubmissionReceipt {
            tx_hash,
            success: true,
        })
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo> {
        self.read(|s| s.token_info.get(&token).cloned())?
            .ok_or_else(|| Error::ChainRead(format!("no token at {}", token)))
    }

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256> {
        self.read(|s| s.balances.get(&(token, holder)).copied().unwrap_or_default())
    }

    async fn custody_balance(
        &self,
        _custody: Address,
        holder: Address,
        token: Address,
    ) -> Result<U256> {
        self.read(|s| s.custody.get(&(holder, token)).copied().unwrap_or_default())
    }

    async fn create_proxy(
        &self,
        _factory: Address,
        master_copy: Address,
        init: Bytes,
        _gas: GasParams,
    ) -> Result<Address> {
        let mut state = self.state.lock().unwrap();
        state.proxies_created += 1;
        let seed = mock_operation_hash(
            master_copy,
            U256::ZERO,
            &init,
            U256::from(state.proxies_created),
        );
        Ok(Address::from_slice(&seed[12..]))
    }
}
