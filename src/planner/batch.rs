//! Operation batch builder
//!
//! Encodes intents and asks the Safe for each operation hash, assigning
//! nonces `n0, n0 + 1, ...` from the snapshot nonce. The hashes are only
//! valid if nothing else executes against the Safe before the batch does.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::safe::chain::SafeChain;

use super::intent::{CallTargets, Intent};

/// A fully formed Safe operation awaiting signatures or approvals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOperation {
    /// Position in the batch
    pub index: usize,

    /// Safe nonce this operation consumes
    pub nonce: U256,

    /// What the operation does
    pub intent: Intent,

    /// Call target
    pub to: Address,

    /// Wei sent with the call
    pub value: U256,

    /// Calldata
    pub data: Bytes,

    /// Safe-computed hash owners sign or approve
    pub operation_hash: B256,
}

impl fmt::Display for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} nonce {}: {} [hash {}]",
            self.index, self.nonce, self.intent, self.operation_hash
        )
    }
}

/// Builds pending operations against one Safe
pub struct BatchBuilder {
    chain: Arc<dyn SafeChain>,
    targets: CallTargets,
}

impl BatchBuilder {
    pub fn new(chain: Arc<dyn SafeChain>, targets: CallTargets) -> Self {
        Self { chain, targets }
    }

    /// Turn intents into operations, in order, starting at `start_nonce`
    pub async fn build(
        &self,
        intents: Vec<Intent>,
        start_nonce: U256,
    ) -> Result<Vec<PendingOperation>> {
        let mut operations = Vec::with_capacity(intents.len());
        let mut nonce = start_nonce;

        for (index, intent) in intents.into_iter().enumerate() {
            let call = intent.encode(&self.targets)?;
            let operation_hash = self
                .chain
                .transaction_hash(self.targets.safe, call.to, call.value, call.data.clone(), nonce)
                .await?;

            let operation = PendingOperation {
                index,
                nonce,
                intent,
                to: call.to,
                value: call.value,
                data: call.data,
                operation_hash,
            };
            debug!("Built {}", operation);
            operations.push(operation);

            nonce += U256::from(1);
        }

        Ok(operations)
    }
}
