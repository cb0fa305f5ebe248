//! Offline approval artifacts
//!
//! When no keys are available locally, each operation is handed off as two
//! call descriptors: an `approveHash` any owner can send, and the final
//! `execTransaction` pre-filled with approved-hash placeholder signatures.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;

use crate::planner::PendingOperation;
use crate::safe::contracts::{IGnosisSafe, APPROVE_HASH_GAS, OPERATION_CALL};
use crate::safe::types::GasParams;

use super::signatures::SignatureSet;

/// A call for someone else to submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallDescriptor {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas: u64,
}

/// Both artifacts for one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalArtifact {
    pub index: usize,
    pub nonce: U256,
    pub description: String,
    pub operation_hash: B256,
    pub approve: CallDescriptor,
    pub execute: CallDescriptor,
}

/// `approveHash(operationHash)` on the Safe
pub fn approve_hash_call(safe: Address, operation: &PendingOperation) -> CallDescriptor {
    CallDescriptor {
        to: safe,
        value: U256::ZERO,
        data: IGnosisSafe::approveHashCall {
            hashToApprove: operation.operation_hash,
        }
        .abi_encode()
        .into(),
        gas: APPROVE_HASH_GAS,
    }
}

/// `execTransaction` for `operation` carrying `signatures`
pub fn exec_transaction_call(
    safe: Address,
    operation: &PendingOperation,
    signatures: &SignatureSet,
    gas: &GasParams,
) -> CallDescriptor {
    CallDescriptor {
        to: safe,
        value: U256::ZERO,
        data: exec_transaction_data(
            operation.to,
            operation.value,
            operation.data.clone(),
            signatures.to_bytes(),
        ),
        gas: gas.gas,
    }
}

/// Calldata of `execTransaction` with no refund parameters
pub fn exec_transaction_data(to: Address, value: U256, data: Bytes, signatures: Bytes) -> Bytes {
    IGnosisSafe::execTransactionCall {
        to,
        value,
        data,
        operation: OPERATION_CALL,
        safeTxGas: U256::ZERO,
        dataGas: U256::ZERO,
        gasPrice: U256::ZERO,
        gasToken: Address::ZERO,
        refundReceiver: Address::ZERO,
        signatures,
    }
    .abi_encode()
    .into()
}

/// Build the approval pair for one operation
///
/// `approvers` are the owners whose placeholder signatures go into the final
/// call; the caller picks them (current owners or the configured
/// `ownersToSign`).
pub fn approval_artifact(
    safe: Address,
    operation: &PendingOperation,
    approvers: &[Address],
    gas: &GasParams,
) -> ApprovalArtifact {
    let placeholders = SignatureSet::approved_hash_placeholders(approvers);
    ApprovalArtifact {
        index: operation.index,
        nonce: operation.nonce,
        description: operation.intent.to_string(),
        operation_hash: operation.operation_hash,
        approve: approve_hash_call(safe, operation),
        execute: exec_transaction_call(safe, operation, &placeholders, gas),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Intent;
    use alloy::primitives::{address, b256};

    const SAFE: Address = address!("0x5afe000000000000000000000000000000000000");

    fn operation() -> PendingOperation {
        PendingOperation {
            index: 0,
            nonce: U256::from(7),
            intent: Intent::ChangeThreshold { threshold: 2 },
            to: SAFE,
            value: U256::ZERO,
            data: IGnosisSafe::changeThresholdCall {
                _threshold: U256::from(2),
            }
            .abi_encode()
            .into(),
            operation_hash: b256!(
                "0x1111111111111111111111111111111111111111111111111111111111111111"
            ),
        }
    }

    #[test]
    fn test_approve_call_targets_safe_with_fixed_gas() {
        let call = approve_hash_call(SAFE, &operation());
        assert_eq!(call.to, SAFE);
        assert_eq!(call.gas, APPROVE_HASH_GAS);

        let decoded = IGnosisSafe::approveHashCall::abi_decode(&call.data).unwrap();
        assert_eq!(decoded.hashToApprove, operation().operation_hash);
    }

    #[test]
    fn test_exec_call_carries_placeholders() {
        let a = address!("0x2222222222222222222222222222222222222222");
        let b = address!("0x1111111111111111111111111111111111111111");
        let artifact = approval_artifact(SAFE, &operation(), &[a, b], &GasParams::default());

        let decoded = IGnosisSafe::execTransactionCall::abi_decode(&artifact.execute.data).unwrap();
        assert_eq!(decoded.to, SAFE);
        assert_eq!(decoded.operation, OPERATION_CALL);
        assert_eq!(decoded.signatures.len(), 130);
        assert_eq!(&decoded.signatures[12..32], b.as_slice());
        assert_eq!(decoded.signatures[64], 1);
        assert_eq!(artifact.nonce, U256::from(7));
    }

    #[test]
    fn test_descriptor_json_shape() {
        let json = serde_json::to_value(approve_hash_call(SAFE, &operation())).unwrap();
        assert!(json.get("to").is_some());
        assert!(json.get("data").unwrap().as_str().unwrap().starts_with("0x"));
        assert_eq!(json.get("gas").unwrap(), 1_000_000);
    }
}
