//! Execution coordinator
//!
//! ```text
//! Planned ──LocalSigning──▶ Signing ──▶ Executed | PartiallyExecuted | Aborted
//!         └─ManualApproval─▶ AwaitingApproval
//! ```
//!
//! Operations run strictly one after another: operation `i + 1` was hashed
//! against the nonce `i` leaves behind. The first failure stops the batch;
//! what already committed stays committed and a fresh diff is the recovery.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::planner::PendingOperation;
use crate::safe::chain::SafeChain;
use crate::safe::types::{GasParams, WalletState};

use super::approval::{approval_artifact, ApprovalArtifact};
use super::credentials::{ExecutionMode, LocalSigners};
use super::signatures::SignatureSet;

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every operation committed
    Executed,

    /// Some operations committed before one failed
    PartiallyExecuted,

    /// Artifacts emitted, nothing submitted
    AwaitingApproval,

    /// The first operation failed, nothing committed
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedOperation {
    pub index: usize,
    pub nonce: U256,
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedOperation {
    pub index: usize,
    pub nonce: U256,
    pub reason: String,
}

/// Outcome of one run over a batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub mode: String,
    pub status: ExecutionStatus,
    pub committed: Vec<CommittedOperation>,
    pub failed: Option<FailedOperation>,
    /// Nonces of the failed operation and everything after it
    pub not_executed: Vec<U256>,
    pub artifacts: Vec<ApprovalArtifact>,
}

impl ExecutionReport {
    fn new(mode: &ExecutionMode, status: ExecutionStatus) -> Self {
        Self {
            mode: mode.to_string(),
            status,
            committed: Vec::new(),
            failed: None,
            not_executed: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// One-line account of what happened
    pub fn summary(&self) -> String {
        match self.status {
            ExecutionStatus::Executed => {
                format!("{} operation/s executed", self.committed.len())
            }
            ExecutionStatus::AwaitingApproval => {
                format!("{} operation/s awaiting approval", self.artifacts.len())
            }
            ExecutionStatus::PartiallyExecuted | ExecutionStatus::Aborted => {
                let mut summary = format!(
                    "{} operation/s committed, {} not executed",
                    self.committed.len(),
                    self.not_executed.len()
                );
                if let Some(failed) = &self.failed {
                    summary.push_str(&format!(
                        " (#{} at nonce {} failed: {})",
                        failed.index, failed.nonce, failed.reason
                    ));
                }
                summary
            }
        }
    }

    /// Turn an incomplete run into [`Error::PartialBatchExecution`]
    pub fn into_result(self) -> Result<Self> {
        match self.status {
            ExecutionStatus::Executed | ExecutionStatus::AwaitingApproval => Ok(self),
            ExecutionStatus::PartiallyExecuted | ExecutionStatus::Aborted => {
                Err(Error::PartialBatchExecution(Box::new(self)))
            }
        }
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mode:   {}", self.mode)?;
        writeln!(f, "Result: {}", self.summary())?;
        for op in &self.committed {
            writeln!(f, "  ✓ #{} nonce {} tx {}", op.index, op.nonce, op.tx_hash)?;
        }
        if let Some(failed) = &self.failed {
            writeln!(f, "  ✗ #{} nonce {}: {}", failed.index, failed.nonce, failed.reason)?;
        }
        let skipped = self.not_executed.iter().filter(|n| {
            self.failed.as_ref().map(|f| f.nonce != **n).unwrap_or(true)
        });
        for nonce in skipped {
            writeln!(f, "  - nonce {} not executed", nonce)?;
        }
        Ok(())
    }
}

/// Drives a batch through signing and submission or through approval handoff
pub struct Coordinator {
    chain: Arc<dyn SafeChain>,
    safe: Address,
    mode: ExecutionMode,
    gas: GasParams,
    approvers: Option<Vec<Address>>,
}

impl Coordinator {
    pub fn new(
        chain: Arc<dyn SafeChain>,
        safe: Address,
        mode: ExecutionMode,
        gas: GasParams,
    ) -> Self {
        Self {
            chain,
            safe,
            mode,
            gas,
            approvers: None,
        }
    }

    /// Owners whose placeholder signatures go into approval artifacts
    ///
    /// Non-owners are dropped and the lowest `threshold` remaining addresses
    /// are used. Defaults to the lowest `threshold` current owners.
    pub fn with_approvers(mut self, approvers: Vec<Address>) -> Self {
        self.approvers = Some(approvers);
        self
    }

    /// Local keys that will sign, checked against the current owners
    ///
    /// At most `threshold + 1` keys sign each operation.
    pub fn signing_keys<'a>(
        &self,
        signers: &'a LocalSigners,
        wallet: &WalletState,
    ) -> Result<Vec<&'a PrivateKeySigner>> {
        let mut eligible = signers.eligible(&wallet.owners);
        if (eligible.len() as u64) < wallet.threshold {
            return Err(Error::InsufficientSigners {
                available: eligible.len(),
                required: wallet.threshold,
            });
        }
        eligible.truncate((wallet.threshold as usize).saturating_add(1));
        Ok(eligible)
    }

    /// Execute or hand off `operations`, in order
    pub async fn run(
        &self,
        operations: Vec<PendingOperation>,
        wallet: &WalletState,
    ) -> Result<ExecutionReport> {
        match &self.mode {
            ExecutionMode::LocalSigning(signers) => {
                let keys = self.signing_keys(signers, wallet)?;
                Ok(self.execute(operations, &keys).await)
            }
            ExecutionMode::ManualApproval => self.hand_off(operations, wallet),
        }
    }

    async fn execute(
        &self,
        operations: Vec<PendingOperation>,
        keys: &[&PrivateKeySigner],
    ) -> ExecutionReport {
        let mut report = ExecutionReport::new(&self.mode, ExecutionStatus::Executed);
        let total = operations.len();

        for (position, operation) in operations.iter().enumerate() {
            info!("Executing {}/{}: {}", position + 1, total, operation);

            match self.submit(operation, keys).await {
                Ok(tx_hash) => {
                    info!("Committed nonce {} in {}", operation.nonce, tx_hash);
                    report.committed.push(CommittedOperation {
                        index: operation.index,
                        nonce: operation.nonce,
                        tx_hash,
                    });
                }
                Err(reason) => {
                    error!("Operation #{} failed: {}", operation.index, reason);
                    report.failed = Some(FailedOperation {
                        index: operation.index,
                        nonce: operation.nonce,
                        reason,
                    });
                    report.not_executed =
                        operations[position..].iter().map(|op| op.nonce).collect();
                    report.status = if report.committed.is_empty() {
                        ExecutionStatus::Aborted
                    } else {
                        ExecutionStatus::PartiallyExecuted
                    };
                    if position + 1 < total {
                        warn!("Stopping batch, {} operation/s abandoned", total - position - 1);
                    }
                    break;
                }
            }
        }

        report
    }

    /// Sign and submit one operation; `Err` carries the failure reason
    async fn submit(
        &self,
        operation: &PendingOperation,
        keys: &[&PrivateKeySigner],
    ) -> std::result::Result<B256, String> {
        let signatures =
            SignatureSet::sign(&operation.operation_hash, keys).map_err(|e| e.to_string())?;
        debug!("Nonce {} signed by {} key/s", operation.nonce, signatures.len());

        let receipt = self
            .chain
            .exec_transaction(
                self.safe,
                operation.to,
                operation.value,
                operation.data.clone(),
                signatures.to_bytes(),
                self.gas,
            )
            .await
            .map_err(|e| e.to_string())?;

        if receipt.success {
            Ok(receipt.tx_hash)
        } else {
            Err(format!("reverted in {}", receipt.tx_hash))
        }
    }

    fn hand_off(
        &self,
        operations: Vec<PendingOperation>,
        wallet: &WalletState,
    ) -> Result<ExecutionReport> {
        let mut approvers = match &self.approvers {
            Some(configured) => {
                let mut approvers: Vec<Address> = configured
                    .iter()
                    .copied()
                    .filter(|approver| {
                        let owner = wallet.is_owner(approver);
                        if !owner {
                            warn!("Approver {} is not an owner of the Safe, skipping", approver);
                        }
                        owner
                    })
                    .collect();
                approvers.sort();
                approvers.dedup();
                if (approvers.len() as u64) < wallet.threshold {
                    return Err(Error::Validation(format!(
                        "{} owner/s among the configured approvers, threshold is {}",
                        approvers.len(),
                        wallet.threshold
                    )));
                }
                approvers
            }
            None => wallet.sorted_owners(),
        };
        approvers.truncate(wallet.threshold as usize);

        let mut report = ExecutionReport::new(&self.mode, ExecutionStatus::AwaitingApproval);
        report.not_executed = operations.iter().map(|op| op.nonce).collect();
        report.artifacts = operations
            .iter()
            .map(|op| approval_artifact(self.safe, op, &approvers, &self.gas))
            .collect();

        info!(
            "Prepared {} approval artifact/s for {} approver/s",
            report.artifacts.len(),
            approvers.len()
        );
        Ok(report)
    }
}
