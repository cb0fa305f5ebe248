//! Intents: not-yet-encoded descriptions of single state-changing calls
//!
//! An intent names what should change; [`Intent::encode`] turns it into the
//! concrete call the Safe will execute (target, value, calldata).

use std::fmt;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::safe::contracts::{IDutchExchange, IDutchXModule, IGnosisSafe, IToken};

/// One desired state-changing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Add an owner and set the threshold
    AddOwner { owner: Address, threshold: u64 },

    /// Remove an owner; `prev` is its predecessor in the owner list
    /// (or the sentinel when it is the first owner)
    RemoveOwner {
        prev: Address,
        owner: Address,
        threshold: u64,
    },

    /// Replace `old` with `new` in place
    SwapOwner {
        prev: Address,
        old: Address,
        new: Address,
    },

    /// Change the threshold without touching owners
    ChangeThreshold { threshold: u64 },

    /// Let `module` execute calls on behalf of the Safe
    EnableModule { module: Address },

    /// Whitelist a module operator
    AddOperator { operator: Address },

    /// Remove a module operator
    RemoveOperator { operator: Address },

    /// Whitelist a token in the module
    AddAsset { token: Address },

    /// Remove a token from the module whitelist
    RemoveAsset { token: Address },

    /// Move module-custodied balance back to the Safe
    WithdrawAsset { token: Address, amount: U256 },

    /// Send tokens held by the Safe to `destination`
    TransferAsset {
        token: Address,
        amount: U256,
        destination: Address,
    },

    /// Arbitrary CALL from the Safe
    Custom {
        to: Address,
        value: U256,
        data: Bytes,
    },
}

/// Contracts intents are encoded against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTargets {
    pub safe: Address,
    pub module: Option<Address>,
    pub custody: Option<Address>,
}

impl CallTargets {
    pub fn safe_only(safe: Address) -> Self {
        Self {
            safe,
            module: None,
            custody: None,
        }
    }

    fn module(&self) -> Result<Address> {
        self.module
            .ok_or_else(|| {
                Error::Validation("module address required for this operation".to_string())
            })
    }

    fn custody(&self) -> Result<Address> {
        self.custody
            .ok_or_else(|| {
                Error::Validation("custody contract address required for withdrawals".to_string())
            })
    }
}

/// A call ready to be wrapped in a Safe operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl EncodedCall {
    fn new(to: Address, data: Vec<u8>) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: Bytes::from(data),
        }
    }
}

impl Intent {
    /// Encode the call this intent stands for
    pub fn encode(&self, targets: &CallTargets) -> Result<EncodedCall> {
        let call = match self {
            Intent::AddOwner { owner, threshold } => EncodedCall::new(
                targets.safe,
                IGnosisSafe::addOwnerWithThresholdCall {
                    owner: *owner,
                    _threshold: U256::from(*threshold),
                }
                .abi_encode(),
            ),
            Intent::RemoveOwner {
                prev,
                owner,
                threshold,
            } => EncodedCall::new(
                targets.safe,
                IGnosisSafe::removeOwnerCall {
                    prevOwner: *prev,
                    owner: *owner,
                    _threshold: U256::from(*threshold),
                }
                .abi_encode(),
            ),
            Intent::SwapOwner { prev, old, new } => EncodedCall::new(
                targets.safe,
                IGnosisSafe::swapOwnerCall {
                    prevOwner: *prev,
                    oldOwner: *old,
                    newOwner: *new,
                }
                .abi_encode(),
            ),
            Intent::ChangeThreshold { threshold } => EncodedCall::new(
                targets.safe,
                IGnosisSafe::changeThresholdCall {
                    _threshold: U256::from(*threshold),
                }
                .abi_encode(),
            ),
            Intent::EnableModule { module } => EncodedCall::new(
                targets.safe,
                IGnosisSafe::enableModuleCall { module: *module }.abi_encode(),
            ),
            Intent::AddOperator { operator } => EncodedCall::new(
                targets.module()?,
                IDutchXModule::addOperatorCall {
                    operator: *operator,
                }
                .abi_encode(),
            ),
            Intent::RemoveOperator { operator } => EncodedCall::new(
                targets.module()?,
                IDutchXModule::removeOperatorCall {
                    operator: *operator,
                }
                .abi_encode(),
            ),
            Intent::AddAsset { token } => EncodedCall::new(
                targets.module()?,
                IDutchXModule::addToWhitelistCall { token: *token }.abi_encode(),
            ),
            Intent::RemoveAsset { token } => EncodedCall::new(
                targets.module()?,
                IDutchXModule::removeFromWhitelistCall { token: *token }.abi_encode(),
            ),
            Intent::WithdrawAsset { token, amount } => EncodedCall::new(
                targets.custody()?,
                IDutchExchange::withdrawCall {
                    tokenAddress: *token,
                    amount: *amount,
                }
                .abi_encode(),
            ),
            Intent::TransferAsset {
                token,
                amount,
                destination,
            } => EncodedCall::new(
                *token,
                IToken::transferCall {
                    to: *destination,
                    value: *amount,
                }
                .abi_encode(),
            ),
            Intent::Custom { to, value, data } => EncodedCall {
                to: *to,
                value: *value,
                data: data.clone(),
            },
        };
        Ok(call)
    }

    /// Whether this intent changes the owner set or threshold
    pub fn is_owner_change(&self) -> bool {
        matches!(
            self,
            Intent::AddOwner { .. }
                | Intent::RemoveOwner { .. }
                | Intent::SwapOwner { .. }
                | Intent::ChangeThreshold { .. }
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::AddOwner { owner, threshold } => {
                write!(f, "add owner {} (threshold {})", owner, threshold)
            }
            Intent::RemoveOwner {
                prev,
                owner,
                threshold,
            } => write!(
                f,
                "remove owner {} after {} (threshold {})",
                owner, prev, threshold
            ),
            Intent::SwapOwner { prev, old, new } => {
                write!(f, "swap owner {} -> {} after {}", old, new, prev)
            }
            Intent::ChangeThreshold { threshold } => write!(f, "change threshold to {}", threshold),
            Intent::EnableModule { module } => write!(f, "enable module {}", module),
            Intent::AddOperator { operator } => write!(f, "add operator {}", operator),
            Intent::RemoveOperator { operator } => write!(f, "remove operator {}", operator),
            Intent::AddAsset { token } => write!(f, "whitelist token {}", token),
            Intent::RemoveAsset { token } => write!(f, "remove token {} from whitelist", token),
            Intent::WithdrawAsset { token, amount } => {
                write!(f, "withdraw {} of {} from custody to Safe", amount, token)
            }
            Intent::TransferAsset {
                token,
                amount,
                destination,
            } => write!(f, "transfer {} of {} to {}", amount, token, destination),
            Intent::Custom { to, value, data } => {
                write!(f, "call {} with {} wei and {} byte/s of data", to, value, data.len())
            }
        }
    }
}
