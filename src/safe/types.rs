//! Core types for on-chain Safe and module state
//!
//! Snapshots are read-only copies of chain state. They go stale the moment
//! any operation of a batch executes.

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use serde::Serialize;

/// Point-in-time snapshot of the Safe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletState {
    /// Owners in on-chain linked-list order
    pub owners: Vec<Address>,

    /// Required confirmations
    pub threshold: u64,

    /// Nonce the next executed operation will consume
    pub nonce: U256,
}

impl WalletState {
    /// Check if an address is a current owner
    pub fn is_owner(&self, address: &Address) -> bool {
        self.owners.contains(address)
    }

    /// Current owners sorted ascending, the order the Safe expects signatures in
    pub fn sorted_owners(&self) -> Vec<Address> {
        let mut owners = self.owners.clone();
        owners.sort();
        owners
    }
}

/// Point-in-time snapshot of the policy module
///
/// Membership is what matters; the order is kept only so that dry-run output
/// is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicyState {
    /// Whitelisted operators
    pub operators: Vec<Address>,

    /// Whitelisted tokens
    pub tokens: Vec<Address>,
}

/// Token metadata needed to render and convert amounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Gas parameters for submitted transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    /// Gas limit
    pub gas: u64,

    /// Gas price in wei (node default if None)
    pub gas_price: Option<u64>,
}

impl Default for GasParams {
    fn default() -> Self {
        Self {
            gas: 1_000_000,
            gas_price: None,
        }
    }
}

/// Outcome of a mined submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Transaction hash
    pub tx_hash: B256,

    /// Whether the Safe executed the operation successfully
    pub success: bool,
}

impl fmt::Display for SubmissionReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.tx_hash,
            if self.success { "success" } else { "reverted" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_sorted_owners_keeps_storage_order_intact() {
        let a = address!("0x1000000000000000000000000000000000000000");
        let b = address!("0x2000000000000000000000000000000000000000");
        let state = WalletState {
            owners: vec![b, a],
            threshold: 1,
            nonce: U256::ZERO,
        };

        assert_eq!(state.sorted_owners(), vec![a, b]);
        assert_eq!(state.owners, vec![b, a]);
        assert!(state.is_owner(&a));
    }
}
