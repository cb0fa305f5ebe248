//! State snapshot reader
//!
//! Point-in-time reads of the Safe and the module. The two reads are not
//! atomic; a later run re-diffs and converges. Any read failure is fatal.

use std::sync::Arc;

use alloy::primitives::Address;
use tracing::debug;

use crate::error::{Error, Result};

use super::chain::SafeChain;
use super::types::{PolicyState, WalletState};

/// Wallet snapshot plus the module snapshot when a module is involved
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub wallet: WalletState,
    pub policy: Option<PolicyState>,
}

/// Reads Safe and module state through the chain handle
pub struct SnapshotReader {
    chain: Arc<dyn SafeChain>,
}

impl SnapshotReader {
    pub fn new(chain: Arc<dyn SafeChain>) -> Self {
        Self { chain }
    }

    /// Read owners, threshold and nonce of the Safe
    pub async fn wallet_state(&self, safe: Address) -> Result<WalletState> {
        let owners = self.chain.owners(safe).await?;
        let threshold = self.chain.threshold(safe).await?;
        let nonce = self.chain.nonce(safe).await?;

        if threshold == 0 || threshold > owners.len() as u64 {
            return Err(Error::ChainRead(format!(
                "Safe {} reports threshold {} with {} owner/s",
                safe,
                threshold,
                owners.len()
            )));
        }

        debug!(
            "Safe {}: {} owner/s, threshold {}, nonce {}",
            safe,
            owners.len(),
            threshold,
            nonce
        );

        Ok(WalletState {
            owners,
            threshold,
            nonce,
        })
    }

    /// Read whitelisted operators and tokens of the module
    pub async fn policy_state(&self, module: Address) -> Result<PolicyState> {
        let operators = self.chain.whitelisted_operators(module).await?;
        let tokens = self.chain.whitelisted_tokens(module).await?;

        debug!(
            "Module {}: {} operator/s, {} token/s",
            module,
            operators.len(),
            tokens.len()
        );

        Ok(PolicyState { operators, tokens })
    }

    /// Read the Safe and, if given, the module
    pub async fn read(&self, safe: Address, module: Option<Address>) -> Result<Snapshot> {
        let wallet = self.wallet_state(safe).await?;
        let policy = match module {
            Some(module) => Some(self.policy_state(module).await?),
            None => None,
        };
        Ok(Snapshot { wallet, policy })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::mock::MockChain;
    use alloy::primitives::{address, U256};

    const SAFE: Address = address!("0x5afe000000000000000000000000000000000000");
    const MODULE: Address = address!("0x0d00000000000000000000000000000000000000");

    #[tokio::test]
    async fn test_reads_wallet_and_policy() {
        let owner = address!("0x1111111111111111111111111111111111111111");
        let operator = address!("0x3333333333333333333333333333333333333333");
        let chain = Arc::new(MockChain::with_state(|s| {
            s.owners = vec![owner];
            s.threshold = 1;
            s.nonce = U256::from(7);
            s.operators = vec![operator];
        }));

        let snapshot = SnapshotReader::new(chain).read(SAFE, Some(MODULE)).await.unwrap();
        assert_eq!(snapshot.wallet.owners, vec![owner]);
        assert_eq!(snapshot.wallet.nonce, U256::from(7));
        assert_eq!(snapshot.policy.unwrap().operators, vec![operator]);
    }

    #[tokio::test]
    async fn test_read_failure_is_fatal() {
        let chain = Arc::new(MockChain::with_state(|s| {
            s.owners = vec![address!("0x1111111111111111111111111111111111111111")];
            s.fail_reads = true;
        }));

        let result = SnapshotReader::new(chain).read(SAFE, None).await;
        assert!(matches!(result, Err(Error::ChainRead(_))));
    }

    #[tokio::test]
    async fn test_inconsistent_threshold_rejected() {
        let chain = Arc::new(MockChain::new(
            vec![address!("0x1111111111111111111111111111111111111111")],
            2,
            0,
        ));

        let result = SnapshotReader::new(chain).wallet_state(SAFE).await;
        assert!(matches!(result, Err(Error::ChainRead(_))));
    }
}
