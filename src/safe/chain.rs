//! Chain handle
//!
//! Every component that needs chain access receives an `Arc<dyn SafeChain>`
//! built once per run. `RpcChain` is the JSON-RPC implementation on top of
//! alloy providers and the `sol!` bindings in [`super::contracts`].

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

use super::contracts::{
    IDutchExchange, IDutchXModule, IGnosisSafe, IProxyFactory, IToken, OPERATION_CALL,
};
use super::types::{GasParams, SubmissionReceipt, TokenInfo};

/// Fixed method surface of the Safe, the module, the exchange and tokens
#[async_trait]
pub trait SafeChain: Send + Sync {
    /// Chain id of the connected network
    async fn chain_id(&self) -> Result<u64>;

    /// Safe owners in linked-list order
    async fn owners(&self, safe: Address) -> Result<Vec<Address>>;

    /// Safe confirmation threshold
    async fn threshold(&self, safe: Address) -> Result<u64>;

    /// Safe nonce
    async fn nonce(&self, safe: Address) -> Result<U256>;

    /// Modules enabled on the Safe
    async fn modules(&self, safe: Address) -> Result<Vec<Address>>;

    /// Operators whitelisted by the module
    async fn whitelisted_operators(&self, module: Address) -> Result<Vec<Address>>;

    /// Tokens whitelisted by the module
    async fn whitelisted_tokens(&self, module: Address) -> Result<Vec<Address>>;

    /// Safe-computed hash of a CALL operation at `nonce`
    async fn transaction_hash(
        &self,
        safe: Address,
        to: Address,
        value: U256,
        data: Bytes,
        nonce: U256,
    ) -> Result<B256>;

    /// Submit `execTransaction` and wait for the receipt
    async fn exec_transaction(
        &self,
        safe: Address,
        to: Address,
        value: U256,
        data: Bytes,
        signatures: Bytes,
        gas: GasParams,
    ) -> Result<SubmissionReceipt>;

    /// Token symbol and decimals
    async fn token_info(&self, token: Address) -> Result<TokenInfo>;

    /// Token balance of `holder`
    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256>;

    /// Balance of `token` held for `holder` by the custody contract
    async fn custody_balance(&self, custody: Address, holder: Address, token: Address)
        -> Result<U256>;

    /// Deploy a proxy of `master_copy` initialised with `init`, returning its address
    async fn create_proxy(
        &self,
        factory: Address,
        master_copy: Address,
        init: Bytes,
        gas: GasParams,
    ) -> Result<Address>;
}

/// JSON-RPC chain handle
pub struct RpcChain {
    provider: DynProvider,
}

impl RpcChain {
    /// Connect to `url`; submissions are paid by the first signer, if any
    pub fn connect(url: &str, signers: &[PrivateKeySigner]) -> Result<Self> {
        let url: Url = url
            .parse()
            .map_err(|e| Error::Validation(format!("ethereumURL is not a valid URL: {}", e)))?;

        let provider = match signers.split_first() {
            Some((payer, rest)) => {
                let mut wallet = EthereumWallet::from(payer.clone());
                for signer in rest {
                    wallet.register_signer(signer.clone());
                }
                info!("Submissions will be sent from {}", payer.address());
                ProviderBuilder::new().wallet(wallet).connect_http(url).erased()
            }
            None => ProviderBuilder::new().connect_http(url).erased(),
        };

        Ok(Self { provider })
    }
}

#[async_trait]
impl SafeChain for RpcChain {
    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| {
                Error::ChainRead(format!("ethereumURL must be an Ethereum RPC node: {}", e))
            })
    }

    async fn owners(&self, safe: Address) -> Result<Vec<Address>> {
        let safe = IGnosisSafe::new(safe, self.provider.clone());
        Ok(safe.getOwners().call().await?)
    }

    async fn threshold(&self, safe: Address) -> Result<u64> {
        let safe = IGnosisSafe::new(safe, self.provider.clone());
        let threshold = safe.getThreshold().call().await?;
        u64::try_from(threshold)
            .map_err(|_| Error::ChainRead(format!("threshold out of range: {}", threshold)))
    }

    async fn nonce(&self, safe: Address) -> Result<U256> {
        let safe = IGnosisSafe::new(safe, self.provider.clone());
        Ok(safe.nonce().call().await?)
    }

    async fn modules(&self, safe: Address) -> Result<Vec<Address>> {
        let safe = IGnosisSafe::new(safe, self.provider.clone());
        Ok(safe.getModules().call().await?)
    }

    async fn whitelisted_operators(&self, module: Address) -> Result<Vec<Address>> {
        let module = IDutchXModule::new(module, self.provider.clone());
        Ok(module.getWhitelistedOperators().call().await?)
    }

    async fn whitelisted_tokens(&self, module: Address) -> Result<Vec<Address>> {
        let module = IDutchXModule::new(module, self.provider.clone());
        Ok(module.getWhitelistedTokens().call().await?)
    }

    async fn transaction_hash(
        &self,
        safe: Address,
        to: Address,
        value: U256,
        data: Bytes,
        nonce: U256,
    ) -> Result<B256> {
        let safe = IGnosisSafe::new(safe, self.provider.clone());
        let hash = safe
            .getTransactionHash(
                to,
                value,
                data,
                OPERATION_CALL,
                U256::ZERO,
                U256::ZERO,
                U256::ZERO,
                Address::ZERO,
                Address::ZERO,
                nonce,
            )
            .call()
            .await?;
        Ok(hash)
    }

    async fn exec_transaction(
        &self,
        safe: Address,
        to: Address,
        value: U256,
        data: Bytes,
        signatures: Bytes,
        gas: GasParams,
    ) -> Result<SubmissionReceipt> {
        let safe = IGnosisSafe::new(safe, self.provider.clone());
        let mut call = safe
            .execTransaction(
                to,
                value,
                data,
                OPERATION_CALL,
                U256::ZERO,
                U256::ZERO,
                U256::ZERO,
                Address::ZERO,
                Address::ZERO,
                signatures,
            )
            .gas(gas.gas);
        if let Some(price) = gas.gas_price {
            call = call.gas_price(price as u128);
        }

        let pending = call
            .send()
            .await
            .map_err(|e| Error::ChainWrite(format!("execTransaction failed: {}", e)))?;
        let tx_hash = *pending.tx_hash();
        debug!("execTransaction sent: {}", tx_hash);

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| {
                Error::ChainWrite(format!("execTransaction {} not confirmed: {}", tx_hash, e))
            })?;

        Ok(SubmissionReceipt {
            tx_hash,
            success: receipt.status() && !execution_failed(&receipt),
        })
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo> {
        let instance = IToken::new(token, self.provider.clone());
        let symbol = instance.symbol().call().await?;
        let decimals = instance.decimals().call().await?;
        Ok(TokenInfo {
            address: token,
            symbol,
            decimals,
        })
    }

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256> {
        let instance = IToken::new(token, self.provider.clone());
        Ok(instance.balanceOf(holder).call().await?)
    }

    async fn custody_balance(
        &self,
        custody: Address,
        holder: Address,
        token: Address,
    ) -> Result<U256> {
        let exchange = IDutchExchange::new(custody, self.provider.clone());
        Ok(exchange.balances(holder, token).call().await?)
    }

    async fn create_proxy(
        &self,
        factory: Address,
        master_copy: Address,
        init: Bytes,
        gas: GasParams,
    ) -> Result<Address> {
        let factory = IProxyFactory::new(factory, self.provider.clone());
        let mut call = factory.createProxy(master_copy, init).gas(gas.gas);
        if let Some(price) = gas.gas_price {
            call = call.gas_price(price as u128);
        }

        let receipt = call
            .send()
            .await
            .map_err(|e| Error::ChainWrite(format!("createProxy failed: {}", e)))?
            .get_receipt()
            .await
            .map_err(|e| Error::ChainWrite(format!("createProxy not confirmed: {}", e)))?;

        if !receipt.status() {
            return Err(Error::ChainWrite(format!(
                "createProxy reverted in tx {}",
                receipt.transaction_hash
            )));
        }

        let proxy = receipt
            .inner
            .logs()
            .iter()
            .find_map(|log| log.log_decode::<IProxyFactory::ProxyCreation>().ok())
            .map(|log| log.inner.data.proxy)
            .ok_or_else(|| {
                Error::ChainWrite(format!(
                    "no ProxyCreation event in tx {}",
                    receipt.transaction_hash
                ))
            })?;

        info!("Proxy {} created in tx {}", proxy, receipt.transaction_hash);
        Ok(proxy)
    }
}

/// Safe versions that catch inner failures report them through an event
fn execution_failed(receipt: &TransactionReceipt) -> bool {
    receipt
        .inner
        .logs()
        .iter()
        .any(|log| log.log_decode::<IGnosisSafe::ExecutionFailed>().is_ok())
}
