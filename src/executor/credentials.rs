//! Signing material
//!
//! Reads owner keys from the environment (`MNEMONIC` or `PK`) and decides the
//! run's execution mode once: keys present means local signing, no keys means
//! manual approval.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Env var holding a BIP-39 seed phrase
pub const MNEMONIC_ENV: &str = "MNEMONIC";

/// Env var holding comma-separated hex private keys
pub const PRIVATE_KEYS_ENV: &str = "PK";

/// Accounts derived from a mnemonic (m/44'/60'/0'/0/0..10)
pub const MNEMONIC_ACCOUNTS: u32 = 10;

/// Locally held owner keys
#[derive(Clone)]
pub struct LocalSigners {
    signers: Vec<PrivateKeySigner>,
}

impl LocalSigners {
    /// Derive the first [`MNEMONIC_ACCOUNTS`] accounts from a seed phrase
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let phrase = phrase.trim();
        let mut signers = Vec::with_capacity(MNEMONIC_ACCOUNTS as usize);

        for index in 0..MNEMONIC_ACCOUNTS {
            let signer = MnemonicBuilder::<English>::default()
                .phrase(phrase)
                .index(index)
                .and_then(|builder| builder.build())
                .map_err(|e| Error::InvalidKey(format!("mnemonic account {}: {}", index, e)))?;
            signers.push(signer);
        }

        debug!("Derived {} accounts from mnemonic", signers.len());
        Ok(Self { signers })
    }

    /// Parse a comma-separated list of hex private keys
    pub fn from_private_keys(keys: &str) -> Result<Self> {
        let signers = keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .enumerate()
            .map(|(i, key)| {
                PrivateKeySigner::from_str(key)
                    .map_err(|e| Error::InvalidKey(format!("private key #{}: {}", i, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        if signers.is_empty() {
            return Err(Error::InvalidKey(format!("{} is set but holds no keys", PRIVATE_KEYS_ENV)));
        }

        Ok(Self { signers })
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn as_slice(&self) -> &[PrivateKeySigner] {
        &self.signers
    }

    /// Account that pays for submissions
    pub fn payer(&self) -> Option<&PrivateKeySigner> {
        self.signers.first()
    }

    /// Local keys that are current owners, in key order
    pub fn eligible(&self, owners: &[Address]) -> Vec<&PrivateKeySigner> {
        self.signers
            .iter()
            .filter(|s| owners.contains(&s.address()))
            .collect()
    }
}

impl From<Vec<PrivateKeySigner>> for LocalSigners {
    fn from(signers: Vec<PrivateKeySigner>) -> Self {
        Self { signers }
    }
}

impl fmt::Debug for LocalSigners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.addresses()).finish()
    }
}

/// How a batch gets authorized
#[derive(Debug, Clone)]
pub enum ExecutionMode {
    /// Sign with local owner keys and submit each operation
    LocalSigning(LocalSigners),

    /// Print approval artifacts for owners to relay themselves
    ManualApproval,
}

impl ExecutionMode {
    /// Choose the mode from `MNEMONIC` / `PK` in the environment
    pub fn from_env() -> Result<Self> {
        let mnemonic = std::env::var(MNEMONIC_ENV).ok();
        let keys = std::env::var(PRIVATE_KEYS_ENV).ok();
        Self::from_material(mnemonic.as_deref(), keys.as_deref())
    }

    /// Choose the mode from raw signing material; a mnemonic wins over keys
    pub fn from_material(mnemonic: Option<&str>, keys: Option<&str>) -> Result<Self> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.filter(|s| !s.trim().is_empty())
        }

        let mode = if let Some(phrase) = present(mnemonic) {
            ExecutionMode::LocalSigning(LocalSigners::from_mnemonic(phrase)?)
        } else if let Some(keys) = present(keys) {
            ExecutionMode::LocalSigning(LocalSigners::from_private_keys(keys)?)
        } else {
            ExecutionMode::ManualApproval
        };

        match &mode {
            ExecutionMode::LocalSigning(signers) => {
                info!("Local signing with {} key/s", signers.len())
            }
            ExecutionMode::ManualApproval => {
                info!("No signing keys configured, using manual approval")
            }
        }

        Ok(mode)
    }

    pub fn signers(&self) -> Option<&LocalSigners> {
        match self {
            ExecutionMode::LocalSigning(signers) => Some(signers),
            ExecutionMode::ManualApproval => None,
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, ExecutionMode::ManualApproval)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::LocalSigning(_) => write!(f, "local signing"),
            ExecutionMode::ManualApproval => write!(f, "manual approval"),
        }
    }
}
