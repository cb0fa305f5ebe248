//! Configuration loading, validation and persistence
//!
//! The configuration document is the desired state of the Safe and its
//! module plus the operational parameters of a run. It is read once per run,
//! validated into typed addresses, and written back only when a command
//! deploys a contract whose address must be remembered.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use alloy::primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::safe::types::GasParams;

/// Default path of the configuration document
pub const DEFAULT_CONF_PATH: &str = "conf/conf.json";

/// Main configuration structure (desired state + run parameters)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Desired Safe owners
    pub owners: Vec<Address>,

    /// Desired number of confirmations
    pub safe_threshold: u64,

    /// Desired whitelisted module operators
    #[serde(default)]
    pub operators: Vec<Address>,

    /// Desired whitelisted tokens
    #[serde(default)]
    pub whitelisted_tokens: Vec<Address>,

    /// Module flavour deployed by `create` / `update-module`
    #[serde(default)]
    pub module_type: ModuleType,

    /// Safe proxy address, empty until created
    #[serde(default)]
    pub safe: ContractAddress,

    /// Module proxy address, empty until created
    #[serde(default)]
    pub dx_module: ContractAddress,

    /// Gas price in wei for submitted transactions (node default if unset)
    #[serde(default)]
    pub gas_price: Option<u64>,

    /// Gas limit for submitted transactions
    #[serde(default = "default_gas")]
    pub gas: u64,

    /// Ethereum JSON-RPC endpoint
    #[serde(rename = "ethereumURL")]
    pub ethereum_url: String,

    /// Owners expected to approve offline (manual approval mode)
    #[serde(default)]
    pub owners_to_sign: Vec<Address>,

    /// Exchange contract holding module-custodied balances
    #[serde(default)]
    pub dx_proxy: ContractAddress,

    /// Proxy factory used by `create` / `update-module`
    #[serde(default)]
    pub proxy_factory: ContractAddress,

    /// Safe master copy
    #[serde(default)]
    pub safe_master_copy: ContractAddress,

    /// Seller module master copy
    #[serde(default)]
    pub seller_module_master_copy: ContractAddress,

    /// Complete module master copy
    #[serde(default)]
    pub complete_module_master_copy: ContractAddress,
}

fn default_gas() -> u64 {
    1_000_000
}

/// Module flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    /// Operators may only sell whitelisted tokens
    Seller,

    /// Operators may trade whitelisted tokens freely
    #[default]
    Complete,
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleType::Seller => write!(f, "seller"),
            ModuleType::Complete => write!(f, "complete"),
        }
    }
}

/// A contract slot that is either not created yet or holds a deployed address
///
/// On disk an uncreated slot is an empty string (or absent).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContractAddress {
    #[default]
    Uncreated,
    Deployed(Address),
}

impl ContractAddress {
    pub fn address(&self) -> Option<Address> {
        match self {
            ContractAddress::Uncreated => None,
            ContractAddress::Deployed(address) => Some(*address),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ContractAddress::Deployed(_))
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractAddress::Uncreated => write!(f, "(not created)"),
            ContractAddress::Deployed(address) => write!(f, "{}", address),
        }
    }
}

impl Serialize for ContractAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ContractAddress::Uncreated => serializer.serialize_str(""),
            ContractAddress::Deployed(address) => {
                serializer.serialize_str(&address.to_checksum(None))
            }
        }
    }
}

impl<'de> Deserialize<'de> for ContractAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(ContractAddress::Uncreated),
            Some(s) => s
                .parse::<Address>()
                .map(ContractAddress::Deployed)
                .map_err(|e| serde::de::Error::custom(format!("invalid address {}: {}", s, e))),
        }
    }
}

impl Config {
    /// Load configuration from a JSON document and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Using {} as configuration file", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Config = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Write the configuration back to disk (used after deployments)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize configuration: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.owners.is_empty() {
            return Err(Error::Validation(
                "owners must contain at least 1 Ethereum address".to_string(),
            ));
        }

        ensure_unique("owners", &self.owners)?;
        ensure_unique("operators", &self.operators)?;
        ensure_unique("whitelistedTokens", &self.whitelisted_tokens)?;
        ensure_unique("ownersToSign", &self.owners_to_sign)?;

        if self.safe_threshold == 0 {
            return Err(Error::Validation("safeThreshold must be at least 1".to_string()));
        }

        if self.safe_threshold > self.owners.len() as u64 {
            return Err(Error::Validation(format!(
                "safeThreshold {} exceeds the number of owners ({})",
                self.safe_threshold,
                self.owners.len()
            )));
        }

        if self.gas == 0 {
            return Err(Error::Validation("gas must be positive".to_string()));
        }

        let url = url::Url::parse(&self.ethereum_url)
            .map_err(|e| Error::Validation(format!("ethereumURL is not a valid URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Validation(format!(
                "ethereumURL must be an http(s) endpoint, got {}",
                url.scheme()
            )));
        }

        if self.gas_price.is_none() {
            warn!("gasPrice not set - the node's gas price will be used");
        }

        Ok(())
    }

    /// Gas limit and price for submissions
    pub fn gas_params(&self) -> GasParams {
        GasParams {
            gas: self.gas,
            gas_price: self.gas_price,
        }
    }

    /// Safe address, required by every command operating on an existing Safe
    pub fn require_safe(&self) -> Result<Address> {
        self.safe
            .address()
            .ok_or_else(|| {
                Error::Validation("safe address required (run `create` first)".to_string())
            })
    }

    /// Module address, required by commands operating on the module
    pub fn require_module(&self) -> Result<Address> {
        self.dx_module.address().ok_or_else(|| {
            Error::Validation(
                "dxModule address required (run `create` or `update-module` first)".to_string(),
            )
        })
    }

    /// Exchange contract holding module-custodied balances
    pub fn require_custody(&self) -> Result<Address> {
        self.dx_proxy
            .address()
            .ok_or_else(|| Error::Validation("dxProxy address required".to_string()))
    }

    /// Proxy factory used for deployments
    pub fn require_factory(&self) -> Result<Address> {
        self.proxy_factory
            .address()
            .ok_or_else(|| Error::Validation("proxyFactory address required".to_string()))
    }

    /// Master copy for the configured module type
    pub fn require_module_master_copy(&self) -> Result<Address> {
        let slot = match self.module_type {
            ModuleType::Seller => &self.seller_module_master_copy,
            ModuleType::Complete => &self.complete_module_master_copy,
        };
        slot.address().ok_or_else(|| {
            Error::Validation(format!("{} module master copy address required", self.module_type))
        })
    }

    /// Owners expected to approve offline, validated against a threshold
    pub fn require_owners_to_sign(&self, threshold: u64) -> Result<Vec<Address>> {
        if (self.owners_to_sign.len() as u64) < threshold {
            return Err(Error::Validation(format!(
                "ownersToSign must list at least {} owner/s, got {}",
                threshold,
                self.owners_to_sign.len()
            )));
        }
        Ok(self.owners_to_sign.clone())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    ethereumURL: {}
    gas: {}
    gasPrice: {}
  Safe:
    address: {}
    threshold: {}
    owners: {:?}
    ownersToSign: {:?}
  Module:
    type: {}
    address: {}
    operators: {:?}
    whitelistedTokens: {:?}
  Deployment:
    dxProxy: {}
    proxyFactory: {}
    safeMasterCopy: {}
    sellerModuleMasterCopy: {}
    completeModuleMasterCopy: {}
"#,
            mask_url(&self.ethereum_url),
            self.gas,
            self.gas_price
                .map(|p| p.to_string())
                .unwrap_or_else(|| "(node default)".to_string()),
            self.safe,
            self.safe_threshold,
            self.owners,
            self.owners_to_sign,
            self.module_type,
            self.dx_module,
            self.operators,
            self.whitelisted_tokens,
            self.dx_proxy,
            self.proxy_factory,
            self.safe_master_copy,
            self.seller_module_master_copy,
            self.complete_module_master_copy,
        )
    }
}

fn ensure_unique(field: &str, addresses: &[Address]) -> Result<()> {
    let mut seen = HashSet::with_capacity(addresses.len());
    for address in addresses {
        if !seen.insert(address) {
            return Err(Error::Validation(format!(
                "{} contains duplicate address {}",
                field, address
            )));
        }
    }
    Ok(())
}

/// Mask URL for display (hide API keys in paths, query params and userinfo)
fn mask_url(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return "***".to_string();
    };

    let mut masked = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or(""));
    if let Some(port) = parsed.port() {
        masked.push_str(&format!(":{}", port));
    }
    if parsed.path().len() > 1 {
        masked.push_str("/***");
    }
    if parsed.query().is_some() {
        masked.push_str("?***");
    }
    masked
}
