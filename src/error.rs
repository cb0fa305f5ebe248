//! Error types for the Safe/module lifecycle tool

use alloy::primitives::U256;
use thiserror::Error;

use crate::executor::ExecutionReport;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Safe/module lifecycle tool
#[derive(Error, Debug)]
pub enum Error {
    // Desired configuration errors (always detected before touching the chain)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    // Authority errors
    #[error("Insufficient authorized signers: {available} owner key/s available, {required} required")]
    InsufficientSigners { available: usize, required: u64 },

    #[error("Insufficient funds across both custody locations: {available} available, {required} required (base units of {symbol})")]
    InsufficientFunds {
        available: U256,
        required: U256,
        symbol: String,
    },

    // Chain errors
    #[error("Chain read failed: {0}")]
    ChainRead(String),

    #[error("Chain write failed: {0}")]
    ChainWrite(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    // Batch execution errors
    #[error("Batch partially executed: {}", .0.summary())]
    PartialBatchExecution(Box<ExecutionReport>),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is a shortfall of signing authority or funds
    pub fn is_insufficient_authority(&self) -> bool {
        matches!(
            self,
            Error::InsufficientSigners { .. } | Error::InsufficientFunds { .. }
        )
    }

    /// Check if this error aborted the run before any chain write committed
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::PartialBatchExecution(_))
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

// Conversion from contract binding errors (reads and calls through sol! bindings)
impl From<alloy::contract::Error> for Error {
    fn from(e: alloy::contract::Error) -> Self {
        Error::ChainRead(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_classification() {
        let signers = Error::InsufficientSigners {
            available: 1,
            required: 2,
        };
        assert!(signers.is_insufficient_authority());
        assert!(signers.is_fatal());

        let funds = Error::InsufficientFunds {
            available: U256::from(5),
            required: U256::from(10),
            symbol: "WETH".to_string(),
        };
        assert!(funds.is_insufficient_authority());

        assert!(!Error::ChainRead("timeout".to_string()).is_insufficient_authority());
    }

    #[test]
    fn test_shortfall_is_surfaced_in_message() {
        let err = Error::InsufficientSigners {
            available: 1,
            required: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("1 owner key/s available"));
        assert!(msg.contains("3 required"));
    }
}
