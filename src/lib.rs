//! Safe multisig and DutchX module lifecycle tool
//!
//! Reconciles a Gnosis Safe and its DutchX policy module with a desired
//! configuration: owners, threshold, operators and whitelisted tokens.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod planner;
pub mod safe;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
