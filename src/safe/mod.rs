//! Safe and module chain boundary
//!
//! ```text
//! RpcChain (alloy) ──implements──▶ SafeChain ◀── MockChain (tests)
//!                                     │
//!                               SnapshotReader ──▶ WalletState / PolicyState
//! ```

pub mod chain;
pub mod contracts;
#[cfg(test)]
pub mod mock;
pub mod snapshot;
pub mod types;

pub use chain::{RpcChain, SafeChain};
pub use snapshot::{Snapshot, SnapshotReader};
pub use types::{GasParams, PolicyState, SubmissionReceipt, TokenInfo, WalletState};
