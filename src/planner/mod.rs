//! Turning desired state into ordered Safe operations
//!
//! ```text
//! Snapshot + desired config ──diff──▶ Vec<Intent>
//!                                          │
//!                                    BatchBuilder ──▶ Vec<PendingOperation>
//! withdrawal request ──WithdrawalPlanner──▶ Vec<Intent>
//! ```

pub mod batch;
pub mod diff;
pub mod intent;
pub mod withdrawal;

pub use batch::{BatchBuilder, PendingOperation};
pub use diff::{diff, DesiredState, OwnerChanges};
pub use intent::{CallTargets, EncodedCall, Intent};
pub use withdrawal::{parse_token_amount, WithdrawalPlan, WithdrawalPlanner, WithdrawalRequest};
