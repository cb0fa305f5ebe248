//! Authorizing and submitting pending operations
//!
//! The execution mode is decided once per run from the signing material in
//! the environment and handed to the [`Coordinator`].

pub mod approval;
pub mod coordinator;
pub mod credentials;
pub mod signatures;

pub use approval::{ApprovalArtifact, CallDescriptor};
pub use coordinator::{Coordinator, ExecutionReport, ExecutionStatus};
pub use credentials::{ExecutionMode, LocalSigners};
pub use signatures::SignatureSet;
