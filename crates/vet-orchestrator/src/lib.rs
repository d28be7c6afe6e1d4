//! Phased investigation orchestrator
//!
//! Drives Foundation -> Records -> Intelligence -> Network ->
//! Reconciliation over the SAR engine, checkpoints at phase boundaries,
//! assembles versioned profiles, and coordinates erasure.

#![warn(missing_docs)]

pub mod checkpoint;
pub mod investigation;
pub mod phases;
pub mod profile_store;

pub use checkpoint::{CheckpointStore, InvestigationCheckpoint};
pub use investigation::{InvestigationEngine, InvestigationRequest};
pub use phases::Phase;
pub use profile_store::ProfileStore;

use thiserror::Error;

/// Orchestrator errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A profile version arrived out of order
    #[error("profile version {got} is not the expected {expected}")]
    VersionOutOfOrder {
        /// The version that was appended
        got: u32,
        /// The version the store expected
        expected: u32,
    },

    /// A version above 1 arrived without a delta
    #[error("profile version {0} is missing its delta")]
    MissingDelta(u32),

    /// No checkpoint found for the investigation
    #[error("no checkpoint for investigation {0}")]
    NoCheckpoint(vet_common::InvestigationId),
}
