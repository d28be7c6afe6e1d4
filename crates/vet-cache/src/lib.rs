//! Freshness-aware result cache
//!
//! Entries are keyed by fingerprint (entity, provider class, check,
//! locale, degree scope). Freshness state is derived from the entry's
//! windows, never stored. Customer-provided entries are isolated to
//! their customer; paid-external entries are shared platform-wide.

#![warn(missing_docs)]

pub mod entry;
pub mod policy;
pub mod seal;
pub mod store;

pub use entry::{CacheEntry, Fingerprint, FreshnessState, Origin};
pub use policy::{CacheDecision, FreshnessPolicy, StalePolicy};
pub use seal::PayloadSealer;
pub use store::{CacheScope, CacheStats, CacheStore};

use thiserror::Error;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// The write-ahead audit append failed; nothing was written
    #[error("audit write failed: {0}")]
    AuditWriteFailed(#[from] vet_audit::AuditError),

    /// Sealed payload could not be opened
    #[error("payload unseal failed")]
    UnsealFailed,
}
