//! Investigation-level error kinds

use crate::{CheckType, ConsentScope, ProviderId};
use thiserror::Error;

/// Configuration validation failure
#[derive(Debug, Clone, Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Build from a message
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Investigation error type
#[derive(Debug, Error)]
pub enum VetError {
    /// Fatal: the subject's identity could not be verified
    #[error("identity unverified")]
    IdentityUnverified,

    /// A compliance rule denied the check
    #[error("compliance blocked {check}: {reason}")]
    ComplianceBlocked { check: CheckType, reason: String },

    /// Required consent scope was not granted
    #[error("consent missing: {0:?}")]
    ConsentMissing(ConsentScope),

    /// Provider circuit open or no candidate available
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(ProviderId),

    /// Provider call exceeded its timeout
    #[error("provider timeout: {0}")]
    ProviderTimeout(ProviderId),

    /// Provider rate limit exhausted
    #[error("provider rate limited: {0}")]
    ProviderRateLimited(ProviderId),

    /// No provider could serve the check
    #[error("no source available for {0}")]
    NoSourceAvailable(CheckType),

    /// Stale entry blocked and refresh has not landed
    #[error("stale data blocked for {0}")]
    StaleBlocked(CheckType),

    /// Persistent refresh failure surfaced to the caller
    #[error("data stale for {0}")]
    DataStale(CheckType),

    /// Fuzzy match landed in the ambiguous band
    #[error("entity ambiguous (score {score:.2})")]
    EntityAmbiguous { score: f64 },

    /// Another writer owns the fingerprint; follower must await
    #[error("cache write conflict")]
    CacheWriteConflict,

    /// Cooperative cancellation observed
    #[error("cancelled")]
    Cancelled,

    /// Absolute deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Audit append failed - the guarded transition must abort
    #[error("audit write failed: {0}")]
    AuditWriteFailed(String),

    /// Orchestration-level failure (missing checkpoint, store misuse)
    #[error("orchestration: {0}")]
    Orchestration(String),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Serialization failure in checkpoint or export paths
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VetError {
    /// Errors worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout(_) | Self::ProviderRateLimited(_) | Self::CacheWriteConflict
        )
    }
}

/// Result alias for investigation operations
pub type VetResult<T> = Result<T, VetError>;
