//! OpenVet Common - Shared types for the investigation core
//!
//! This crate provides the vocabulary shared by every subsystem:
//! - Check types, tiers, locales, degrees, roles
//! - The Finding model and versioned entity profiles
//! - Service / SAR / limits / retry configuration
//! - Investigation-level error kinds and the cancellation signal

#![warn(missing_docs)]

pub mod check;
pub mod config;
pub mod error;
pub mod finding;
pub mod profile;
pub mod task;

pub use check::*;
pub use config::*;
pub use error::*;
pub use finding::*;
pub use profile::*;
pub use task::*;

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counter for subsystem statistics
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create counter with initial value
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Increment by one
    #[inline(always)]
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a value
    #[inline(always)]
    pub fn add(&self, value: u64) -> u64 {
        self.0.fetch_add(value, Ordering::Relaxed)
    }

    /// Get current value
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Newtype ids used across the platform
pub mod ids {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    macro_rules! id_type {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub Uuid);

            impl $name {
                /// Generate a fresh id
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    self.0.fmt(f)
                }
            }
        };
    }

    id_type!(
        /// Canonical entity identifier
        EntityId
    );
    id_type!(
        /// Investigation (screening) identifier
        InvestigationId
    );
    id_type!(
        /// Customer (platform tenant) identifier
        CustomerId
    );
    id_type!(
        /// Finding identifier
        FindingId
    );
    id_type!(
        /// Human review task identifier
        ReviewTaskId
    );

    /// Provider identifier - stable registry name, not a uuid
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ProviderId(pub String);

    impl ProviderId {
        /// Build from a registry name
        pub fn new(name: impl Into<String>) -> Self {
            Self(name.into())
        }
    }

    impl std::fmt::Display for ProviderId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }
}

pub use ids::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let c = AtomicCounter::new(0);
        c.inc();
        c.add(5);
        assert_eq!(c.get(), 6);
    }

    #[test]
    fn test_id_roundtrip() {
        let id = EntityId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
