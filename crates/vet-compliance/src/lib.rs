//! Compliance rule engine
//!
//! Declarative rules keyed by (locale, check, role?, tiers, source
//! category) resolve to permit/deny plus restrictions. The engine is
//! consulted twice per demand: pre-query (drop or scope) and
//! post-normalization (field redaction). Same inputs always resolve to
//! the same decision: most specific rule wins, equal specificity falls
//! back to most restrictive.

#![warn(missing_docs)]

pub mod engine;
pub mod rules;

pub use engine::{ComplianceEngine, Decision, DecisionContext, EngineStats};
pub use rules::{ComplianceRule, DenialReason, Restrictions, RuleSet};

use thiserror::Error;

/// Compliance engine errors
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// A rule failed validation on load
    #[error("invalid rule: {0}")]
    InvalidRule(String),
}
