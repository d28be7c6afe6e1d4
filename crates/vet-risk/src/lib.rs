//! Risk scoring and evolution detection
//!
//! The composite score weighs each finding by severity, recency,
//! confidence, and role relevance, dampening network findings by
//! discovery degree. Evolution detection compares consecutive profile
//! versions against a fixed library of rule-based signals.

#![warn(missing_docs)]

pub mod evolution;
pub mod score;

pub use evolution::EvolutionDetector;
pub use score::RiskScorer;
