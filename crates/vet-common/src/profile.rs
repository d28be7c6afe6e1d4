//! Versioned entity profiles, deltas, and evolution signals

use crate::{CheckType, Degree, EntityId, Finding, FindingId, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What caused a profile version to be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileTrigger {
    Investigation,
    VigilanceDelta,
    Manual,
}

/// Completion state of the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Complete,
    /// Cancelled or aborted; contains findings committed before the cut
    Partial,
}

/// A connection discovered during network expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub entity_id: EntityId,
    pub relation: String,
    pub link_strength: f64,
    pub degree: Degree,
    pub first_seen: DateTime<Utc>,
}

/// A check that could not run, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedCheck {
    pub check: CheckType,
    pub reason: String,
}

/// Composite risk score with category breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// 0-100
    pub overall: f64,
    pub by_category: HashMap<String, f64>,
    pub band: RiskBand,
}

/// Coarse score band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    Elevated,
    High,
    Critical,
}

impl RiskBand {
    /// Band for an overall 0-100 score
    pub fn for_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => Self::Critical,
            s if s >= 60.0 => Self::High,
            s if s >= 40.0 => Self::Elevated,
            s if s >= 20.0 => Self::Moderate,
            _ => Self::Low,
        }
    }
}

/// Immutable snapshot of findings, score, and connections for an entity
///
/// Versions are append-only and `version` is monotonic per entity.
/// Every version > 1 carries a `delta` referencing the previous version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProfile {
    pub entity_id: EntityId,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub trigger: ProfileTrigger,
    pub status: ProfileStatus,
    pub findings: Vec<Finding>,
    pub risk_score: RiskScore,
    pub connections: Vec<Connection>,
    /// Checks whose findings were served from stale cache entries
    pub stale_sources: Vec<CheckType>,
    pub excluded_checks: Vec<ExcludedCheck>,
    /// Related entities discovered but not investigated (cap overflow)
    pub deferred_network: Vec<EntityId>,
    pub delta: Option<ProfileDelta>,
}

/// A finding whose severity or confidence moved between versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedFinding {
    pub previous: FindingId,
    pub current: FindingId,
    pub severity_before: Severity,
    pub severity_after: Severity,
}

/// Difference between two consecutive profile versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDelta {
    /// The version this delta was computed against
    pub previous_version: u32,
    pub new_findings: Vec<FindingId>,
    pub resolved_findings: Vec<FindingId>,
    pub changed_findings: Vec<ChangedFinding>,
    pub risk_score_change: f64,
    pub connection_count_change: i64,
    pub evolution_signals: Vec<EvolutionSignal>,
}

impl ProfileDelta {
    /// Highest severity among the new findings of this delta
    pub fn max_new_severity(&self, profile: &EntityProfile) -> Option<Severity> {
        profile
            .findings
            .iter()
            .filter(|f| self.new_findings.contains(&f.id))
            .map(|f| f.severity)
            .max()
    }
}

/// Named rule-based pattern detected between profile versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionSignalType {
    NetworkExpansionRapid,
    ShellCompanyBuildup,
    SanctionsAdjacencyNew,
    UndisclosedInterestsNew,
    FinancialDeterioration,
    BehavioralDriftEmployment,
}

impl EvolutionSignalType {
    /// Fixed pattern-signature library key
    pub fn pattern_signature(&self) -> &'static str {
        match self {
            Self::NetworkExpansionRapid => "net.expansion.rapid.v1",
            Self::ShellCompanyBuildup => "fin.shell.buildup.v1",
            Self::SanctionsAdjacencyNew => "net.sanctions.adjacency.v1",
            Self::UndisclosedInterestsNew => "fin.undisclosed.interest.v1",
            Self::FinancialDeterioration => "fin.credit.deterioration.v1",
            Self::BehavioralDriftEmployment => "beh.employment.drift.v1",
        }
    }

    /// Severity assigned when the signal fires
    pub fn severity(&self) -> Severity {
        match self {
            Self::SanctionsAdjacencyNew => Severity::Critical,
            Self::NetworkExpansionRapid
            | Self::ShellCompanyBuildup
            | Self::FinancialDeterioration => Severity::High,
            Self::UndisclosedInterestsNew | Self::BehavioralDriftEmployment => Severity::Medium,
        }
    }
}

/// A fired evolution signal with reviewer feedback flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionSignal {
    pub signal_type: EvolutionSignalType,
    pub confidence: f64,
    pub severity: Severity,
    pub contributing_factors: Vec<String>,
    pub pattern_signature: String,
    /// Analyst feedback: Some(true) confirmed, Some(false) rejected
    pub confirmed: Option<bool>,
}

impl EvolutionSignal {
    /// Build a signal from its type with library signature and severity
    pub fn fire(
        signal_type: EvolutionSignalType,
        confidence: f64,
        contributing_factors: Vec<String>,
    ) -> Self {
        Self {
            signal_type,
            confidence: confidence.clamp(0.0, 1.0),
            severity: signal_type.severity(),
            contributing_factors,
            pattern_signature: signal_type.pattern_signature().to_string(),
            confirmed: None,
        }
    }
}
