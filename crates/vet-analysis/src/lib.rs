//! Inconsistency analysis and deception scoring
//!
//! Inconsistencies collected across sources carry fixed base scores.
//! Pattern modifiers multiply the aggregate: repeated same-field
//! conflicts, cross-field spread, volume, span across information
//! types, and a consistent inflation direction all raise it. The final
//! deception score clamps to [0, 1]; inconsistencies scoring above 0.5
//! emit verification findings.

#![warn(missing_docs)]

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use vet_common::{
    CheckType, Finding, FindingDetails, Provenance, ProviderId, Severity,
};

/// Classified inconsistency kinds with fixed base scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// Dates off by a small margin across sources
    MinorDateDiscrepancy,
    /// An employment or residence gap the subject did not disclose
    HiddenGap,
    /// Employer that no source can corroborate
    FabricatedEmployer,
    /// Overlapping or physically impossible timeline
    ImpossibleTimeline,
    /// Evidence of multiple identities in use
    MultipleIdentities,
    /// Four or more coordinated inconsistencies
    Systematic,
}

impl InconsistencyKind {
    /// Fixed base score
    pub fn base_score(&self) -> f64 {
        match self {
            Self::MinorDateDiscrepancy => 0.1,
            Self::HiddenGap => 0.6,
            Self::FabricatedEmployer => 0.8,
            Self::ImpossibleTimeline => 0.7,
            Self::MultipleIdentities => 0.9,
            Self::Systematic => 0.95,
        }
    }
}

/// Direction of a discrepancy relative to the subject's claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The claim overstates (longer tenure, higher title, better record)
    Inflating,
    /// The claim understates
    Deflating,
}

/// One detected inconsistency between a claim and observed data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    /// The field in conflict (e.g. "employment.end_date")
    pub field: String,
    /// Information type the conflict surfaced in
    pub info_type: CheckType,
    pub claimed: String,
    pub observed: String,
    pub sources: Vec<ProviderId>,
    pub direction: Option<Direction>,
}

/// A pattern modifier that applied to the aggregate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternModifier {
    /// 2-3 conflicts on the same field
    RepeatedSameField,
    /// 2-3 conflicts across different fields
    SpreadAcrossFields,
    /// Four or more conflicts
    HighVolume,
    /// Conflicts spanning three or more information types
    SpansInfoTypes,
    /// Every directional conflict inflates
    DirectionalInflation,
}

impl PatternModifier {
    /// Multiplier applied to the aggregate score
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::RepeatedSameField => 1.3,
            Self::SpreadAcrossFields => 1.5,
            Self::HighVolume => 2.0,
            Self::SpansInfoTypes => 1.5,
            Self::DirectionalInflation => 1.8,
        }
    }
}

/// Deception assessment over a set of inconsistencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeceptionAssessment {
    /// Aggregate deception score, clamped to [0, 1]
    pub score: f64,
    pub modifiers_applied: Vec<PatternModifier>,
    pub inconsistency_count: usize,
}

/// Rule-based deception analyzer
pub struct DeceptionAnalyzer;

impl DeceptionAnalyzer {
    /// Score a set of inconsistencies.
    ///
    /// The aggregate base is the probabilistic union of the individual
    /// base scores; applicable pattern modifiers then multiply it.
    pub fn score(inconsistencies: &[Inconsistency]) -> DeceptionAssessment {
        if inconsistencies.is_empty() {
            return DeceptionAssessment {
                score: 0.0,
                modifiers_applied: Vec::new(),
                inconsistency_count: 0,
            };
        }

        let base = 1.0
            - inconsistencies
                .iter()
                .map(|i| 1.0 - i.kind.base_score())
                .product::<f64>();

        let modifiers = Self::applicable_modifiers(inconsistencies);
        let multiplier: f64 = modifiers.iter().map(|m| m.multiplier()).product();
        let score = (base * multiplier).clamp(0.0, 1.0);

        if score > 0.5 {
            tracing::info!(
                score,
                count = inconsistencies.len(),
                "deception threshold crossed"
            );
        }

        DeceptionAssessment {
            score,
            modifiers_applied: modifiers,
            inconsistency_count: inconsistencies.len(),
        }
    }

    fn applicable_modifiers(inconsistencies: &[Inconsistency]) -> Vec<PatternModifier> {
        let mut modifiers = Vec::new();
        let count = inconsistencies.len();

        let distinct_fields: HashSet<&str> =
            inconsistencies.iter().map(|i| i.field.as_str()).collect();

        if count >= 4 {
            modifiers.push(PatternModifier::HighVolume);
        } else if (2..=3).contains(&count) {
            if distinct_fields.len() == 1 {
                modifiers.push(PatternModifier::RepeatedSameField);
            } else {
                modifiers.push(PatternModifier::SpreadAcrossFields);
            }
        }

        let distinct_types: HashSet<CheckType> =
            inconsistencies.iter().map(|i| i.info_type).collect();
        if distinct_types.len() >= 3 {
            modifiers.push(PatternModifier::SpansInfoTypes);
        }

        let directional: Vec<Direction> = inconsistencies
            .iter()
            .filter_map(|i| i.direction)
            .collect();
        if !directional.is_empty() && directional.iter().all(|d| *d == Direction::Inflating) {
            modifiers.push(PatternModifier::DirectionalInflation);
        }

        modifiers
    }

    /// Emit verification findings for inconsistencies whose individual
    /// contribution crosses the emission threshold.
    pub fn to_findings(
        inconsistencies: &[Inconsistency],
        assessment: &DeceptionAssessment,
        emitted_by: ProviderId,
    ) -> Vec<Finding> {
        inconsistencies
            .iter()
            .filter(|i| i.kind.base_score() > 0.5 || assessment.score > 0.5)
            .map(|i| {
                let weight = i.kind.base_score().max(assessment.score);
                Finding::new(
                    severity_for(weight),
                    weight,
                    Provenance {
                        provider_id: emitted_by.clone(),
                        acquired_at: Utc::now(),
                        cache_hit: false,
                        stale: false,
                    },
                    FindingDetails::Verification {
                        claim: i.claimed.clone(),
                        observed: i.observed.clone(),
                        deception_weight: weight,
                    },
                )
            })
            .collect()
    }
}

/// Severity proportional to the deception weight
fn severity_for(weight: f64) -> Severity {
    match weight {
        w if w >= 0.9 => Severity::Critical,
        w if w >= 0.7 => Severity::High,
        _ => Severity::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inconsistency(
        kind: InconsistencyKind,
        field: &str,
        info_type: CheckType,
        direction: Option<Direction>,
    ) -> Inconsistency {
        Inconsistency {
            kind,
            field: field.into(),
            info_type,
            claimed: "claimed".into(),
            observed: "observed".into(),
            sources: vec![ProviderId::new("src-a"), ProviderId::new("src-b")],
            direction,
        }
    }

    #[test]
    fn test_empty_scores_zero() {
        let a = DeceptionAnalyzer::score(&[]);
        assert_eq!(a.score, 0.0);
        assert!(a.modifiers_applied.is_empty());
    }

    #[test]
    fn test_single_minor_discrepancy_is_benign() {
        let set = [inconsistency(
            InconsistencyKind::MinorDateDiscrepancy,
            "employment.start_date",
            CheckType::Employment,
            None,
        )];
        let a = DeceptionAnalyzer::score(&set);
        assert!(a.score < 0.2);
        assert!(a.modifiers_applied.is_empty());
    }

    #[test]
    fn test_same_field_modifier() {
        let set = [
            inconsistency(
                InconsistencyKind::MinorDateDiscrepancy,
                "employment.end_date",
                CheckType::Employment,
                None,
            ),
            inconsistency(
                InconsistencyKind::HiddenGap,
                "employment.end_date",
                CheckType::Employment,
                None,
            ),
        ];
        let a = DeceptionAnalyzer::score(&set);
        assert!(a
            .modifiers_applied
            .contains(&PatternModifier::RepeatedSameField));
        // base = 1 - 0.9*0.4 = 0.64; x1.3 = 0.832
        assert!((a.score - 0.832).abs() < 1e-9);
    }

    #[test]
    fn test_volume_and_span_modifiers_stack() {
        let set = [
            inconsistency(
                InconsistencyKind::HiddenGap,
                "employment.history",
                CheckType::Employment,
                Some(Direction::Inflating),
            ),
            inconsistency(
                InconsistencyKind::FabricatedEmployer,
                "employment.employer",
                CheckType::Employment,
                Some(Direction::Inflating),
            ),
            inconsistency(
                InconsistencyKind::ImpossibleTimeline,
                "education.dates",
                CheckType::Education,
                Some(Direction::Inflating),
            ),
            inconsistency(
                InconsistencyKind::MinorDateDiscrepancy,
                "identity.dob",
                CheckType::Identity,
                Some(Direction::Inflating),
            ),
        ];
        let a = DeceptionAnalyzer::score(&set);
        assert!(a.modifiers_applied.contains(&PatternModifier::HighVolume));
        assert!(a.modifiers_applied.contains(&PatternModifier::SpansInfoTypes));
        assert!(a
            .modifiers_applied
            .contains(&PatternModifier::DirectionalInflation));
        assert_eq!(a.score, 1.0);
    }

    #[test]
    fn test_mixed_direction_blocks_inflation_modifier() {
        let set = [
            inconsistency(
                InconsistencyKind::HiddenGap,
                "a",
                CheckType::Employment,
                Some(Direction::Inflating),
            ),
            inconsistency(
                InconsistencyKind::HiddenGap,
                "b",
                CheckType::Civil,
                Some(Direction::Deflating),
            ),
        ];
        let a = DeceptionAnalyzer::score(&set);
        assert!(!a
            .modifiers_applied
            .contains(&PatternModifier::DirectionalInflation));
    }

    #[test]
    fn test_findings_emitted_above_threshold() {
        let set = [
            inconsistency(
                InconsistencyKind::FabricatedEmployer,
                "employment.employer",
                CheckType::Employment,
                None,
            ),
            inconsistency(
                InconsistencyKind::MinorDateDiscrepancy,
                "identity.dob",
                CheckType::Identity,
                None,
            ),
        ];
        let a = DeceptionAnalyzer::score(&set);
        let findings =
            DeceptionAnalyzer::to_findings(&set, &a, ProviderId::new("reconciliation"));
        // aggregate crossed 0.5, so both emit; severities track weight
        assert_eq!(findings.len(), 2);
        for f in &findings {
            assert_eq!(f.category, vet_common::FindingCategory::Verification);
            assert!(f.severity >= Severity::Medium);
        }
    }
}
