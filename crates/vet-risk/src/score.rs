//! Composite risk scoring

use chrono::Utc;
use std::collections::HashMap;
use vet_common::{Finding, FindingCategory, FindingDetails, RiskBand, RiskScore, RoleCategory};

/// Half-life of a finding's contribution, in days
const RECENCY_HALF_LIFE_DAYS: f64 = 365.0;

/// Scale factor from summed contributions to the 0-100 range
const SCALE: f64 = 28.0;

/// Role-weighted composite risk scorer
pub struct RiskScorer {
    role: RoleCategory,
}

impl RiskScorer {
    /// Scorer for a subject role
    pub fn new(role: RoleCategory) -> Self {
        Self { role }
    }

    /// Weight a category for the configured role
    pub fn category_weight(&self, category: FindingCategory) -> f64 {
        use FindingCategory::*;
        let base = match category {
            Criminal => 1.0,
            Regulatory => 0.9,
            Financial => 0.7,
            Verification => 0.8,
            Civil => 0.6,
            Network => 0.5,
            Reputation => 0.5,
            Behavioral => 0.4,
            Identity => 0.6,
        };
        // role emphasis
        let emphasis = match (self.role, category) {
            (RoleCategory::Finance, Financial) => 1.5,
            (RoleCategory::Finance, Regulatory) => 1.4,
            (RoleCategory::Healthcare, Behavioral) => 1.4,
            (RoleCategory::Healthcare, Criminal) => 1.2,
            (RoleCategory::Executive, Reputation) => 1.4,
            (RoleCategory::Executive, Network) => 1.3,
            (RoleCategory::Government, Regulatory) => 1.5,
            (RoleCategory::Government, Network) => 1.3,
            _ => 1.0,
        };
        base * emphasis
    }

    /// One finding's contribution to the composite
    pub fn contribution(&self, finding: &Finding) -> f64 {
        let age_days = (Utc::now() - finding.provenance.acquired_at).num_days() as f64;
        let recency = 0.5f64.powf(age_days.max(0.0) / RECENCY_HALF_LIFE_DAYS);

        let dampening = match &finding.details {
            FindingDetails::Network { degree, .. } => degree.dampening(),
            _ => 1.0,
        };

        finding.severity.weight()
            * recency
            * finding.confidence
            * self.category_weight(finding.category)
            * dampening
    }

    /// Composite 0-100 score with a per-category breakdown
    pub fn score(&self, findings: &[Finding]) -> RiskScore {
        let mut by_category: HashMap<String, f64> = HashMap::new();
        let mut total = 0.0;

        for finding in findings {
            let contribution = self.contribution(finding);
            total += contribution;
            *by_category
                .entry(format!("{:?}", finding.category).to_lowercase())
                .or_insert(0.0) += contribution;
        }

        // saturating map to 0-100
        let overall = 100.0 * (1.0 - (-total / (SCALE / 10.0)).exp());
        let overall = (overall * 10.0).round() / 10.0;

        RiskScore {
            overall,
            by_category,
            band: RiskBand::for_score(overall),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vet_common::{Degree, EntityId, Provenance, ProviderId, Severity};

    fn finding(severity: Severity, details: FindingDetails, age_days: i64) -> Finding {
        let mut f = Finding::new(
            severity,
            0.9,
            Provenance {
                provider_id: ProviderId::new("test"),
                acquired_at: Utc::now() - chrono::Duration::days(age_days),
                cache_hit: false,
                stale: false,
            },
            details,
        );
        f.confidence = 0.9;
        f
    }

    fn criminal(severity: Severity, age_days: i64) -> Finding {
        finding(
            severity,
            FindingDetails::Criminal {
                offense: "fraud".into(),
                jurisdiction: "US-NY".into(),
                disposition: "convicted".into(),
                offense_date: None,
            },
            age_days,
        )
    }

    #[test]
    fn test_empty_findings_score_low() {
        let scorer = RiskScorer::new(RoleCategory::General);
        let score = scorer.score(&[]);
        assert_eq!(score.overall, 0.0);
        assert_eq!(score.band, RiskBand::Low);
    }

    #[test]
    fn test_severity_orders_contributions() {
        let scorer = RiskScorer::new(RoleCategory::General);
        let low = scorer.contribution(&criminal(Severity::Low, 0));
        let critical = scorer.contribution(&criminal(Severity::Critical, 0));
        assert!(critical > low * 2.0);
    }

    #[test]
    fn test_recency_decays() {
        let scorer = RiskScorer::new(RoleCategory::General);
        let fresh = scorer.contribution(&criminal(Severity::High, 0));
        let old = scorer.contribution(&criminal(Severity::High, 730));
        assert!(old < fresh / 3.0);
    }

    #[test]
    fn test_finance_role_weighs_financial_higher() {
        let financial = finding(
            Severity::High,
            FindingDetails::Financial {
                event: vet_common::FinancialEvent::Bankruptcy,
                amount: None,
                currency: None,
                reported_at: None,
            },
            0,
        );
        let general = RiskScorer::new(RoleCategory::General).contribution(&financial);
        let finance = RiskScorer::new(RoleCategory::Finance).contribution(&financial);
        assert!(finance > general);
    }

    #[test]
    fn test_network_findings_dampened_by_degree() {
        let make = |degree| {
            finding(
                Severity::High,
                FindingDetails::Network {
                    related_entity: EntityId::new(),
                    relation: "associate".into(),
                    degree,
                    link_strength: 0.8,
                },
                0,
            )
        };
        let scorer = RiskScorer::new(RoleCategory::General);
        let d2 = scorer.contribution(&make(Degree::D2));
        let d3 = scorer.contribution(&make(Degree::D3));
        assert!((d2 / d3 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_many_criticals_saturate_high() {
        let scorer = RiskScorer::new(RoleCategory::General);
        let findings: Vec<Finding> = (0..8).map(|_| criminal(Severity::Critical, 10)).collect();
        let score = scorer.score(&findings);
        assert!(score.overall > 80.0);
        assert!(score.overall <= 100.0);
        assert_eq!(score.band, RiskBand::Critical);
    }
}
