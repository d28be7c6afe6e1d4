//! Result assessment
//!
//! Normalized provider results fold into the knowledge base; the
//! assessor measures gap closure, corroboration, and source strength to
//! produce the type confidence and information-gain rate the iteration
//! controller steers on.

use crate::kb::{Fact, FactKind, KnowledgeBase};
use crate::template::TypeTemplate;
use vet_analysis::{Direction, Inconsistency, InconsistencyKind};
use vet_common::{CheckType, FindingDetails};
use vet_entity::RelationKind;
use vet_gateway::{DiscoveredEntity, GatewayResult};

/// Outcome of assessing one iteration's results
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Findings accepted this iteration, tagged with their fingerprint
    pub findings: Vec<(vet_common::Finding, String)>,
    pub discovered: Vec<DiscoveredEntity>,
    pub inconsistencies: Vec<Inconsistency>,
    /// Expected fact kinds still unconfirmed
    pub gaps: Vec<FactKind>,
    /// Weighted confidence for the type, in [0, 1]
    pub type_confidence: f64,
    /// new_confirmed_facts / queries_issued
    pub info_gain_rate: f64,
    pub new_confirmed_facts: usize,
}

/// Folds gateway results into the knowledge base and scores the type
pub struct ResultAssessor {
    confidence_floor: f64,
}

impl ResultAssessor {
    /// Assessor with the knowledge-base confidence floor
    pub fn new(confidence_floor: f64) -> Self {
        Self { confidence_floor }
    }

    /// Assess one iteration of results for `check`.
    pub fn assess(
        &self,
        check: CheckType,
        results: &[GatewayResult],
        queries_issued: usize,
        kb: &mut KnowledgeBase,
        registry_order: impl Fn(&vet_common::ProviderId) -> usize + Copy,
    ) -> Assessment {
        let mut findings = Vec::new();
        let mut discovered = Vec::new();
        let mut inconsistencies = Vec::new();
        let mut new_confirmed = 0usize;
        let mut confidence_sum = 0.0;
        let mut confidence_n = 0usize;

        for result in results {
            for finding in &result.findings {
                confidence_sum += finding.confidence;
                confidence_n += 1;

                for fact in facts_from_details(finding) {
                    if let Some(existing) = kb.conflicting_value(fact.kind, &fact.value) {
                        inconsistencies.push(Inconsistency {
                            kind: inconsistency_kind_for(fact.kind),
                            field: format!("{:?}", fact.kind).to_lowercase(),
                            info_type: check,
                            claimed: existing.value.clone(),
                            observed: fact.value.clone(),
                            sources: vec![existing.source.clone(), fact.source.clone()],
                            direction: None,
                        });
                    }
                    if kb.assimilate(fact, self.confidence_floor, registry_order) {
                        new_confirmed += 1;
                    }
                }

                findings.push((finding.clone(), result.fingerprint_key.clone()));
            }

            for entity in &result.discovered {
                for fact in facts_from_discovery(entity, result) {
                    if kb.assimilate(fact, self.confidence_floor, registry_order) {
                        new_confirmed += 1;
                    }
                }
                discovered.push(entity.clone());
            }
        }

        let template = TypeTemplate::for_check(check);
        let gaps: Vec<FactKind> = template
            .expected_facts
            .iter()
            .filter(|kind| !kb.has_confirmed(**kind))
            .copied()
            .collect();

        let gap_closure = if template.expected_facts.is_empty() {
            // nothing expected: completion rides on source strength
            if confidence_n > 0 { 1.0 } else { 0.0 }
        } else {
            (template.expected_facts.len() - gaps.len()) as f64
                / template.expected_facts.len() as f64
        };

        let corroboration = {
            let confirmed = kb.confirmed_count();
            if confirmed == 0 {
                0.0
            } else {
                let sum: u32 = kb
                    .all()
                    .iter()
                    .filter(|f| f.confirmed)
                    .map(|f| f.corroborations)
                    .sum();
                ((sum as f64 / confirmed as f64) / 2.0).min(1.0)
            }
        };

        let source_strength = if confidence_n == 0 {
            0.0
        } else {
            confidence_sum / confidence_n as f64
        };

        let type_confidence =
            (0.5 * gap_closure + 0.2 * corroboration + 0.3 * source_strength).clamp(0.0, 1.0);

        let info_gain_rate = if queries_issued == 0 {
            0.0
        } else {
            new_confirmed as f64 / queries_issued as f64
        };

        Assessment {
            findings,
            discovered,
            inconsistencies,
            gaps,
            type_confidence,
            info_gain_rate,
            new_confirmed_facts: new_confirmed,
        }
    }
}

/// Facts a finding's structured details imply
fn facts_from_details(finding: &vet_common::Finding) -> Vec<Fact> {
    let source = finding.provenance.provider_id.clone();
    let confidence = finding.confidence;
    match &finding.details {
        FindingDetails::Identity { matched_name, .. } => vec![Fact::new(
            FactKind::Name,
            matched_name.clone(),
            confidence,
            source,
        )],
        FindingDetails::Criminal { jurisdiction, .. } => {
            // jurisdictions read "US-NY" or "US-NY/Kings"
            let mut facts = Vec::new();
            let mut parts = jurisdiction.splitn(2, '/');
            if let Some(state) = parts.next().filter(|s| !s.is_empty()) {
                facts.push(Fact::new(
                    FactKind::State,
                    state.to_string(),
                    confidence,
                    source.clone(),
                ));
            }
            if let Some(county) = parts.next().filter(|s| !s.is_empty()) {
                facts.push(Fact::new(
                    FactKind::County,
                    county.to_string(),
                    confidence,
                    source,
                ));
            }
            facts
        }
        FindingDetails::Civil { court, .. } => vec![Fact::new(
            FactKind::State,
            court.clone(),
            confidence * 0.8,
            source,
        )],
        _ => Vec::new(),
    }
}

/// Facts implied by a discovered related entity
fn facts_from_discovery(entity: &DiscoveredEntity, result: &GatewayResult) -> Vec<Fact> {
    let source = result
        .provider_id
        .clone()
        .unwrap_or_else(|| vet_common::ProviderId::new("unknown"));
    let confidence = entity.link_strength;
    match entity.relation {
        RelationKind::Employer => vec![
            Fact::new(FactKind::Employer, entity.name.clone(), confidence, source.clone()),
            Fact::new(FactKind::DiscoveredOrg, entity.name.clone(), confidence, source),
        ],
        RelationKind::Officer | RelationKind::BusinessPartner => vec![Fact::new(
            FactKind::DiscoveredOrg,
            entity.name.clone(),
            confidence,
            source,
        )],
        RelationKind::Associate | RelationKind::FamilyMember => vec![Fact::new(
            FactKind::DiscoveredPerson,
            entity.name.clone(),
            confidence,
            source,
        )],
        RelationKind::SharedAddress => vec![Fact::new(
            FactKind::Address,
            entity.name.clone(),
            confidence,
            source,
        )],
    }
}

fn inconsistency_kind_for(kind: FactKind) -> InconsistencyKind {
    match kind {
        FactKind::Dob => InconsistencyKind::MinorDateDiscrepancy,
        FactKind::Name => InconsistencyKind::MultipleIdentities,
        _ => InconsistencyKind::MinorDateDiscrepancy,
    }
}

/// Direction heuristic used by reconciliation when re-querying claims
pub fn direction_of(claimed_len: usize, observed_len: usize) -> Option<Direction> {
    match claimed_len.cmp(&observed_len) {
        std::cmp::Ordering::Greater => Some(Direction::Inflating),
        std::cmp::Ordering::Less => Some(Direction::Deflating),
        std::cmp::Ordering::Equal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vet_common::{Finding, Provenance, ProviderId, Severity};

    fn identity_result(name: &str, confidence: f64) -> GatewayResult {
        GatewayResult {
            findings: vec![Finding::new(
                Severity::Low,
                confidence,
                Provenance {
                    provider_id: ProviderId::new("id-prov"),
                    acquired_at: Utc::now(),
                    cache_hit: false,
                    stale: false,
                },
                FindingDetails::Identity {
                    matched_name: name.into(),
                    dob_verified: true,
                    address_verified: false,
                },
            )],
            discovered: Vec::new(),
            cache_hit: false,
            stale: false,
            coalesced: false,
            provider_id: Some(ProviderId::new("id-prov")),
            fingerprint_key: "fp-1".into(),
        }
    }

    #[test]
    fn test_identity_result_confirms_name_fact() {
        let assessor = ResultAssessor::new(0.7);
        let mut kb = KnowledgeBase::new();
        let results = [identity_result("Jane Roe", 0.9)];

        let assessment = assessor.assess(CheckType::Identity, &results, 1, &mut kb, |_| 0);
        assert_eq!(assessment.new_confirmed_facts, 1);
        assert!(kb.has_confirmed(FactKind::Name));
        assert!(assessment.gaps.contains(&FactKind::Dob));
        assert_eq!(assessment.info_gain_rate, 1.0);
        assert_eq!(assessment.findings.len(), 1);
    }

    #[test]
    fn test_no_new_facts_means_zero_gain() {
        let assessor = ResultAssessor::new(0.7);
        let mut kb = KnowledgeBase::new();
        let results = [identity_result("Jane Roe", 0.9)];
        assessor.assess(CheckType::Identity, &results, 1, &mut kb, |_| 0);

        // identical second round confirms nothing new
        let again = assessor.assess(CheckType::Identity, &results, 1, &mut kb, |_| 0);
        assert_eq!(again.new_confirmed_facts, 0);
        assert_eq!(again.info_gain_rate, 0.0);
    }

    #[test]
    fn test_criminal_jurisdiction_extracts_state_and_county() {
        let assessor = ResultAssessor::new(0.7);
        let mut kb = KnowledgeBase::new();
        let finding = Finding::new(
            Severity::Medium,
            0.9,
            Provenance {
                provider_id: ProviderId::new("courts"),
                acquired_at: Utc::now(),
                cache_hit: false,
                stale: false,
            },
            FindingDetails::Criminal {
                offense: "fraud".into(),
                jurisdiction: "US-NY/Kings".into(),
                disposition: "pending".into(),
                offense_date: None,
            },
        );
        let results = [GatewayResult {
            findings: vec![finding],
            discovered: Vec::new(),
            cache_hit: false,
            stale: false,
            coalesced: false,
            provider_id: Some(ProviderId::new("courts")),
            fingerprint_key: "fp-2".into(),
        }];

        assessor.assess(CheckType::Criminal, &results, 1, &mut kb, |_| 0);
        assert!(kb.has_confirmed(FactKind::State));
        assert!(kb.has_confirmed(FactKind::County));
    }

    #[test]
    fn test_higher_confidence_with_closed_gaps() {
        let assessor = ResultAssessor::new(0.7);
        let mut kb = KnowledgeBase::new();
        let sparse = assessor.assess(CheckType::Identity, &[], 1, &mut kb, |_| 0);

        let results = [identity_result("Jane Roe", 0.95)];
        let better = assessor.assess(CheckType::Identity, &results, 1, &mut kb, |_| 0);
        assert!(better.type_confidence > sparse.type_confidence);
    }
}
