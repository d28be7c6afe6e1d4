//! Profile evolution detection
//!
//! Rule-based comparison of consecutive profile versions. Every rule
//! maps to a fixed pattern signature; there is no learned component.

use chrono::Duration;
use std::collections::{HashMap, HashSet};
use vet_common::{
    ChangedFinding, EntityId, EntityProfile, EvolutionSignal, EvolutionSignalType, FinancialEvent,
    Finding, FindingDetails, ProfileDelta,
};

/// Credit score below which a monotone decline counts as deterioration
const CREDIT_BREACH_THRESHOLD: u16 = 600;

/// Expansion ratio above which growth counts as rapid (+200%)
const RAPID_EXPANSION_RATIO: f64 = 3.0;

/// Detects deltas and evolution signals between profile versions
pub struct EvolutionDetector;

impl EvolutionDetector {
    /// Compute the delta from `previous` to `current`.
    ///
    /// `history` holds earlier versions (oldest first) for trajectory
    /// rules; `sanctioned` is the set of entities with active sanctions
    /// findings, for adjacency detection.
    pub fn compute_delta(
        previous: &EntityProfile,
        current: &EntityProfile,
        history: &[EntityProfile],
        sanctioned: &HashSet<EntityId>,
    ) -> ProfileDelta {
        let prev_keys: HashMap<String, &Finding> = previous
            .findings
            .iter()
            .map(|f| (f.correlation_key(), f))
            .collect();
        let curr_keys: HashMap<String, &Finding> = current
            .findings
            .iter()
            .map(|f| (f.correlation_key(), f))
            .collect();

        let new_findings: Vec<_> = current
            .findings
            .iter()
            .filter(|f| !prev_keys.contains_key(&f.correlation_key()))
            .collect();
        let resolved: Vec<_> = previous
            .findings
            .iter()
            .filter(|f| !curr_keys.contains_key(&f.correlation_key()))
            .map(|f| f.id)
            .collect();
        let changed: Vec<ChangedFinding> = current
            .findings
            .iter()
            .filter_map(|f| {
                let prev = prev_keys.get(&f.correlation_key())?;
                (prev.severity != f.severity).then(|| ChangedFinding {
                    previous: prev.id,
                    current: f.id,
                    severity_before: prev.severity,
                    severity_after: f.severity,
                })
            })
            .collect();

        let mut signals = Vec::new();
        Self::detect_network_expansion(previous, current, &mut signals);
        Self::detect_shell_buildup(&new_findings, &mut signals);
        Self::detect_sanctions_adjacency(previous, current, sanctioned, &mut signals);
        Self::detect_undisclosed_interests(&new_findings, &mut signals);
        Self::detect_financial_deterioration(previous, current, history, &mut signals);
        Self::detect_employment_drift(current, &mut signals);

        for signal in &signals {
            tracing::info!(
                entity = %current.entity_id,
                signal = ?signal.signal_type,
                severity = ?signal.severity,
                "evolution signal fired"
            );
        }

        ProfileDelta {
            previous_version: previous.version,
            new_findings: new_findings.iter().map(|f| f.id).collect(),
            resolved_findings: resolved,
            changed_findings: changed,
            risk_score_change: current.risk_score.overall - previous.risk_score.overall,
            connection_count_change: current.connections.len() as i64
                - previous.connections.len() as i64,
            evolution_signals: signals,
        }
    }

    fn detect_network_expansion(
        previous: &EntityProfile,
        current: &EntityProfile,
        signals: &mut Vec<EvolutionSignal>,
    ) {
        let before = previous.connections.len();
        let after = current.connections.len();
        if before == 0 || after <= before {
            return;
        }
        let ratio = after as f64 / before as f64;
        let elapsed = current.created_at - previous.created_at;
        if ratio > RAPID_EXPANSION_RATIO && elapsed <= Duration::days(183) {
            signals.push(EvolutionSignal::fire(
                EvolutionSignalType::NetworkExpansionRapid,
                (ratio / (RAPID_EXPANSION_RATIO * 2.0)).clamp(0.6, 1.0),
                vec![format!(
                    "connections grew {before} -> {after} ({:.0}% increase) in {} days",
                    (ratio - 1.0) * 100.0,
                    elapsed.num_days()
                )],
            ));
        }
    }

    fn detect_shell_buildup(new_findings: &[&Finding], signals: &mut Vec<EvolutionSignal>) {
        let indicators: Vec<&&Finding> = new_findings
            .iter()
            .filter(|f| {
                matches!(
                    f.details,
                    FindingDetails::Financial {
                        event: FinancialEvent::ShellCompanyIndicator,
                        ..
                    }
                )
            })
            .collect();
        if indicators.len() >= 2 {
            signals.push(EvolutionSignal::fire(
                EvolutionSignalType::ShellCompanyBuildup,
                0.85,
                vec![format!("{} new shell-company indicators", indicators.len())],
            ));
        }
    }

    fn detect_sanctions_adjacency(
        previous: &EntityProfile,
        current: &EntityProfile,
        sanctioned: &HashSet<EntityId>,
        signals: &mut Vec<EvolutionSignal>,
    ) {
        let known: HashSet<EntityId> =
            previous.connections.iter().map(|c| c.entity_id).collect();
        let hits: Vec<EntityId> = current
            .connections
            .iter()
            .filter(|c| !known.contains(&c.entity_id) && sanctioned.contains(&c.entity_id))
            .map(|c| c.entity_id)
            .collect();
        if !hits.is_empty() {
            signals.push(EvolutionSignal::fire(
                EvolutionSignalType::SanctionsAdjacencyNew,
                0.95,
                hits.iter()
                    .map(|id| format!("new connection to sanctioned entity {id}"))
                    .collect(),
            ));
        }
    }

    fn detect_undisclosed_interests(
        new_findings: &[&Finding],
        signals: &mut Vec<EvolutionSignal>,
    ) {
        let count = new_findings
            .iter()
            .filter(|f| {
                matches!(
                    f.details,
                    FindingDetails::Financial {
                        event: FinancialEvent::UndisclosedInterest,
                        ..
                    }
                )
            })
            .count();
        if count > 0 {
            signals.push(EvolutionSignal::fire(
                EvolutionSignalType::UndisclosedInterestsNew,
                0.75,
                vec![format!("{count} new undisclosed business interests")],
            ));
        }
    }

    fn detect_financial_deterioration(
        previous: &EntityProfile,
        current: &EntityProfile,
        history: &[EntityProfile],
        signals: &mut Vec<EvolutionSignal>,
    ) {
        // credit trajectory over (history..., previous, current)
        let mut scores: Vec<u16> = Vec::new();
        for profile in history
            .iter()
            .chain([previous, current])
        {
            if let Some(score) = Self::credit_score_of(profile) {
                scores.push(score);
            }
        }
        if scores.len() < 3 {
            return;
        }
        let tail = &scores[scores.len() - 3..];
        let monotone_down = tail.windows(2).all(|w| w[1] < w[0]);
        let breached = *tail.last().expect("tail has three entries") < CREDIT_BREACH_THRESHOLD;
        if monotone_down && breached {
            signals.push(EvolutionSignal::fire(
                EvolutionSignalType::FinancialDeterioration,
                0.8,
                vec![format!("credit trajectory {tail:?}")],
            ));
        }
    }

    fn credit_score_of(profile: &EntityProfile) -> Option<u16> {
        profile.findings.iter().find_map(|f| match f.details {
            FindingDetails::Financial {
                event: FinancialEvent::CreditScore { score },
                ..
            } => Some(score),
            _ => None,
        })
    }

    fn detect_employment_drift(current: &EntityProfile, signals: &mut Vec<EvolutionSignal>) {
        let cutoff = current.created_at - Duration::days(730);
        let recent_employers = current
            .connections
            .iter()
            .filter(|c| c.relation == "employer" && c.first_seen >= cutoff)
            .count();
        if recent_employers >= 3 {
            signals.push(EvolutionSignal::fire(
                EvolutionSignalType::BehavioralDriftEmployment,
                0.7,
                vec![format!(
                    "{recent_employers} employer changes inside 24 months"
                )],
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vet_common::{
        Connection, Degree, ProfileStatus, ProfileTrigger, Provenance, ProviderId, RiskBand,
        RiskScore, Severity,
    };

    fn profile(entity: EntityId, version: u32, connections: usize, age_days: i64) -> EntityProfile {
        EntityProfile {
            entity_id: entity,
            version,
            created_at: Utc::now() - Duration::days(age_days),
            trigger: ProfileTrigger::Investigation,
            status: ProfileStatus::Complete,
            findings: Vec::new(),
            risk_score: RiskScore {
                overall: 10.0,
                by_category: Default::default(),
                band: RiskBand::Low,
            },
            connections: (0..connections)
                .map(|_| Connection {
                    entity_id: EntityId::new(),
                    relation: "associate".into(),
                    link_strength: 0.5,
                    degree: Degree::D2,
                    first_seen: Utc::now(),
                })
                .collect(),
            stale_sources: Vec::new(),
            excluded_checks: Vec::new(),
            deferred_network: Vec::new(),
            delta: None,
        }
    }

    fn financial_finding(event: FinancialEvent) -> Finding {
        Finding::new(
            Severity::Medium,
            0.9,
            Provenance {
                provider_id: ProviderId::new("bureau"),
                acquired_at: Utc::now(),
                cache_hit: false,
                stale: false,
            },
            FindingDetails::Financial {
                event,
                amount: None,
                currency: None,
                reported_at: None,
            },
        )
    }

    #[test]
    fn test_rapid_expansion_fires() {
        let entity = EntityId::new();
        // 12 -> 41 connections in ~5 months: 242% growth
        let v1 = profile(entity, 1, 12, 150);
        let v2 = profile(entity, 2, 41, 0);

        let delta = EvolutionDetector::compute_delta(&v1, &v2, &[], &HashSet::new());
        assert!(delta
            .evolution_signals
            .iter()
            .any(|s| s.signal_type == EvolutionSignalType::NetworkExpansionRapid));
        assert_eq!(delta.connection_count_change, 29);
    }

    #[test]
    fn test_slow_expansion_does_not_fire() {
        let entity = EntityId::new();
        // same growth over 14 months
        let v1 = profile(entity, 1, 12, 420);
        let v2 = profile(entity, 2, 41, 0);

        let delta = EvolutionDetector::compute_delta(&v1, &v2, &[], &HashSet::new());
        assert!(delta.evolution_signals.is_empty());
    }

    #[test]
    fn test_sanctions_adjacency_on_new_connection() {
        let entity = EntityId::new();
        let v1 = profile(entity, 1, 2, 60);
        let mut v2 = profile(entity, 2, 2, 0);
        let bad_actor = EntityId::new();
        v2.connections.push(Connection {
            entity_id: bad_actor,
            relation: "business_partner".into(),
            link_strength: 0.9,
            degree: Degree::D2,
            first_seen: Utc::now(),
        });

        let sanctioned: HashSet<_> = [bad_actor].into_iter().collect();
        let delta = EvolutionDetector::compute_delta(&v1, &v2, &[], &sanctioned);
        let signal = delta
            .evolution_signals
            .iter()
            .find(|s| s.signal_type == EvolutionSignalType::SanctionsAdjacencyNew)
            .expect("sanctions adjacency should fire");
        assert_eq!(signal.severity, Severity::Critical);
        assert_eq!(signal.pattern_signature, "net.sanctions.adjacency.v1");
    }

    #[test]
    fn test_shell_buildup_needs_two_indicators() {
        let entity = EntityId::new();
        let v1 = profile(entity, 1, 1, 60);
        let mut v2 = profile(entity, 2, 1, 0);
        v2.findings
            .push(financial_finding(FinancialEvent::ShellCompanyIndicator));

        let delta = EvolutionDetector::compute_delta(&v1, &v2, &[], &HashSet::new());
        assert!(!delta
            .evolution_signals
            .iter()
            .any(|s| s.signal_type == EvolutionSignalType::ShellCompanyBuildup));
    }

    #[test]
    fn test_financial_deterioration_needs_monotone_breach() {
        let entity = EntityId::new();
        let mut v1 = profile(entity, 1, 1, 200);
        let mut v2 = profile(entity, 2, 1, 100);
        let mut v3 = profile(entity, 3, 1, 0);
        v1.findings
            .push(financial_finding(FinancialEvent::CreditScore { score: 700 }));
        v2.findings
            .push(financial_finding(FinancialEvent::CreditScore { score: 640 }));
        v3.findings
            .push(financial_finding(FinancialEvent::CreditScore { score: 580 }));

        let delta =
            EvolutionDetector::compute_delta(&v2, &v3, std::slice::from_ref(&v1), &HashSet::new());
        assert!(delta
            .evolution_signals
            .iter()
            .any(|s| s.signal_type == EvolutionSignalType::FinancialDeterioration));

        // ends above the threshold: no signal
        let mut v3b = profile(entity, 3, 1, 0);
        v3b.findings
            .push(financial_finding(FinancialEvent::CreditScore { score: 630 }));
        let delta =
            EvolutionDetector::compute_delta(&v2, &v3b, std::slice::from_ref(&v1), &HashSet::new());
        assert!(!delta
            .evolution_signals
            .iter()
            .any(|s| s.signal_type == EvolutionSignalType::FinancialDeterioration));
    }

    #[test]
    fn test_employment_drift() {
        let entity = EntityId::new();
        let v1 = profile(entity, 1, 0, 60);
        let mut v2 = profile(entity, 2, 0, 0);
        for _ in 0..3 {
            v2.connections.push(Connection {
                entity_id: EntityId::new(),
                relation: "employer".into(),
                link_strength: 0.8,
                degree: Degree::D2,
                first_seen: Utc::now() - Duration::days(200),
            });
        }

        let delta = EvolutionDetector::compute_delta(&v1, &v2, &[], &HashSet::new());
        assert!(delta
            .evolution_signals
            .iter()
            .any(|s| s.signal_type == EvolutionSignalType::BehavioralDriftEmployment));
    }

    #[test]
    fn test_new_and_resolved_findings_tracked() {
        let entity = EntityId::new();
        let mut v1 = profile(entity, 1, 0, 30);
        let mut v2 = profile(entity, 2, 0, 0);
        let old = financial_finding(FinancialEvent::Bankruptcy);
        let new = financial_finding(FinancialEvent::Lien);
        v1.findings.push(old.clone());
        v2.findings.push(new.clone());

        let delta = EvolutionDetector::compute_delta(&v1, &v2, &[], &HashSet::new());
        assert_eq!(delta.new_findings, vec![new.id]);
        assert_eq!(delta.resolved_findings, vec![old.id]);
        assert_eq!(delta.previous_version, 1);
    }
}
