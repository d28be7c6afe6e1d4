//! Exact and fuzzy entity resolution

use crate::model::{CandidateIdentity, Entity, WeakIdentity};
use crate::registry::EntityRegistry;
use crate::review::ReviewQueue;
use crate::EntityError;
use serde::{Deserialize, Serialize};
use vet_audit::AuditLog;
use vet_common::{EntityId, ReviewTaskId, Tier};

/// Resolution thresholds. Defaults match platform policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverThresholds {
    /// At or above: confirmed match
    pub confirmed: f64,
    /// Standard tier auto-resolves at or above this inside the band
    pub auto_resolve: f64,
    /// Below: unambiguously a new entity
    pub ambiguous_floor: f64,
}

impl Default for ResolverThresholds {
    fn default() -> Self {
        Self {
            confirmed: 0.95,
            auto_resolve: 0.85,
            ambiguous_floor: 0.70,
        }
    }
}

/// How a candidate resolved
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// Strong identifier or high-score fuzzy match
    Matched { entity_id: EntityId, score: f64 },
    /// No plausible match; a fresh entity was created
    New { entity_id: EntityId },
    /// Created new but flagged uncertain (Standard tier, mid band)
    NewUncertain { entity_id: EntityId, score: f64 },
    /// Provisional new entity pending human review (Enhanced tier)
    ProvisionalPendingReview {
        entity_id: EntityId,
        candidate_match: EntityId,
        score: f64,
        review_task: ReviewTaskId,
    },
}

impl ResolutionOutcome {
    /// The entity id the investigation should proceed with
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Matched { entity_id, .. }
            | Self::New { entity_id }
            | Self::NewUncertain { entity_id, .. }
            | Self::ProvisionalPendingReview { entity_id, .. } => *entity_id,
        }
    }
}

/// Tier-aware resolver over the registry
pub struct EntityResolver {
    thresholds: ResolverThresholds,
}

impl EntityResolver {
    /// Resolver with default thresholds
    pub fn new() -> Self {
        Self {
            thresholds: ResolverThresholds::default(),
        }
    }

    /// Resolver with explicit thresholds
    pub fn with_thresholds(thresholds: ResolverThresholds) -> Self {
        Self { thresholds }
    }

    /// Resolve a candidate against the registry, creating or matching
    /// entities per tier policy.
    pub fn resolve(
        &self,
        candidate: CandidateIdentity,
        tier: Tier,
        registry: &EntityRegistry,
        review: &ReviewQueue,
        audit: &AuditLog,
    ) -> Result<ResolutionOutcome, EntityError> {
        // (a) strong identifier exact match
        for ident in &candidate.identifiers {
            if let Some(existing) = registry.by_strong_identifier(ident) {
                tracing::debug!(entity = %existing.id, "strong identifier match");
                return Ok(ResolutionOutcome::Matched {
                    entity_id: existing.id,
                    score: 1.0,
                });
            }
        }

        // (b) fuzzy match across live entities of the same kind
        let best = registry
            .live_entities()
            .into_iter()
            .filter(|e| e.kind == candidate.kind)
            .map(|e| {
                let score = weak_similarity(&candidate.weak, &e.weak, &e.aliases);
                (e, score)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let (best_entity, score) = match best {
            Some((e, s)) if s >= self.thresholds.ambiguous_floor => (e, s),
            _ => {
                let id = self.create(candidate, registry, false, false)?;
                return Ok(ResolutionOutcome::New { entity_id: id });
            }
        };

        if score >= self.thresholds.confirmed {
            self.absorb_identifiers(&best_entity, candidate, registry)?;
            return Ok(ResolutionOutcome::Matched {
                entity_id: best_entity.id,
                score,
            });
        }

        // ambiguous band: 0.70 <= score < 0.95
        match tier {
            Tier::Standard => {
                if score >= self.thresholds.auto_resolve {
                    self.absorb_identifiers(&best_entity, candidate, registry)?;
                    Ok(ResolutionOutcome::Matched {
                        entity_id: best_entity.id,
                        score,
                    })
                } else {
                    let id = self.create(candidate, registry, true, false)?;
                    tracing::warn!(%id, score, "ambiguous match resolved to new entity");
                    Ok(ResolutionOutcome::NewUncertain {
                        entity_id: id,
                        score,
                    })
                }
            }
            Tier::Enhanced => {
                let id = self.create(candidate, registry, true, true)?;
                let task = review.enqueue(id, best_entity.id, score, audit)?;
                Ok(ResolutionOutcome::ProvisionalPendingReview {
                    entity_id: id,
                    candidate_match: best_entity.id,
                    score,
                    review_task: task,
                })
            }
        }
    }

    fn create(
        &self,
        candidate: CandidateIdentity,
        registry: &EntityRegistry,
        uncertain: bool,
        provisional: bool,
    ) -> Result<EntityId, EntityError> {
        let mut entity = Entity::new(candidate.kind, candidate.weak, candidate.identifiers);
        entity.uncertain_match = uncertain;
        entity.provisional = provisional;
        registry.insert(entity)
    }

    fn absorb_identifiers(
        &self,
        target: &Entity,
        candidate: CandidateIdentity,
        registry: &EntityRegistry,
    ) -> Result<(), EntityError> {
        if candidate.identifiers.is_empty() && candidate.weak.name == target.weak.name {
            return Ok(());
        }
        registry.update(target.id, |e| {
            for ident in candidate.identifiers {
                if !e.identifiers.contains(&ident) {
                    e.identifiers.push(ident);
                }
            }
            if candidate.weak.name != e.weak.name && !e.aliases.contains(&candidate.weak.name) {
                e.aliases.push(candidate.weak.name);
            }
        })
    }
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Weighted similarity over (name, dob, address).
///
/// Weights redistribute over the attributes both sides actually carry;
/// name-only evidence is capped below the confirmed threshold.
pub fn weak_similarity(a: &WeakIdentity, b: &WeakIdentity, b_aliases: &[String]) -> f64 {
    let name_sim = std::iter::once(&b.name)
        .chain(b_aliases)
        .map(|n| name_similarity(&a.name, n))
        .fold(0.0f64, f64::max);

    let mut weighted = 0.5 * name_sim;
    let mut total = 0.5;

    match (a.dob, b.dob) {
        (Some(x), Some(y)) => {
            weighted += if x == y { 0.3 } else { 0.0 };
            total += 0.3;
        }
        _ => {}
    }
    match (&a.address, &b.address) {
        (Some(x), Some(y)) => {
            weighted += 0.2 * normalized_similarity(x, y);
            total += 0.2;
        }
        _ => {}
    }

    let score = weighted / total;
    if total <= 0.5 {
        // name alone cannot confirm a match
        score * 0.90
    } else {
        score
    }
}

/// Token-insensitive name similarity
fn name_similarity(a: &str, b: &str) -> f64 {
    let norm = |s: &str| {
        let mut tokens: Vec<String> = s
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        tokens.sort();
        tokens.join(" ")
    };
    normalized_similarity(&norm(a), &norm(b))
}

/// Levenshtein distance normalized to [0, 1]
fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut dp = vec![vec![0; n + 1]; m + 1];
    for i in 0..=m {
        dp[i][0] = i;
    }
    for j in 0..=n {
        dp[0][j] = j;
    }

    for i in 1..=m {
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }

    dp[m][n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, StrongIdentifier};
    use chrono::NaiveDate;

    fn setup() -> (EntityRegistry, ReviewQueue, AuditLog, EntityResolver) {
        (
            EntityRegistry::new(),
            ReviewQueue::new(),
            AuditLog::new(),
            EntityResolver::new(),
        )
    }

    fn full_candidate(name: &str) -> CandidateIdentity {
        CandidateIdentity {
            kind: EntityKind::Individual,
            weak: WeakIdentity {
                name: name.into(),
                dob: NaiveDate::from_ymd_opt(1985, 3, 14),
                address: Some("12 Elm Street Springfield".into()),
            },
            identifiers: Vec::new(),
        }
    }

    #[test]
    fn test_strong_identifier_wins() {
        let (registry, review, audit, resolver) = setup();
        let passport = StrongIdentifier::Passport("X99".into());
        let mut existing = full_candidate("Jane Roe");
        existing.identifiers = vec![passport.clone()];
        let id = resolver
            .resolve(existing, Tier::Standard, &registry, &review, &audit)
            .unwrap()
            .entity_id();

        let mut incoming = full_candidate("Janet R.");
        incoming.identifiers = vec![passport];
        let outcome = resolver
            .resolve(incoming, Tier::Standard, &registry, &review, &audit)
            .unwrap();
        assert_eq!(
            outcome,
            ResolutionOutcome::Matched {
                entity_id: id,
                score: 1.0
            }
        );
    }

    #[test]
    fn test_identical_weak_identity_confirms() {
        let (registry, review, audit, resolver) = setup();
        let id = resolver
            .resolve(full_candidate("John Quincy Adams"), Tier::Standard, &registry, &review, &audit)
            .unwrap()
            .entity_id();

        let outcome = resolver
            .resolve(full_candidate("John Quincy Adams"), Tier::Standard, &registry, &review, &audit)
            .unwrap();
        match outcome {
            ResolutionOutcome::Matched { entity_id, score } => {
                assert_eq!(entity_id, id);
                assert!(score >= 0.95);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_unrelated_names_create_new() {
        let (registry, review, audit, resolver) = setup();
        resolver
            .resolve(full_candidate("Alice Zhang"), Tier::Standard, &registry, &review, &audit)
            .unwrap();
        let outcome = resolver
            .resolve(full_candidate("Robert Okafor"), Tier::Standard, &registry, &review, &audit)
            .unwrap();
        assert!(matches!(outcome, ResolutionOutcome::New { .. }));
        assert_eq!(registry.live_entities().len(), 2);
    }

    #[test]
    fn test_midband_standard_creates_uncertain_new() {
        let (registry, review, audit, resolver) = setup();
        resolver
            .resolve(full_candidate("Christopher Nolansen"), Tier::Standard, &registry, &review, &audit)
            .unwrap();

        // same dob/address, moderately different name: lands in the band
        let mut incoming = full_candidate("Christofer Nielsonn");
        incoming.weak.dob = None;
        let outcome = resolver
            .resolve(incoming, Tier::Standard, &registry, &review, &audit)
            .unwrap();

        match outcome {
            ResolutionOutcome::NewUncertain { entity_id, score } => {
                assert!((0.70..0.85).contains(&score), "score {score}");
                assert!(registry.get(entity_id).unwrap().uncertain_match);
            }
            ResolutionOutcome::Matched { score, .. } => {
                assert!(score >= 0.85, "score {score}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_enhanced_ambiguity_goes_to_review() {
        let (registry, review, audit, resolver) = setup();
        let first = resolver
            .resolve(full_candidate("Christopher Nolansen"), Tier::Enhanced, &registry, &review, &audit)
            .unwrap()
            .entity_id();

        let mut incoming = full_candidate("Christofer Nielsonn");
        incoming.weak.dob = None;
        let outcome = resolver
            .resolve(incoming, Tier::Enhanced, &registry, &review, &audit)
            .unwrap();

        match outcome {
            ResolutionOutcome::ProvisionalPendingReview {
                entity_id,
                candidate_match,
                ..
            } => {
                assert_eq!(candidate_match, first);
                assert!(registry.get(entity_id).unwrap().provisional);
                assert_eq!(review.pending().len(), 1);
            }
            other => panic!("expected review, got {other:?}"),
        }
    }

    #[test]
    fn test_name_only_cannot_confirm() {
        let a = WeakIdentity {
            name: "Maria Gonzalez".into(),
            dob: None,
            address: None,
        };
        let score = weak_similarity(&a, &a.clone(), &[]);
        assert!(score < 0.95, "name-only score {score}");
    }
}
