//! Rule evaluation with a version-checked decision cache

use crate::rules::{ComplianceRule, DenialReason, Restrictions, RuleSet};
use arc_swap::ArcSwap;
use moka::sync::Cache;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use vet_common::{
    AtomicCounter, CheckType, ConsentScope, FindingDetails, Locale, RoleCategory, SourceCategory,
    Tier,
};

/// Inputs to one compliance decision
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub locale: Locale,
    pub role: RoleCategory,
    pub check: CheckType,
    pub tier: Tier,
    pub source: SourceCategory,
    /// Consent scopes the subject has granted
    pub consents: HashSet<ConsentScope>,
}

impl DecisionContext {
    fn cache_key(&self) -> String {
        format!(
            "{}|{:?}|{}|{:?}|{:?}|{}",
            self.locale,
            self.role,
            self.check,
            self.tier,
            self.source,
            // consent membership affects the outcome, so it keys the cache
            {
                let mut scopes: Vec<_> = self.consents.iter().map(|c| *c as u8).collect();
                scopes.sort_unstable();
                scopes.iter().map(u8::to_string).collect::<Vec<_>>().join(",")
            }
        )
    }
}

/// Outcome of a compliance evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub permitted: bool,
    pub reason: Option<DenialReason>,
    pub restrictions: Restrictions,
    pub disclosures_required: Vec<String>,
}

impl Decision {
    fn denied(reason: DenialReason) -> Self {
        Self {
            permitted: false,
            reason: Some(reason),
            restrictions: Restrictions::default(),
            disclosures_required: Vec::new(),
        }
    }
}

/// Engine statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub evaluations: u64,
    pub cache_hits: u64,
    pub denials: u64,
    pub rules_loaded: usize,
    pub version: u64,
}

/// Compliance rule engine
///
/// The rule table is a read-mostly snapshot swapped atomically on admin
/// reload; cached decisions carry the snapshot version and miss when it
/// moves.
pub struct ComplianceEngine {
    rules: ArcSwap<RuleSet>,
    cache: Cache<String, (u64, Decision)>,
    evaluations: AtomicCounter,
    cache_hits: AtomicCounter,
    denials: AtomicCounter,
}

impl ComplianceEngine {
    /// Engine with an initial rule set
    pub fn new(rules: RuleSet) -> Self {
        let cache = Cache::builder()
            .max_capacity(16_384)
            .time_to_live(Duration::from_secs(300))
            .build();
        Self {
            rules: ArcSwap::from_pointee(rules),
            cache,
            evaluations: AtomicCounter::new(0),
            cache_hits: AtomicCounter::new(0),
            denials: AtomicCounter::new(0),
        }
    }

    /// Swap in a new rule snapshot; bumps the version so cached
    /// decisions invalidate on their next read.
    pub fn reload(&self, rules: Vec<ComplianceRule>) {
        let version = self.rules.load().version + 1;
        tracing::info!(version, count = rules.len(), "compliance rules reloaded");
        self.rules.store(Arc::new(RuleSet::new(version, rules)));
    }

    /// Pre-query evaluation: permit/deny plus restrictions.
    ///
    /// Deterministic: the most specific applicable rule wins; equally
    /// specific rules resolve to the most restrictive.
    pub fn evaluate(&self, ctx: &DecisionContext) -> Decision {
        self.evaluations.inc();
        let snapshot = self.rules.load();
        let key = ctx.cache_key();

        if let Some((version, decision)) = self.cache.get(&key) {
            if version == snapshot.version {
                self.cache_hits.inc();
                return decision;
            }
        }

        let decision = self.resolve(ctx, &snapshot);
        if !decision.permitted {
            self.denials.inc();
            tracing::debug!(
                check = %ctx.check,
                locale = %ctx.locale,
                reason = ?decision.reason,
                "compliance denial"
            );
        }
        self.cache.insert(key, (snapshot.version, decision.clone()));
        decision
    }

    fn resolve(&self, ctx: &DecisionContext, snapshot: &RuleSet) -> Decision {
        let mut winner: Option<&ComplianceRule> = None;
        for rule in snapshot
            .rules
            .iter()
            .filter(|r| r.applies(&ctx.locale, ctx.role, ctx.check, ctx.tier, ctx.source))
        {
            winner = match winner {
                None => Some(rule),
                Some(current) => {
                    let ord = rule
                        .specificity()
                        .cmp(&current.specificity())
                        .then(rule.restrictiveness().cmp(&current.restrictiveness()));
                    if ord == std::cmp::Ordering::Greater {
                        Some(rule)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        let Some(rule) = winner else {
            // no rule covers the tuple: prohibited by default
            return Decision::denied(DenialReason::LocaleProhibited);
        };

        if !rule.permitted {
            let reason = if rule.role.is_some() {
                DenialReason::RoleExcluded
            } else if rule.source.is_some() {
                DenialReason::SourceProhibited
            } else if !rule.applicable_tiers.is_empty() {
                DenialReason::TierNotPermitted
            } else {
                DenialReason::LocaleProhibited
            };
            return Decision::denied(reason);
        }

        if let Some(scope) = rule.requires_explicit_consent {
            if !ctx.consents.contains(&scope) {
                return Decision::denied(DenialReason::ConsentMissing);
            }
        }

        Decision {
            permitted: true,
            reason: None,
            restrictions: Restrictions {
                excluded_data_categories: rule.excluded_data_categories.clone(),
                lookback_years: rule.lookback_years,
            },
            disclosures_required: rule.required_disclosures.clone(),
        }
    }

    /// Post-normalization pass: strip excluded data categories from a
    /// finding's details in place. Variants without classified fields
    /// pass through untouched.
    pub fn redact(&self, decision: &Decision, details: &mut FindingDetails) {
        let excluded = &decision.restrictions.excluded_data_categories;
        if excluded.is_empty() {
            return;
        }
        match details {
            FindingDetails::Reputation {
                headline,
                topics,
                data_categories,
                redacted,
                ..
            } => {
                let before = data_categories.len();
                data_categories.retain(|c| !excluded.contains(c));
                if data_categories.len() < before {
                    *redacted = true;
                    if data_categories.is_empty() && before > 0 {
                        headline.clear();
                        topics.clear();
                    }
                }
            }
            FindingDetails::Behavioral {
                indicator,
                data_categories,
                redacted,
            } => {
                let before = data_categories.len();
                data_categories.retain(|c| !excluded.contains(c));
                if data_categories.len() < before {
                    *redacted = true;
                    if data_categories.is_empty() && before > 0 {
                        indicator.clear();
                    }
                }
            }
            _ => {}
        }
    }

    /// Engine statistics
    pub fn stats(&self) -> EngineStats {
        let snapshot = self.rules.load();
        EngineStats {
            evaluations: self.evaluations.get(),
            cache_hits: self.cache_hits.get(),
            denials: self.denials.get(),
            rules_loaded: snapshot.rules.len(),
            version: snapshot.version,
        }
    }
}
