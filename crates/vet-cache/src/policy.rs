//! Freshness policy table and stale-policy resolution

use crate::entry::FreshnessState;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vet_common::{CheckType, Tier};

/// What to do with a stale hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Serve the stale entry flagged, refresh asynchronously
    Flag,
    /// Block and fetch fresh
    Block,
}

/// Resolution of a cache lookup against policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    UseFresh,
    UseStaleFlagAndRefresh,
    BlockRefresh,
    MissExecute,
}

/// Per-check freshness windows and tier-split stale policies
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFreshness {
    pub fresh_window: Duration,
    /// None means the stale window never closes (education)
    pub stale_window: Option<Duration>,
    pub standard: StalePolicy,
    pub enhanced: StalePolicy,
}

impl CheckFreshness {
    fn new(
        fresh: Duration,
        stale: Option<Duration>,
        standard: StalePolicy,
        enhanced: StalePolicy,
    ) -> Self {
        Self {
            fresh_window: fresh,
            stale_window: stale,
            standard,
            enhanced,
        }
    }

    fn policy_for(&self, tier: Tier) -> StalePolicy {
        match tier {
            Tier::Standard => self.standard,
            Tier::Enhanced => self.enhanced,
        }
    }
}

/// Configuration-driven freshness policy table
#[derive(Debug, Clone)]
pub struct FreshnessPolicy {
    table: HashMap<CheckType, CheckFreshness>,
    fallback: CheckFreshness,
}

impl FreshnessPolicy {
    /// Platform defaults
    pub fn defaults() -> Self {
        use CheckType::*;
        use StalePolicy::*;
        let days = Duration::days;

        let mut table = HashMap::new();
        // Sanctions/PEP: zero windows - never served from cache
        table.insert(Sanctions, CheckFreshness::new(Duration::zero(), Some(Duration::zero()), Block, Block));
        table.insert(Criminal, CheckFreshness::new(days(7), Some(days(30)), Flag, Block));
        table.insert(AdverseMedia, CheckFreshness::new(days(1), Some(days(7)), Flag, Block));
        table.insert(Civil, CheckFreshness::new(days(14), Some(days(60)), Flag, Flag));
        table.insert(Financial, CheckFreshness::new(days(30), Some(days(90)), Flag, Flag));
        table.insert(CorporateRegistry, CheckFreshness::new(days(30), Some(days(90)), Flag, Flag));
        table.insert(DigitalFootprint, CheckFreshness::new(days(30), Some(days(90)), Flag, Flag));
        table.insert(Employment, CheckFreshness::new(days(90), Some(days(180)), Flag, Flag));
        table.insert(Behavioral, CheckFreshness::new(days(90), Some(days(180)), Flag, Flag));
        // education records effectively never expire once stale
        table.insert(Education, CheckFreshness::new(days(365), None, Flag, Flag));

        Self {
            table,
            fallback: CheckFreshness::new(days(30), Some(days(90)), Flag, Flag),
        }
    }

    /// Override one check's policy
    pub fn set(&mut self, check: CheckType, freshness: CheckFreshness) {
        self.table.insert(check, freshness);
    }

    /// Windows for a check
    pub fn windows(&self, check: CheckType) -> (Duration, Option<Duration>) {
        let f = self.table.get(&check).unwrap_or(&self.fallback);
        (f.fresh_window, f.stale_window)
    }

    /// Resolve a lookup outcome into a cache decision
    pub fn resolve(
        &self,
        check: CheckType,
        tier: Tier,
        state: Option<FreshnessState>,
    ) -> CacheDecision {
        let freshness = self.table.get(&check).unwrap_or(&self.fallback);

        // zero fresh window: always execute, regardless of what is cached
        if freshness.fresh_window.is_zero() {
            return match state {
                Some(_) => CacheDecision::BlockRefresh,
                None => CacheDecision::MissExecute,
            };
        }

        match state {
            Some(FreshnessState::Fresh) => CacheDecision::UseFresh,
            Some(FreshnessState::Stale) => match freshness.policy_for(tier) {
                StalePolicy::Flag => CacheDecision::UseStaleFlagAndRefresh,
                StalePolicy::Block => CacheDecision::BlockRefresh,
            },
            Some(FreshnessState::Expired) | None => CacheDecision::MissExecute,
        }
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanctions_never_served_from_cache() {
        let policy = FreshnessPolicy::defaults();
        for tier in [Tier::Standard, Tier::Enhanced] {
            for state in [FreshnessState::Fresh, FreshnessState::Stale, FreshnessState::Expired] {
                let d = policy.resolve(CheckType::Sanctions, tier, Some(state));
                assert_eq!(d, CacheDecision::BlockRefresh, "{tier:?}/{state:?}");
            }
            assert_eq!(
                policy.resolve(CheckType::Sanctions, tier, None),
                CacheDecision::MissExecute
            );
        }
    }

    #[test]
    fn test_criminal_tier_split() {
        let policy = FreshnessPolicy::defaults();
        assert_eq!(
            policy.resolve(CheckType::Criminal, Tier::Standard, Some(FreshnessState::Stale)),
            CacheDecision::UseStaleFlagAndRefresh
        );
        assert_eq!(
            policy.resolve(CheckType::Criminal, Tier::Enhanced, Some(FreshnessState::Stale)),
            CacheDecision::BlockRefresh
        );
    }

    #[test]
    fn test_fresh_hit_is_used() {
        let policy = FreshnessPolicy::defaults();
        assert_eq!(
            policy.resolve(CheckType::Civil, Tier::Enhanced, Some(FreshnessState::Fresh)),
            CacheDecision::UseFresh
        );
    }

    #[test]
    fn test_miss_executes() {
        let policy = FreshnessPolicy::defaults();
        assert_eq!(
            policy.resolve(CheckType::Financial, Tier::Standard, None),
            CacheDecision::MissExecute
        );
    }
}
