//! Cache entries and fingerprints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vet_common::{CheckType, CustomerId, Degree, EntityId, Finding, Locale};

/// Identity of a unique cacheable demand
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub entity_id: EntityId,
    /// Provider class, not a concrete provider: failover within a class
    /// must still coalesce
    pub provider_class: String,
    pub check: CheckType,
    pub locale: Locale,
    pub degree_scope: Degree,
}

impl Fingerprint {
    /// Stable hex key for maps and audit payload references
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.entity_id.0.as_bytes());
        hasher.update(self.provider_class.as_bytes());
        hasher.update(self.check.to_string().as_bytes());
        hasher.update(self.locale.to_string().as_bytes());
        hasher.update([self.degree_scope as u8]);
        hex::encode(&hasher.finalize()[..16])
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.entity_id, self.provider_class, self.check, self.locale
        )
    }
}

/// Where the cached data came from, which decides its visibility scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Shared platform-wide
    PaidExternal,
    /// Isolated to the providing customer
    CustomerProvided(CustomerId),
}

/// Derived freshness state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessState {
    Fresh,
    Stale,
    Expired,
}

/// A cached provider result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub origin: Origin,
    pub acquired_at: DateTime<Utc>,
    pub fresh_until: DateTime<Utc>,
    pub stale_until: DateTime<Utc>,
    /// Normalized findings from the provider's normalizer
    pub findings: Vec<Finding>,
    /// Discovered related entities (name, relation, strength handled upstream)
    pub discovered: Vec<EntityId>,
    /// Sealed raw provider payload - opaque outside audited access
    pub raw_ciphertext: Vec<u8>,
    pub cost: f64,
}

impl CacheEntry {
    /// Derive freshness at `now`. Windows are ordered
    /// `acquired_at <= fresh_until <= stale_until` by construction.
    pub fn freshness(&self, now: DateTime<Utc>) -> FreshnessState {
        if now <= self.fresh_until {
            FreshnessState::Fresh
        } else if now <= self.stale_until {
            FreshnessState::Stale
        } else {
            FreshnessState::Expired
        }
    }

    /// Visibility check: customer-provided entries never cross customers
    pub fn visible_to(&self, customer: Option<&CustomerId>) -> bool {
        match &self.origin {
            Origin::PaidExternal => true,
            Origin::CustomerProvided(owner) => customer == Some(owner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fingerprint() -> Fingerprint {
        Fingerprint {
            entity_id: EntityId::new(),
            provider_class: "criminal-county".into(),
            check: CheckType::Criminal,
            locale: Locale::country("US"),
            degree_scope: Degree::D1,
        }
    }

    fn entry(acquired: DateTime<Utc>, fresh_days: i64, stale_days: i64) -> CacheEntry {
        CacheEntry {
            fingerprint: fingerprint(),
            origin: Origin::PaidExternal,
            acquired_at: acquired,
            fresh_until: acquired + Duration::days(fresh_days),
            stale_until: acquired + Duration::days(stale_days),
            findings: Vec::new(),
            discovered: Vec::new(),
            raw_ciphertext: Vec::new(),
            cost: 1.0,
        }
    }

    #[test]
    fn test_freshness_windows() {
        let acquired = Utc::now() - Duration::days(14);
        let e = entry(acquired, 7, 30);
        assert_eq!(e.freshness(Utc::now()), FreshnessState::Stale);
        assert_eq!(e.freshness(acquired + Duration::days(1)), FreshnessState::Fresh);
        assert_eq!(e.freshness(acquired + Duration::days(31)), FreshnessState::Expired);
    }

    #[test]
    fn test_customer_isolation() {
        let owner = CustomerId::new();
        let other = CustomerId::new();
        let mut e = entry(Utc::now(), 7, 30);
        e.origin = Origin::CustomerProvided(owner);

        assert!(e.visible_to(Some(&owner)));
        assert!(!e.visible_to(Some(&other)));
        assert!(!e.visible_to(None));
    }

    #[test]
    fn test_fingerprint_key_is_stable() {
        let fp = fingerprint();
        assert_eq!(fp.key(), fp.key());

        let mut other = fp.clone();
        other.check = CheckType::Civil;
        assert_ne!(fp.key(), other.key());
    }

    proptest::proptest! {
        #[test]
        fn prop_freshness_respects_window_order(
            age_hours in 0i64..2000,
            fresh_hours in 1i64..500,
            stale_extra_hours in 0i64..500,
        ) {
            let acquired = Utc::now() - Duration::hours(age_hours);
            let mut e = entry(acquired, 0, 0);
            e.fresh_until = acquired + Duration::hours(fresh_hours);
            e.stale_until = e.fresh_until + Duration::hours(stale_extra_hours);

            let now = Utc::now();
            match e.freshness(now) {
                FreshnessState::Fresh => proptest::prop_assert!(now <= e.fresh_until),
                FreshnessState::Stale => {
                    proptest::prop_assert!(now > e.fresh_until && now <= e.stale_until)
                }
                FreshnessState::Expired => proptest::prop_assert!(now > e.stale_until),
            }
        }
    }
}
