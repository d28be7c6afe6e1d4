//! The cache store

use crate::entry::{CacheEntry, Fingerprint, FreshnessState, Origin};
use crate::policy::{CacheDecision, FreshnessPolicy};
use crate::seal::PayloadSealer;
use crate::CacheError;
use chrono::Utc;
use dashmap::DashMap;
use vet_audit::{Actor, AuditCategory, AuditLog};
use vet_common::{AtomicCounter, CustomerId, EntityId, Tier};

/// Who is asking - decides which entries are visible
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
    /// Platform-internal access (vigilance re-screens, refresh workers)
    Platform,
    /// A specific customer's investigation
    Customer(CustomerId),
}

impl CacheScope {
    fn customer(&self) -> Option<&CustomerId> {
        match self {
            Self::Platform => None,
            Self::Customer(id) => Some(id),
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub purges: u64,
}

/// Fingerprint-keyed cache with scoped visibility and write-ahead audit
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    policy: FreshnessPolicy,
    sealer: PayloadSealer,
    hits: AtomicCounter,
    misses: AtomicCounter,
    writes: AtomicCounter,
    purges: AtomicCounter,
}

impl CacheStore {
    /// Store with the default freshness policy and an ephemeral seal key
    pub fn new() -> Self {
        Self::with_policy(FreshnessPolicy::defaults(), PayloadSealer::ephemeral())
    }

    /// Store with explicit policy and sealer
    pub fn with_policy(policy: FreshnessPolicy, sealer: PayloadSealer) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            sealer,
            hits: AtomicCounter::new(0),
            misses: AtomicCounter::new(0),
            writes: AtomicCounter::new(0),
            purges: AtomicCounter::new(0),
        }
    }

    /// The freshness policy in force
    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    /// Look up a fingerprint and resolve it against the freshness policy.
    /// Returns the decision and, when usable, the entry.
    pub fn lookup(
        &self,
        fingerprint: &Fingerprint,
        tier: Tier,
        scope: &CacheScope,
    ) -> (CacheDecision, Option<CacheEntry>) {
        let now = Utc::now();
        let visible = self
            .entries
            .get(&fingerprint.key())
            .filter(|e| e.visible_to(scope.customer()));

        let state = visible.as_ref().map(|e| e.freshness(now));
        let decision = self.policy.resolve(fingerprint.check, tier, state);

        match decision {
            CacheDecision::UseFresh | CacheDecision::UseStaleFlagAndRefresh => {
                self.hits.inc();
                (decision, visible.map(|e| e.value().clone()))
            }
            CacheDecision::BlockRefresh | CacheDecision::MissExecute => {
                self.misses.inc();
                (decision, None)
            }
        }
    }

    /// Raw freshness state, for refresh workers
    pub fn freshness_of(&self, fingerprint: &Fingerprint) -> Option<FreshnessState> {
        self.entries
            .get(&fingerprint.key())
            .map(|e| e.freshness(Utc::now()))
    }

    /// Insert a provider result. The audit append happens first; if it
    /// fails nothing is written (write-ahead discipline). The raw payload
    /// is sealed before it touches the map.
    pub fn put(
        &self,
        mut entry: CacheEntry,
        raw_payload: &[u8],
        audit: &AuditLog,
    ) -> Result<(), CacheError> {
        debug_assert!(entry.acquired_at <= entry.fresh_until);
        debug_assert!(entry.fresh_until <= entry.stale_until);

        audit.append(
            Actor::System,
            AuditCategory::ProviderCall,
            format!("cache-write:{}", entry.fingerprint.key()),
        )?;

        entry.raw_ciphertext = self.sealer.seal(raw_payload);
        self.writes.inc();
        self.entries.insert(entry.fingerprint.key(), entry);
        Ok(())
    }

    /// Open an entry's sealed raw payload. Access is audited.
    pub fn open_raw(
        &self,
        fingerprint: &Fingerprint,
        audit: &AuditLog,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let Some(entry) = self.entries.get(&fingerprint.key()) else {
            return Ok(None);
        };
        audit.append(
            Actor::User,
            AuditCategory::ProviderCall,
            format!("raw-access:{}", fingerprint.key()),
        )?;
        self.sealer.open(&entry.raw_ciphertext).map(Some)
    }

    /// Remove every entry referencing an entity (erasure). Idempotent.
    pub fn purge_entity(&self, entity_id: EntityId) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| {
                e.fingerprint.entity_id == entity_id || e.discovered.contains(&entity_id)
            })
            .map(|e| e.key().clone())
            .collect();
        let removed = keys.len();
        for key in keys {
            self.entries.remove(&key);
        }
        if removed > 0 {
            self.purges.add(removed as u64);
            tracing::info!(%entity_id, removed, "cache entries purged");
        }
        removed
    }

    /// Entries currently stale or expired, for refresh sweeps
    pub fn stale_fingerprints(&self) -> Vec<Fingerprint> {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|e| e.freshness(now) != FreshnessState::Fresh)
            .map(|e| e.fingerprint.clone())
            .collect()
    }

    /// Store statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.get(),
            misses: self.misses.get(),
            writes: self.writes.get(),
            purges: self.purges.get(),
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}
