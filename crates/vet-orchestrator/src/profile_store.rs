//! Versioned profile store

use crate::OrchestratorError;
use dashmap::DashMap;
use vet_common::{EntityId, EntityProfile};

/// Append-only versioned profiles per entity
pub struct ProfileStore {
    profiles: DashMap<EntityId, Vec<EntityProfile>>,
}

impl ProfileStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    /// The version the next profile for this entity must carry
    pub fn next_version(&self, entity_id: EntityId) -> u32 {
        self.profiles
            .get(&entity_id)
            .map(|versions| versions.len() as u32 + 1)
            .unwrap_or(1)
    }

    /// Append a profile version.
    ///
    /// Versions are strictly monotonic per entity and every version
    /// above 1 must reference its predecessor through a delta.
    pub fn append(&self, profile: EntityProfile) -> Result<(), OrchestratorError> {
        let mut versions = self.profiles.entry(profile.entity_id).or_default();
        let expected = versions.len() as u32 + 1;
        if profile.version != expected {
            return Err(OrchestratorError::VersionOutOfOrder {
                got: profile.version,
                expected,
            });
        }
        if profile.version > 1 && profile.delta.is_none() {
            return Err(OrchestratorError::MissingDelta(profile.version));
        }
        tracing::info!(
            entity = %profile.entity_id,
            version = profile.version,
            findings = profile.findings.len(),
            score = profile.risk_score.overall,
            "profile version stored"
        );
        versions.push(profile);
        Ok(())
    }

    /// Latest version for an entity
    pub fn latest(&self, entity_id: EntityId) -> Option<EntityProfile> {
        self.profiles
            .get(&entity_id)
            .and_then(|versions| versions.last().cloned())
    }

    /// Full version history, oldest first
    pub fn history(&self, entity_id: EntityId) -> Vec<EntityProfile> {
        self.profiles
            .get(&entity_id)
            .map(|versions| versions.clone())
            .unwrap_or_default()
    }

    /// Remove an entity's profiles (erasure). Returns versions removed.
    pub fn erase(&self, entity_id: EntityId) -> usize {
        self.profiles
            .remove(&entity_id)
            .map(|(_, versions)| versions.len())
            .unwrap_or(0)
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vet_common::{
        ProfileDelta, ProfileStatus, ProfileTrigger, RiskBand, RiskScore,
    };

    fn profile(entity_id: EntityId, version: u32, delta: Option<ProfileDelta>) -> EntityProfile {
        EntityProfile {
            entity_id,
            version,
            created_at: Utc::now(),
            trigger: ProfileTrigger::Investigation,
            status: ProfileStatus::Complete,
            findings: Vec::new(),
            risk_score: RiskScore {
                overall: 0.0,
                by_category: Default::default(),
                band: RiskBand::Low,
            },
            connections: Vec::new(),
            stale_sources: Vec::new(),
            excluded_checks: Vec::new(),
            deferred_network: Vec::new(),
            delta,
        }
    }

    fn empty_delta(previous: u32) -> ProfileDelta {
        ProfileDelta {
            previous_version: previous,
            new_findings: Vec::new(),
            resolved_findings: Vec::new(),
            changed_findings: Vec::new(),
            risk_score_change: 0.0,
            connection_count_change: 0,
            evolution_signals: Vec::new(),
        }
    }

    #[test]
    fn test_versions_are_monotone() {
        let store = ProfileStore::new();
        let entity = EntityId::new();
        store.append(profile(entity, 1, None)).unwrap();

        let err = store.append(profile(entity, 3, None)).unwrap_err();
        assert!(matches!(err, OrchestratorError::VersionOutOfOrder { .. }));

        store
            .append(profile(entity, 2, Some(empty_delta(1))))
            .unwrap();
        assert_eq!(store.latest(entity).unwrap().version, 2);
    }

    #[test]
    fn test_v2_requires_delta() {
        let store = ProfileStore::new();
        let entity = EntityId::new();
        store.append(profile(entity, 1, None)).unwrap();
        let err = store.append(profile(entity, 2, None)).unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingDelta(2)));
    }

    #[test]
    fn test_erase_idempotent() {
        let store = ProfileStore::new();
        let entity = EntityId::new();
        store.append(profile(entity, 1, None)).unwrap();
        assert_eq!(store.erase(entity), 1);
        assert_eq!(store.erase(entity), 0);
        assert_eq!(store.next_version(entity), 1);
    }
}
