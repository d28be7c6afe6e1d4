//! Checkpoint persistence for in-flight investigations
//!
//! State is persisted at every phase boundary and on explicit calls.
//! Resume revalidates finding emission against the
//! (investigation, fingerprint, iteration) key set, so no finding is
//! emitted twice for the same key.

use crate::phases::Phase;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use vet_audit::{Actor, AuditCategory, AuditLog};
use vet_common::{
    CheckType, EntityId, ExcludedCheck, Finding, InvestigationId, VetError, VetResult,
};
use vet_sar::KnowledgeBase;

/// Serialized state of an in-flight investigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationCheckpoint {
    pub investigation_id: InvestigationId,
    pub entity_id: EntityId,
    /// The last phase that fully completed
    pub completed_phase: Option<Phase>,
    pub knowledge_base: KnowledgeBase,
    /// Emission keys already used: "fingerprint:iteration:correlation"
    pub emitted_keys: HashSet<String>,
    pub findings: Vec<Finding>,
    /// Fingerprint keys of provider calls in flight at checkpoint time;
    /// resume consults the cache for these before re-issuing
    pub pending_fingerprints: Vec<String>,
    pub stale_sources: Vec<CheckType>,
    pub excluded_checks: Vec<ExcludedCheck>,
    pub deferred_network: Vec<EntityId>,
    pub sanctioned: HashSet<EntityId>,
    pub visited: HashSet<EntityId>,
    pub created_at: DateTime<Utc>,
}

/// In-memory checkpoint store keyed by investigation
pub struct CheckpointStore {
    checkpoints: DashMap<InvestigationId, InvestigationCheckpoint>,
}

impl CheckpointStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            checkpoints: DashMap::new(),
        }
    }

    /// Persist a checkpoint; audited before it becomes visible
    pub fn save(
        &self,
        checkpoint: InvestigationCheckpoint,
        audit: &AuditLog,
    ) -> VetResult<()> {
        audit
            .append(
                Actor::System,
                AuditCategory::Checkpoint,
                format!(
                    "checkpoint:{}:{}",
                    checkpoint.investigation_id,
                    checkpoint
                        .completed_phase
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "start".into())
                ),
            )
            .map_err(|e| VetError::AuditWriteFailed(e.to_string()))?;
        self.checkpoints
            .insert(checkpoint.investigation_id, checkpoint);
        Ok(())
    }

    /// Load the latest checkpoint for an investigation
    pub fn load(&self, investigation_id: InvestigationId) -> Option<InvestigationCheckpoint> {
        self.checkpoints
            .get(&investigation_id)
            .map(|c| c.clone())
    }

    /// Drop a finished investigation's checkpoint
    pub fn remove(&self, investigation_id: InvestigationId) {
        self.checkpoints.remove(&investigation_id);
    }

    /// Checkpoints currently held
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// True when no checkpoint is held
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vet_common::ProviderId;
    use vet_sar::{Fact, FactKind};

    fn checkpoint() -> InvestigationCheckpoint {
        let mut kb = KnowledgeBase::new();
        kb.assimilate(
            Fact::new(FactKind::Name, "Jane Roe", 0.95, ProviderId::new("customer")),
            0.7,
            |_| 0,
        );
        InvestigationCheckpoint {
            investigation_id: InvestigationId::new(),
            entity_id: EntityId::new(),
            completed_phase: Some(Phase::Records),
            knowledge_base: kb,
            emitted_keys: ["fp-1:1:abc".to_string()].into_iter().collect(),
            findings: Vec::new(),
            pending_fingerprints: vec!["fp-2".into()],
            stale_sources: vec![CheckType::Criminal],
            excluded_checks: Vec::new(),
            deferred_network: Vec::new(),
            sanctioned: HashSet::new(),
            visited: HashSet::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = CheckpointStore::new();
        let audit = AuditLog::new();
        let original = checkpoint();
        let id = original.investigation_id;

        store.save(original.clone(), &audit).unwrap();
        let restored = store.load(id).unwrap();
        assert_eq!(restored, original);
        assert_eq!(audit.by_category(AuditCategory::Checkpoint).len(), 1);
    }

    #[test]
    fn test_serde_roundtrip_preserves_state() {
        let original = checkpoint();
        let json = serde_json::to_string(&original).unwrap();
        let back: InvestigationCheckpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
        assert!(back.knowledge_base.has_confirmed(FactKind::Name));
    }

    #[test]
    fn test_save_requires_audit() {
        let store = CheckpointStore::new();
        let audit = AuditLog::new();
        audit.seal();
        let cp = checkpoint();
        let id = cp.investigation_id;
        assert!(store.save(cp, &audit).is_err());
        assert!(store.load(id).is_none());
    }
}
