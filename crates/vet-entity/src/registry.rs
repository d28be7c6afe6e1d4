//! Canonical entity registry with forwarding merges

use crate::model::{Entity, StrongIdentifier};
use crate::EntityError;
use chrono::Utc;
use dashmap::DashMap;
use vet_audit::{Actor, AuditCategory, AuditLog};
use vet_common::EntityId;

/// Entity registry
///
/// Strong identifiers index to exactly one entity. Merged entities keep
/// a forwarding pointer; `resolve_id` follows the chain to the canonical
/// record.
pub struct EntityRegistry {
    entities: DashMap<EntityId, Entity>,
    strong_index: DashMap<StrongIdentifier, EntityId>,
}

impl EntityRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            entities: DashMap::new(),
            strong_index: DashMap::new(),
        }
    }

    /// Insert a new entity. Strong identifiers must not collide.
    pub fn insert(&self, entity: Entity) -> Result<EntityId, EntityError> {
        for ident in &entity.identifiers {
            if let Some(existing) = self.strong_index.get(ident) {
                return Err(EntityError::IdentifierConflict(*existing));
            }
        }
        let id = entity.id;
        for ident in &entity.identifiers {
            self.strong_index.insert(ident.clone(), id);
        }
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Follow forwarding pointers to the canonical id
    pub fn resolve_id(&self, id: EntityId) -> Option<EntityId> {
        let mut current = id;
        // bounded walk guards against a malformed pointer cycle
        for _ in 0..16 {
            match self.entities.get(&current) {
                Some(e) => match e.merged_into {
                    Some(next) => current = next,
                    None => return Some(current),
                },
                None => return None,
            }
        }
        None
    }

    /// Canonical entity for an id, following merges
    pub fn get(&self, id: EntityId) -> Option<Entity> {
        let canonical = self.resolve_id(id)?;
        self.entities.get(&canonical).map(|e| e.clone())
    }

    /// Entity bound to a strong identifier
    pub fn by_strong_identifier(&self, ident: &StrongIdentifier) -> Option<Entity> {
        let id = *self.strong_index.get(ident)?;
        self.get(id)
    }

    /// All live (unmerged, unerased) entities
    pub fn live_entities(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .filter(|e| e.merged_into.is_none() && !e.erased)
            .map(|e| e.clone())
            .collect()
    }

    /// Mutate an entity in place
    pub fn update(&self, id: EntityId, f: impl FnOnce(&mut Entity)) -> Result<(), EntityError> {
        let canonical = self.resolve_id(id).ok_or(EntityError::NotFound(id))?;
        let mut entry = self
            .entities
            .get_mut(&canonical)
            .ok_or(EntityError::NotFound(id))?;
        f(&mut entry);
        entry.last_updated = Utc::now();
        Ok(())
    }

    /// Merge `source` into `target` on a confirmed match.
    ///
    /// The source keeps a forwarding pointer; its identifiers and aliases
    /// move to the target. Recorded in audit before the merge applies.
    pub fn merge(
        &self,
        source: EntityId,
        target: EntityId,
        audit: &AuditLog,
    ) -> Result<(), EntityError> {
        let source = self.resolve_id(source).ok_or(EntityError::NotFound(source))?;
        let target = self.resolve_id(target).ok_or(EntityError::NotFound(target))?;
        if source == target {
            return Err(EntityError::SelfMerge);
        }

        audit.append(
            Actor::System,
            AuditCategory::Merge,
            format!("merge:{source}->{target}"),
        )?;

        let (identifiers, aliases, name) = {
            let mut src = self
                .entities
                .get_mut(&source)
                .ok_or(EntityError::NotFound(source))?;
            src.merged_into = Some(target);
            src.last_updated = Utc::now();
            (
                std::mem::take(&mut src.identifiers),
                std::mem::take(&mut src.aliases),
                src.weak.name.clone(),
            )
        };

        for ident in &identifiers {
            self.strong_index.insert(ident.clone(), target);
        }

        self.update(target, |t| {
            t.identifiers.extend(identifiers);
            t.aliases.extend(aliases);
            if !name.is_empty() && t.weak.name != name && !t.aliases.contains(&name) {
                t.aliases.push(name);
            }
        })?;

        tracing::info!(%source, %target, "entities merged");
        Ok(())
    }

    /// Erase an entity: blank PII, drop strong identifiers, keep the
    /// record as an anonymized tombstone. Idempotent.
    pub fn erase(&self, id: EntityId, audit: &AuditLog) -> Result<bool, EntityError> {
        let Some(canonical) = self.resolve_id(id) else {
            return Ok(false);
        };
        let already_erased = self
            .entities
            .get(&canonical)
            .map(|e| e.erased)
            .unwrap_or(true);
        if already_erased {
            return Ok(false);
        }

        audit.append(
            Actor::User,
            AuditCategory::Erasure,
            format!("erase:{canonical}"),
        )?;

        let identifiers = {
            let mut entry = self
                .entities
                .get_mut(&canonical)
                .ok_or(EntityError::NotFound(id))?;
            entry.erased = true;
            entry.weak = Default::default();
            entry.aliases.clear();
            entry.last_updated = Utc::now();
            std::mem::take(&mut entry.identifiers)
        };
        for ident in identifiers {
            self.strong_index.remove(&ident);
        }
        Ok(true)
    }

    /// Number of registered entities (including merged tombstones)
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, WeakIdentity};

    fn person(name: &str, ids: Vec<StrongIdentifier>) -> Entity {
        Entity::new(
            EntityKind::Individual,
            WeakIdentity {
                name: name.into(),
                dob: None,
                address: None,
            },
            ids,
        )
    }

    #[test]
    fn test_strong_identifier_uniqueness() {
        let registry = EntityRegistry::new();
        let ssn = StrongIdentifier::GovernmentId("123-45-6789".into());
        registry.insert(person("Ada", vec![ssn.clone()])).unwrap();

        let err = registry.insert(person("Ada L.", vec![ssn])).unwrap_err();
        assert!(matches!(err, EntityError::IdentifierConflict(_)));
    }

    #[test]
    fn test_merge_forwards_references() {
        let registry = EntityRegistry::new();
        let audit = AuditLog::new();
        let a = registry.insert(person("J. Smith", vec![])).unwrap();
        let b = registry
            .insert(person(
                "John Smith",
                vec![StrongIdentifier::Passport("P123".into())],
            ))
            .unwrap();

        registry.merge(a, b, &audit).unwrap();

        // the old id resolves to the canonical entity
        let resolved = registry.get(a).unwrap();
        assert_eq!(resolved.id, b);
        assert!(resolved.aliases.contains(&"J. Smith".to_string()));
        assert_eq!(audit.by_category(AuditCategory::Merge).len(), 1);
    }

    #[test]
    fn test_merge_into_self_rejected() {
        let registry = EntityRegistry::new();
        let audit = AuditLog::new();
        let a = registry.insert(person("Solo", vec![])).unwrap();
        assert!(matches!(
            registry.merge(a, a, &audit),
            Err(EntityError::SelfMerge)
        ));
    }

    #[test]
    fn test_erase_is_idempotent() {
        let registry = EntityRegistry::new();
        let audit = AuditLog::new();
        let id = registry
            .insert(person(
                "Target",
                vec![StrongIdentifier::GovernmentId("999".into())],
            ))
            .unwrap();

        assert!(registry.erase(id, &audit).unwrap());
        assert!(!registry.erase(id, &audit).unwrap());

        let erased = registry.get(id).unwrap();
        assert!(erased.erased);
        assert!(erased.weak.name.is_empty());
        assert!(erased.identifiers.is_empty());
        assert_eq!(audit.by_category(AuditCategory::Erasure).len(), 1);
    }
}
