//! Human review queue for ambiguous matches

use crate::registry::EntityRegistry;
use crate::EntityError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use vet_audit::{Actor, AuditCategory, AuditLog};
use vet_common::{EntityId, ReviewTaskId};

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Resolved,
}

/// Reviewer verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// The provisional entity is the same person: merge into candidate
    SameEntity,
    /// Distinct: confirm the provisional entity as its own record
    DistinctEntity,
}

/// A pending ambiguity review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewTask {
    pub id: ReviewTaskId,
    /// The provisional entity created for the incoming identity
    pub provisional: EntityId,
    /// The existing entity it may match
    pub candidate_match: EntityId,
    pub score: f64,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub decision: Option<ReviewDecision>,
}

/// Queue of ambiguity reviews
pub struct ReviewQueue {
    tasks: DashMap<ReviewTaskId, ReviewTask>,
}

impl ReviewQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Enqueue a review; audited
    pub fn enqueue(
        &self,
        provisional: EntityId,
        candidate_match: EntityId,
        score: f64,
        audit: &AuditLog,
    ) -> Result<ReviewTaskId, EntityError> {
        let task = ReviewTask {
            id: ReviewTaskId::new(),
            provisional,
            candidate_match,
            score,
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
            decision: None,
        };
        audit.append(
            Actor::System,
            AuditCategory::ReviewDecision,
            format!("review-open:{}", task.id),
        )?;
        let id = task.id;
        tracing::info!(task = %id, %provisional, score, "ambiguity review enqueued");
        self.tasks.insert(id, task);
        Ok(id)
    }

    /// Apply a reviewer decision: merge or confirm the provisional entity
    pub fn resolve(
        &self,
        task_id: ReviewTaskId,
        decision: ReviewDecision,
        registry: &EntityRegistry,
        audit: &AuditLog,
    ) -> Result<(), EntityError> {
        let (provisional, candidate) = {
            let task = self
                .tasks
                .get(&task_id)
                .ok_or(EntityError::ReviewTaskNotFound(task_id))?;
            (task.provisional, task.candidate_match)
        };

        audit.append(
            Actor::User,
            AuditCategory::ReviewDecision,
            format!("review-close:{task_id}:{decision:?}"),
        )?;

        match decision {
            ReviewDecision::SameEntity => {
                registry.merge(provisional, candidate, audit)?;
            }
            ReviewDecision::DistinctEntity => {
                registry.update(provisional, |e| {
                    e.provisional = false;
                })?;
            }
        }

        if let Some(mut task) = self.tasks.get_mut(&task_id) {
            task.status = ReviewStatus::Resolved;
            task.resolved_at = Some(Utc::now());
            task.decision = Some(decision);
        }
        Ok(())
    }

    /// Tasks still awaiting a reviewer
    pub fn pending(&self) -> Vec<ReviewTask> {
        self.tasks
            .iter()
            .filter(|t| t.status == ReviewStatus::Pending)
            .map(|t| t.clone())
            .collect()
    }

    /// Look up one task
    pub fn get(&self, id: ReviewTaskId) -> Option<ReviewTask> {
        self.tasks.get(&id).map(|t| t.clone())
    }
}

impl Default for ReviewQueue {
    fn default() -> Self {
        Self::new()
    }
}
