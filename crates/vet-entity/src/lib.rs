//! Entity registry, resolution, and the connection graph
//!
//! Entities are canonical: at most one per strong-identifier
//! equivalence class. Merges keep forwarding pointers so stale
//! references still resolve. Fuzzy resolution is tier-aware; the
//! Enhanced tier routes the ambiguous band to human review.

#![warn(missing_docs)]

pub mod graph;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod review;

pub use graph::{ConnectionGraph, Edge, ExpansionSelection, RelationKind};
pub use model::{CandidateIdentity, Entity, EntityKind, StrongIdentifier, WeakIdentity};
pub use registry::EntityRegistry;
pub use resolver::{EntityResolver, ResolutionOutcome, ResolverThresholds};
pub use review::{ReviewDecision, ReviewQueue, ReviewStatus, ReviewTask};

use thiserror::Error;

/// Entity subsystem errors
#[derive(Debug, Error)]
pub enum EntityError {
    /// Unknown entity id
    #[error("entity not found: {0}")]
    NotFound(vet_common::EntityId),

    /// Unknown review task id
    #[error("review task not found: {0}")]
    ReviewTaskNotFound(vet_common::ReviewTaskId),

    /// Merge target and source are the same entity
    #[error("cannot merge an entity into itself")]
    SelfMerge,

    /// A strong identifier is already bound to another entity
    #[error("strong identifier already registered to {0}")]
    IdentifierConflict(vet_common::EntityId),

    /// Audit write-ahead failed; the operation was aborted
    #[error(transparent)]
    Audit(#[from] vet_audit::AuditError),
}
