//! Entity model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use vet_common::EntityId;

/// What the entity is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Individual,
    Organization,
    Address,
}

/// Identifiers that uniquely determine an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrongIdentifier {
    GovernmentId(String),
    Ein(String),
    Passport(String),
}

/// Weak identity attributes used for fuzzy matching
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeakIdentity {
    pub name: String,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
}

/// A canonical entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub identifiers: Vec<StrongIdentifier>,
    pub weak: WeakIdentity,
    pub aliases: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Forwarding pointer set on merge; old references still resolve
    pub merged_into: Option<EntityId>,
    /// Set by erasure; PII fields are blanked when true
    pub erased: bool,
    /// Fuzzy resolution landed in the uncertain band
    pub uncertain_match: bool,
    /// Enhanced-tier provisional entity awaiting review
    pub provisional: bool,
}

impl Entity {
    /// New entity from a candidate identity
    pub fn new(kind: EntityKind, weak: WeakIdentity, identifiers: Vec<StrongIdentifier>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            kind,
            identifiers,
            weak,
            aliases: Vec::new(),
            first_seen: now,
            last_updated: now,
            merged_into: None,
            erased: false,
            uncertain_match: false,
            provisional: false,
        }
    }
}

/// Incoming identity to resolve against the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub kind: EntityKind,
    pub weak: WeakIdentity,
    #[serde(default)]
    pub identifiers: Vec<StrongIdentifier>,
}

impl CandidateIdentity {
    /// Individual with name only
    pub fn individual(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Individual,
            weak: WeakIdentity {
                name: name.into(),
                dob: None,
                address: None,
            },
            identifiers: Vec::new(),
        }
    }
}
