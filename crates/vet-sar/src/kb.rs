//! Per-investigation knowledge base
//!
//! Facts accumulate monotonically within an investigation. A fact below
//! the confidence floor stays unconfirmed until a second source
//! corroborates it. Conflicts on single-valued kinds resolve
//! deterministically: highest confidence wins, ties go to the earliest
//! provider in registry order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vet_common::ProviderId;

/// Kinds of facts the investigation accumulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Name,
    Dob,
    Address,
    Employer,
    School,
    License,
    DiscoveredPerson,
    DiscoveredOrg,
    County,
    State,
}

impl FactKind {
    /// Single-valued kinds admit one confirmed value at a time
    pub fn single_valued(&self) -> bool {
        matches!(self, Self::Dob)
    }
}

/// One accumulated fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub kind: FactKind,
    pub value: String,
    pub confidence: f64,
    pub source: ProviderId,
    pub recorded_at: DateTime<Utc>,
    pub confirmed: bool,
    /// Distinct sources that reported this value
    pub corroborations: u32,
}

impl Fact {
    /// Build an unconfirmed fact
    pub fn new(kind: FactKind, value: impl Into<String>, confidence: f64, source: ProviderId) -> Self {
        Self {
            kind,
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
            recorded_at: Utc::now(),
            confirmed: false,
            corroborations: 1,
        }
    }
}

/// Append-only fact store for one investigation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    facts: Vec<Fact>,
}

impl KnowledgeBase {
    /// Empty knowledge base
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a fact in. Returns true when this made a fact newly
    /// confirmed (the assessor's information-gain numerator).
    ///
    /// `registry_order` maps a provider to its admin-configured
    /// position; it breaks confidence ties deterministically.
    pub fn assimilate(
        &mut self,
        incoming: Fact,
        confidence_floor: f64,
        registry_order: impl Fn(&ProviderId) -> usize,
    ) -> bool {
        // same value seen before: corroborate
        if let Some(existing) = self
            .facts
            .iter_mut()
            .find(|f| f.kind == incoming.kind && f.value == incoming.value)
        {
            if existing.source != incoming.source {
                existing.corroborations += 1;
            }
            existing.confidence = existing.confidence.max(incoming.confidence);
            let newly_confirmed = !existing.confirmed
                && (existing.confidence >= confidence_floor || existing.corroborations >= 2);
            if newly_confirmed {
                existing.confirmed = true;
            }
            return newly_confirmed;
        }

        let mut incoming = incoming;
        incoming.confirmed = incoming.confidence >= confidence_floor;

        // single-valued conflict: highest confidence wins, ties to the
        // earliest provider in registry order
        if incoming.kind.single_valued() {
            if let Some(existing) = self
                .facts
                .iter_mut()
                .find(|f| f.kind == incoming.kind && f.confirmed)
            {
                let keep_existing = match existing.confidence.total_cmp(&incoming.confidence) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => {
                        registry_order(&existing.source) <= registry_order(&incoming.source)
                    }
                };
                if keep_existing {
                    incoming.confirmed = false;
                } else {
                    existing.confirmed = false;
                }
            }
        }

        let newly_confirmed = incoming.confirmed;
        self.facts.push(incoming);
        newly_confirmed
    }

    /// Confirmed value conflicting with the incoming fact, if any
    pub fn conflicting_value(&self, kind: FactKind, value: &str) -> Option<&Fact> {
        if !kind.single_valued() {
            return None;
        }
        self.facts
            .iter()
            .find(|f| f.kind == kind && f.confirmed && f.value != value)
    }

    /// Confirmed values of a kind
    pub fn confirmed(&self, kind: FactKind) -> Vec<&Fact> {
        self.facts
            .iter()
            .filter(|f| f.kind == kind && f.confirmed)
            .collect()
    }

    /// Is any value of this kind confirmed
    pub fn has_confirmed(&self, kind: FactKind) -> bool {
        self.facts.iter().any(|f| f.kind == kind && f.confirmed)
    }

    /// Every fact, confirmed or not
    pub fn all(&self) -> &[Fact] {
        &self.facts
    }

    /// Number of confirmed facts
    pub fn confirmed_count(&self) -> usize {
        self.facts.iter().filter(|f| f.confirmed).count()
    }
}
