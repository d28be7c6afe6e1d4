//! Connection graph with degree-of-discovery
//!
//! The graph may contain cycles; expansion safety comes from the
//! caller's visited set, not from the structure.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use vet_common::{Connection, Degree, EntityId};

/// How two entities are related
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Employer,
    Associate,
    FamilyMember,
    BusinessPartner,
    Officer,
    SharedAddress,
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Employer => "employer",
            Self::Associate => "associate",
            Self::FamilyMember => "family_member",
            Self::BusinessPartner => "business_partner",
            Self::Officer => "officer",
            Self::SharedAddress => "shared_address",
        };
        f.write_str(s)
    }
}

/// A directed edge discovered during investigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub to: EntityId,
    pub relation: RelationKind,
    /// Strength of the link in [0, 1]
    pub link_strength: f64,
    /// Degree at which the edge was discovered
    pub degree_of_discovery: Degree,
    pub first_seen: DateTime<Utc>,
}

/// Result of capped expansion selection
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionSelection {
    /// Entities to investigate, in priority order
    pub selected: Vec<EntityId>,
    /// Entities over the cap, recorded as deferred
    pub deferred: Vec<EntityId>,
}

/// Entity connection graph
pub struct ConnectionGraph {
    edges: DashMap<EntityId, Vec<Edge>>,
}

impl ConnectionGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self {
            edges: DashMap::new(),
        }
    }

    /// Add an edge; duplicate (to, relation) pairs keep the stronger link
    pub fn add_edge(&self, from: EntityId, edge: Edge) {
        let mut edges = self.edges.entry(from).or_default();
        if let Some(existing) = edges
            .iter_mut()
            .find(|e| e.to == edge.to && e.relation == edge.relation)
        {
            if edge.link_strength > existing.link_strength {
                existing.link_strength = edge.link_strength;
            }
            return;
        }
        edges.push(edge);
    }

    /// Outgoing edges of an entity
    pub fn connections_of(&self, entity: EntityId) -> Vec<Edge> {
        self.edges
            .get(&entity)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Number of outgoing connections
    pub fn connection_count(&self, entity: EntityId) -> usize {
        self.edges.get(&entity).map(|e| e.len()).unwrap_or(0)
    }

    /// Profile-facing connection records for an entity
    pub fn profile_connections(&self, entity: EntityId) -> Vec<Connection> {
        self.connections_of(entity)
            .into_iter()
            .map(|e| Connection {
                entity_id: e.to,
                relation: e.relation.to_string(),
                link_strength: e.link_strength,
                degree: e.degree_of_discovery,
                first_seen: e.first_seen,
            })
            .collect()
    }

    /// Select up to `cap` related entities for network expansion.
    ///
    /// Order: link_strength descending, then first_seen ascending.
    /// Entities in `visited` are skipped entirely (cycle guard); the
    /// overflow is returned as deferred.
    pub fn select_for_expansion(
        &self,
        from: EntityId,
        cap: usize,
        visited: &std::collections::HashSet<EntityId>,
    ) -> ExpansionSelection {
        let mut candidates: Vec<Edge> = self
            .connections_of(from)
            .into_iter()
            .filter(|e| !visited.contains(&e.to))
            .collect();

        candidates.sort_by(|a, b| {
            b.link_strength
                .total_cmp(&a.link_strength)
                .then(a.first_seen.cmp(&b.first_seen))
        });

        // an entity reachable by several relations appears once
        let mut seen = std::collections::HashSet::new();
        let ordered: Vec<EntityId> = candidates
            .into_iter()
            .filter(|e| seen.insert(e.to))
            .map(|e| e.to)
            .collect();

        let selected = ordered.iter().take(cap).copied().collect();
        let deferred = ordered.iter().skip(cap).copied().collect();
        ExpansionSelection { selected, deferred }
    }

    /// Remove every edge touching an entity (erasure). Idempotent.
    pub fn erase_entity(&self, entity: EntityId) -> usize {
        let mut removed = self.edges.remove(&entity).map(|(_, e)| e.len()).unwrap_or(0);
        for mut edges in self.edges.iter_mut() {
            let before = edges.len();
            edges.retain(|e| e.to != entity);
            removed += before - edges.len();
        }
        removed
    }
}

impl Default for ConnectionGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn edge(to: EntityId, strength: f64, seen_offset_secs: i64) -> Edge {
        Edge {
            to,
            relation: RelationKind::Associate,
            link_strength: strength,
            degree_of_discovery: Degree::D2,
            first_seen: Utc::now() + chrono::Duration::seconds(seen_offset_secs),
        }
    }

    #[test]
    fn test_expansion_cap_and_ordering() {
        let graph = ConnectionGraph::new();
        let subject = EntityId::new();
        let strong = EntityId::new();
        let weak = EntityId::new();
        let earliest_mid = EntityId::new();
        let later_mid = EntityId::new();

        graph.add_edge(subject, edge(weak, 0.2, 0));
        graph.add_edge(subject, edge(strong, 0.9, 0));
        graph.add_edge(subject, edge(later_mid, 0.5, 100));
        graph.add_edge(subject, edge(earliest_mid, 0.5, -100));

        let selection = graph.select_for_expansion(subject, 3, &HashSet::new());
        assert_eq!(selection.selected, vec![strong, earliest_mid, later_mid]);
        assert_eq!(selection.deferred, vec![weak]);
    }

    #[test]
    fn test_visited_entities_skipped() {
        let graph = ConnectionGraph::new();
        let subject = EntityId::new();
        let a = EntityId::new();
        let b = EntityId::new();
        graph.add_edge(subject, edge(a, 0.9, 0));
        graph.add_edge(subject, edge(b, 0.8, 0));

        let visited: HashSet<_> = [a].into_iter().collect();
        let selection = graph.select_for_expansion(subject, 10, &visited);
        assert_eq!(selection.selected, vec![b]);
    }

    #[test]
    fn test_duplicate_edge_keeps_stronger() {
        let graph = ConnectionGraph::new();
        let subject = EntityId::new();
        let other = EntityId::new();
        graph.add_edge(subject, edge(other, 0.3, 0));
        graph.add_edge(subject, edge(other, 0.7, 0));
        graph.add_edge(subject, edge(other, 0.5, 0));

        let edges = graph.connections_of(subject);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].link_strength, 0.7);
    }

    #[test]
    fn test_erase_removes_both_directions() {
        let graph = ConnectionGraph::new();
        let a = EntityId::new();
        let b = EntityId::new();
        graph.add_edge(a, edge(b, 0.5, 0));
        graph.add_edge(b, edge(a, 0.5, 0));

        assert_eq!(graph.erase_entity(a), 2);
        assert_eq!(graph.connection_count(b), 0);
        assert_eq!(graph.erase_entity(a), 0);
    }
}
