//! Provider plug-in contract

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use vet_common::{
    CheckType, Degree, EntityId, Finding, Locale, ProviderClass, ProviderId, SourceCategory,
    VetResult,
};
use vet_entity::{EntityKind, RelationKind};

/// Relative provider cost, used for routing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    Low,
    Standard,
    Premium,
}

/// Subject attributes handed to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRef {
    pub entity_id: EntityId,
    pub name: String,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Query narrowing parameter (county, employer name, date range...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

impl QueryParam {
    /// Build a parameter
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One demand as a provider sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub check: CheckType,
    pub subject: SubjectRef,
    pub locale: Locale,
    pub degree: Degree,
    #[serde(default)]
    pub params: Vec<QueryParam>,
}

/// A related entity surfaced by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredEntity {
    pub name: String,
    pub kind: EntityKind,
    pub relation: RelationKind,
    /// Strength of the link in [0, 1]
    pub link_strength: f64,
}

/// Normalized provider output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Findings already normalized by the provider's normalizer
    pub findings: Vec<Finding>,
    pub discovered: Vec<DiscoveredEntity>,
    pub cost: f64,
    pub currency: String,
    /// Opaque raw payload; sealed before storage
    pub raw: Vec<u8>,
}

/// Provider self-reported health
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub latency_ms: u64,
}

/// The plug-in contract every external data provider implements
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable registry identifier
    fn provider_id(&self) -> ProviderId;

    /// Provider class used in cache fingerprints - failover inside a
    /// class still coalesces to one cached result
    fn provider_class(&self) -> &str;

    /// Core or premium
    fn tier_category(&self) -> ProviderClass;

    /// Checks this provider can serve
    fn supported_checks(&self) -> &[CheckType];

    /// Locale coverage
    fn supports_locale(&self, locale: &Locale) -> bool;

    /// Relative cost for routing order
    fn cost_tier(&self) -> CostTier;

    /// Source category for compliance evaluation
    fn source_category(&self) -> SourceCategory;

    /// Execute a request and return normalized results
    async fn execute(&self, request: &ProviderRequest) -> VetResult<ProviderResponse>;

    /// Liveness probe
    async fn health(&self) -> ProviderHealth;
}
