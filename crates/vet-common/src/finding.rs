//! The Finding model
//!
//! Findings are immutable once emitted; amendments create new findings
//! that reference the prior one via `amends`.

use crate::{DataCategory, Degree, EntityId, FindingId, ProviderId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Contribution weight used by the risk scorer
    pub fn weight(&self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }
}

/// Finding category - the persistence discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Identity,
    Criminal,
    Civil,
    Financial,
    Regulatory,
    Reputation,
    Verification,
    Behavioral,
    Network,
}

/// Where a finding came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub provider_id: ProviderId,
    pub acquired_at: DateTime<Utc>,
    /// True when served from cache rather than a live provider call
    pub cache_hit: bool,
    /// True when the cached entry was past its fresh window
    pub stale: bool,
}

/// Financial event kinds - structured so evolution rules can match them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialEvent {
    CreditScore { score: u16 },
    Bankruptcy,
    Lien,
    Default,
    ShellCompanyIndicator,
    UndisclosedInterest,
}

/// Structured finding details, tagged by category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingDetails {
    Identity {
        matched_name: String,
        dob_verified: bool,
        address_verified: bool,
    },
    Criminal {
        offense: String,
        jurisdiction: String,
        disposition: String,
        offense_date: Option<NaiveDate>,
    },
    Civil {
        case_type: String,
        court: String,
        party_role: String,
        filed_date: Option<NaiveDate>,
    },
    Financial {
        event: FinancialEvent,
        amount: Option<f64>,
        currency: Option<String>,
        reported_at: Option<NaiveDate>,
    },
    Regulatory {
        list_name: String,
        authority: String,
        action: String,
    },
    Reputation {
        headline: String,
        source_name: String,
        topics: Vec<String>,
        data_categories: Vec<DataCategory>,
        redacted: bool,
    },
    Verification {
        claim: String,
        observed: String,
        deception_weight: f64,
    },
    Behavioral {
        indicator: String,
        data_categories: Vec<DataCategory>,
        redacted: bool,
    },
    Network {
        related_entity: EntityId,
        relation: String,
        degree: Degree,
        link_strength: f64,
    },
}

impl FindingDetails {
    /// The category this detail variant belongs to
    pub fn category(&self) -> FindingCategory {
        match self {
            Self::Identity { .. } => FindingCategory::Identity,
            Self::Criminal { .. } => FindingCategory::Criminal,
            Self::Civil { .. } => FindingCategory::Civil,
            Self::Financial { .. } => FindingCategory::Financial,
            Self::Regulatory { .. } => FindingCategory::Regulatory,
            Self::Reputation { .. } => FindingCategory::Reputation,
            Self::Verification { .. } => FindingCategory::Verification,
            Self::Behavioral { .. } => FindingCategory::Behavioral,
            Self::Network { .. } => FindingCategory::Network,
        }
    }

    /// Stable identity of the underlying fact, independent of severity
    /// and confidence. Used for delta matching across profile versions.
    pub fn correlation_fields(&self) -> String {
        match self {
            Self::Identity { matched_name, .. } => format!("identity:{matched_name}"),
            Self::Criminal {
                offense,
                jurisdiction,
                ..
            } => format!("criminal:{offense}:{jurisdiction}"),
            Self::Civil {
                case_type, court, ..
            } => format!("civil:{case_type}:{court}"),
            Self::Financial { event, .. } => match event {
                FinancialEvent::CreditScore { .. } => "financial:credit_score".into(),
                other => format!("financial:{other:?}"),
            },
            Self::Regulatory {
                list_name,
                authority,
                ..
            } => format!("regulatory:{list_name}:{authority}"),
            Self::Reputation {
                headline,
                source_name,
                ..
            } => format!("reputation:{source_name}:{headline}"),
            Self::Verification { claim, .. } => format!("verification:{claim}"),
            Self::Behavioral { indicator, .. } => format!("behavioral:{indicator}"),
            Self::Network {
                related_entity,
                relation,
                ..
            } => format!("network:{related_entity}:{relation}"),
        }
    }
}

/// A single investigation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub category: FindingCategory,
    pub severity: Severity,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub provenance: Provenance,
    pub details: FindingDetails,
    pub contributing_entities: Vec<EntityId>,
    /// Prior finding this one amends, if any
    pub amends: Option<FindingId>,
    pub emitted_at: DateTime<Utc>,
}

impl Finding {
    /// Build a finding; category is derived from the detail variant
    pub fn new(
        severity: Severity,
        confidence: f64,
        provenance: Provenance,
        details: FindingDetails,
    ) -> Self {
        Self {
            id: FindingId::new(),
            category: details.category(),
            severity,
            confidence: confidence.clamp(0.0, 1.0),
            provenance,
            details,
            contributing_entities: Vec::new(),
            amends: None,
            emitted_at: Utc::now(),
        }
    }

    /// Key identifying the underlying fact across profile versions
    pub fn correlation_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.details.correlation_fields().as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}
