//! Query planning with compliance gating at plan time

use crate::kb::{FactKind, KnowledgeBase};
use crate::template::{enrichment_matrix, TypeTemplate};
use std::collections::HashSet;
use vet_common::{CheckType, ConsentScope, Locale, RoleCategory, SourceCategory, Tier};
use vet_compliance::{ComplianceEngine, DecisionContext, DenialReason};
use vet_gateway::QueryParam;

/// A planned query for one iteration
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    pub check: CheckType,
    pub params: Vec<QueryParam>,
    pub iteration: u32,
}

/// Result of planning one iteration
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub queries: Vec<PlannedQuery>,
    /// Set when compliance denied the whole check
    pub blocked: Option<DenialReason>,
    pub disclosures_required: Vec<String>,
}

/// Composes queries from identifiers, knowledge-base facts, templates,
/// and prior-iteration gaps. Queries that would violate compliance are
/// dropped here, before any provider sees them.
pub struct QueryPlanner<'a> {
    compliance: &'a ComplianceEngine,
}

/// The source category a check is predominantly served from; drives the
/// pre-query compliance decision. Provider-level differences are caught
/// by the post-normalization pass.
pub fn dominant_source(check: CheckType) -> SourceCategory {
    use CheckType::*;
    match check {
        Criminal | Civil => SourceCategory::Court,
        Sanctions | Regulatory | Licenses | CorporateRegistry | Identity => {
            SourceCategory::Government
        }
        Financial => SourceCategory::CreditBureau,
        AdverseMedia => SourceCategory::Media,
        DigitalFootprint | Behavioral => SourceCategory::Osint,
        Employment | Education => SourceCategory::Commercial,
    }
}

impl<'a> QueryPlanner<'a> {
    /// Planner bound to the compliance engine
    pub fn new(compliance: &'a ComplianceEngine) -> Self {
        Self { compliance }
    }

    /// Plan one iteration of queries for a check type.
    ///
    /// Iteration 1 issues the base query; later iterations narrow to
    /// the outstanding gaps. Enrichment parameters from confirmed facts
    /// apply on every iteration.
    #[allow(clippy::too_many_arguments)]
    pub fn plan(
        &self,
        check: CheckType,
        locale: &Locale,
        role: RoleCategory,
        tier: Tier,
        consents: &HashSet<ConsentScope>,
        kb: &KnowledgeBase,
        gaps: &[FactKind],
        iteration: u32,
    ) -> PlanOutcome {
        let decision = self.compliance.evaluate(&DecisionContext {
            locale: locale.clone(),
            role,
            check,
            tier,
            source: dominant_source(check),
            consents: consents.clone(),
        });

        if !decision.permitted {
            tracing::debug!(%check, reason = ?decision.reason, "check dropped at plan time");
            return PlanOutcome {
                queries: Vec::new(),
                blocked: decision.reason,
                disclosures_required: Vec::new(),
            };
        }

        let mut params = Vec::new();

        // enrichment: confirmed facts scope this check's queries
        for rule in enrichment_matrix().iter().filter(|r| r.target == check) {
            for fact in kb.confirmed(rule.source) {
                let param = QueryParam::new(rule.param, fact.value.clone());
                if !params.contains(&param) {
                    params.push(param);
                }
            }
        }

        // lookback restriction narrows the query window server-side
        if let Some(years) = decision.restrictions.lookback_years {
            params.push(QueryParam::new("lookback_years", years.to_string()));
        }

        // refinement: narrow to gaps after the first pass
        if iteration > 1 {
            let template = TypeTemplate::for_check(check);
            for gap in gaps {
                if template.expected_facts.contains(gap) {
                    params.push(QueryParam::new("gap", format!("{gap:?}").to_lowercase()));
                }
            }
            if gaps.is_empty() {
                // nothing left to narrow on; no further queries
                return PlanOutcome {
                    queries: Vec::new(),
                    blocked: None,
                    disclosures_required: decision.disclosures_required,
                };
            }
        }

        PlanOutcome {
            queries: vec![PlannedQuery {
                check,
                params,
                iteration,
            }],
            blocked: None,
            disclosures_required: decision.disclosures_required,
        }
    }
}
