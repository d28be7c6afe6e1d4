//! The per-type SAR cycle driver

use crate::assess::ResultAssessor;
use crate::kb::{FactKind, KnowledgeBase};
use crate::plan::QueryPlanner;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use vet_analysis::Inconsistency;
use vet_cache::{CacheScope, Fingerprint};
use vet_common::{
    CancelSignal, CheckType, ConsentScope, Degree, EntityId, Finding, LimitsConfig, Locale,
    RoleCategory, SarConfig, Tier, VetError,
};
use vet_compliance::ComplianceEngine;
use vet_gateway::{BilledTo, Demand, DiscoveredEntity, ProviderGateway, SubjectRef};

/// Terminal and in-progress states of a type cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Pending,
    InProgress,
    CompleteThreshold,
    CompleteCapped,
    CompleteDiminished,
    Failed,
}

impl CycleStatus {
    /// True for the three successful completion states
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            Self::CompleteThreshold | Self::CompleteCapped | Self::CompleteDiminished
        )
    }
}

/// A finding tagged with its emission key parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleFinding {
    pub finding: Finding,
    pub fingerprint_key: String,
    pub iteration: u32,
}

/// Cycle state for one information type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeCycleState {
    pub check: CheckType,
    pub iterations: u32,
    pub status: CycleStatus,
    pub type_confidence: f64,
    pub last_info_gain: f64,
    pub gaps: Vec<FactKind>,
    pub findings: Vec<CycleFinding>,
    pub inconsistencies: Vec<Inconsistency>,
    pub discovered: Vec<DiscoveredEntity>,
    /// Reason compliance blocked the whole check, when it did
    pub blocked_reason: Option<String>,
    /// Any result this cycle was served from a stale cache entry
    pub served_stale: bool,
}

impl TypeCycleState {
    /// Fresh pending state
    pub fn new(check: CheckType) -> Self {
        Self {
            check,
            iterations: 0,
            status: CycleStatus::Pending,
            type_confidence: 0.0,
            last_info_gain: 0.0,
            gaps: Vec::new(),
            findings: Vec::new(),
            inconsistencies: Vec::new(),
            discovered: Vec::new(),
            blocked_reason: None,
            served_stale: false,
        }
    }
}

/// Everything a cycle needs to know about its investigation
#[derive(Debug, Clone)]
pub struct SarContext {
    pub entity_id: EntityId,
    pub subject: SubjectRef,
    pub locale: Locale,
    pub tier: Tier,
    pub role: RoleCategory,
    pub consents: HashSet<ConsentScope>,
    pub scope: CacheScope,
    pub billed_to: BilledTo,
    pub degree: Degree,
}

/// Runs SAR cycles against the gateway
pub struct SarCycle {
    gateway: Arc<ProviderGateway>,
    compliance: Arc<ComplianceEngine>,
    config: SarConfig,
    limits: LimitsConfig,
}

impl SarCycle {
    /// Cycle runner over the gateway and compliance engine
    pub fn new(
        gateway: Arc<ProviderGateway>,
        compliance: Arc<ComplianceEngine>,
        config: SarConfig,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            gateway,
            compliance,
            config,
            limits,
        }
    }

    /// Run the full Search-Assess-Refine loop for one type.
    ///
    /// Cancellation mid-cycle keeps the findings already assessed and
    /// ends the cycle as failed; the caller decides how to surface the
    /// partial state.
    pub async fn run(
        &self,
        check: CheckType,
        ctx: &SarContext,
        kb: &Mutex<KnowledgeBase>,
        cancel: &CancelSignal,
    ) -> TypeCycleState {
        let mut state = TypeCycleState::new(check);
        state.status = CycleStatus::InProgress;
        let type_cancel = cancel.child(self.limits.type_timeout);
        let planner = QueryPlanner::new(&self.compliance);
        let assessor = ResultAssessor::new(self.config.kb_confidence_floor);
        let threshold = self.config.threshold_for(check);
        let cap = self.config.cap_for(check);

        tracing::debug!(%check, threshold, cap, "type cycle started");

        loop {
            state.iterations += 1;

            // Search: plan this iteration's queries
            let plan = {
                let kb = kb.lock();
                planner.plan(
                    check,
                    &ctx.locale,
                    ctx.role,
                    ctx.tier,
                    &ctx.consents,
                    &kb,
                    &state.gaps,
                    state.iterations,
                )
            };

            if let Some(reason) = plan.blocked {
                state.status = CycleStatus::Failed;
                state.blocked_reason = Some(reason.to_string());
                break;
            }
            if plan.queries.is_empty() {
                state.status = if state.type_confidence >= threshold {
                    CycleStatus::CompleteThreshold
                } else {
                    CycleStatus::CompleteDiminished
                };
                break;
            }

            // Execute: fan out under the provider concurrency bound
            let queries_issued = plan.queries.len();
            let semaphore = Arc::new(Semaphore::new(self.limits.provider_concurrency));
            let mut join = JoinSet::new();
            for query in plan.queries {
                let gateway = Arc::clone(&self.gateway);
                let demand = self.demand_for(&query.params, check, ctx);
                let call_cancel = type_cancel.clone();
                let semaphore = Arc::clone(&semaphore);
                join.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| VetError::Cancelled)?;
                    gateway.fetch(&demand, &call_cancel).await
                });
            }

            let mut results = Vec::new();
            let mut cancelled = false;
            while let Some(joined) = join.join_next().await {
                match joined {
                    Ok(Ok(result)) => results.push(result),
                    Ok(Err(VetError::Cancelled)) | Ok(Err(VetError::DeadlineExceeded)) => {
                        cancelled = true;
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(%check, error = %e, "query failed, continuing");
                    }
                    Err(e) => {
                        tracing::warn!(%check, error = %e, "query task panicked");
                    }
                }
            }
            if cancelled {
                state.status = CycleStatus::Failed;
                break;
            }
            state.served_stale |= results.iter().any(|r| r.stale);

            // Assess: fold into the knowledge base, measure progress
            let assessment = {
                let mut kb = kb.lock();
                assessor.assess(check, &results, queries_issued, &mut kb, |p| {
                    self.gateway.registry().registry_order(p)
                })
            };

            let iteration = state.iterations;
            state
                .findings
                .extend(
                    assessment
                        .findings
                        .into_iter()
                        .map(|(finding, fingerprint_key)| CycleFinding {
                            finding,
                            fingerprint_key,
                            iteration,
                        }),
                );
            state.inconsistencies.extend(assessment.inconsistencies);
            state.discovered.extend(assessment.discovered);
            state.gaps = assessment.gaps;
            state.type_confidence = assessment.type_confidence;
            state.last_info_gain = assessment.info_gain_rate;

            // Refine: decide the next step
            if state.type_confidence >= threshold {
                state.status = CycleStatus::CompleteThreshold;
                break;
            }
            if state.iterations >= cap {
                state.status = CycleStatus::CompleteCapped;
                break;
            }
            if state.last_info_gain < self.config.min_info_gain {
                state.status = CycleStatus::CompleteDiminished;
                break;
            }
        }

        tracing::info!(
            %check,
            status = ?state.status,
            iterations = state.iterations,
            confidence = state.type_confidence,
            findings = state.findings.len(),
            "type cycle finished"
        );
        state
    }

    fn demand_for(
        &self,
        params: &[vet_gateway::QueryParam],
        check: CheckType,
        ctx: &SarContext,
    ) -> Demand {
        // the fingerprint's provider class carries the query scope so
        // differently-narrowed queries cache independently
        let provider_class = if params.is_empty() {
            check.to_string()
        } else {
            let mut hasher = Sha256::new();
            for param in params {
                hasher.update(param.name.as_bytes());
                hasher.update(param.value.as_bytes());
            }
            format!("{check}:{}", hex::encode(&hasher.finalize()[..4]))
        };

        Demand {
            fingerprint: Fingerprint {
                entity_id: ctx.entity_id,
                provider_class,
                check,
                locale: ctx.locale.clone(),
                degree_scope: ctx.degree,
            },
            subject: ctx.subject.clone(),
            tier: ctx.tier,
            scope: ctx.scope.clone(),
            billed_to: ctx.billed_to.clone(),
            params: params.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use vet_audit::AuditLog;
    use vet_cache::CacheStore;
    use vet_common::{
        FindingDetails, LocaleSelector, Provenance, ProviderClass, ProviderId, Severity,
        SourceCategory, VetResult,
    };
    use vet_compliance::{ComplianceRule, RuleSet};
    use vet_gateway::{
        CostTier, Provider, ProviderHealth, ProviderRegistry, ProviderRequest, ProviderResponse,
    };

    struct IdentityProvider {
        executions: AtomicU32,
    }

    #[async_trait]
    impl Provider for IdentityProvider {
        fn provider_id(&self) -> ProviderId {
            ProviderId::new("identity-prov")
        }
        fn provider_class(&self) -> &str {
            "identity"
        }
        fn tier_category(&self) -> ProviderClass {
            ProviderClass::Core
        }
        fn supported_checks(&self) -> &[CheckType] {
            &[CheckType::Identity]
        }
        fn supports_locale(&self, _locale: &Locale) -> bool {
            true
        }
        fn cost_tier(&self) -> CostTier {
            CostTier::Low
        }
        fn source_category(&self) -> SourceCategory {
            SourceCategory::Government
        }
        async fn execute(&self, request: &ProviderRequest) -> VetResult<ProviderResponse> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderResponse {
                findings: vec![Finding::new(
                    Severity::Low,
                    0.95,
                    Provenance {
                        provider_id: self.provider_id(),
                        acquired_at: Utc::now(),
                        cache_hit: false,
                        stale: false,
                    },
                    FindingDetails::Identity {
                        matched_name: request.subject.name.clone(),
                        dob_verified: true,
                        address_verified: true,
                    },
                )],
                discovered: Vec::new(),
                cost: 0.5,
                currency: "USD".into(),
                raw: b"{}".to_vec(),
            })
        }
        async fn health(&self) -> ProviderHealth {
            ProviderHealth {
                healthy: true,
                latency_ms: 5,
            }
        }
    }

    fn context() -> SarContext {
        let entity_id = EntityId::new();
        SarContext {
            entity_id,
            subject: SubjectRef {
                entity_id,
                name: "Jane Roe".into(),
                dob: None,
                address: None,
                aliases: Vec::new(),
            },
            locale: Locale::country("US"),
            tier: Tier::Standard,
            role: RoleCategory::General,
            consents: HashSet::new(),
            scope: CacheScope::Platform,
            billed_to: BilledTo::Shared,
            degree: Degree::D1,
        }
    }

    fn cycle_with(providers: Vec<Arc<dyn Provider>>) -> SarCycle {
        let registry = Arc::new(ProviderRegistry::new());
        for p in providers {
            registry.register(p);
        }
        let gateway = Arc::new(ProviderGateway::new(
            registry,
            Arc::new(CacheStore::new()),
            Arc::new(AuditLog::new()),
            Duration::from_secs(5),
        ));
        let compliance = Arc::new(ComplianceEngine::new(RuleSet::new(
            1,
            vec![ComplianceRule::permit_all(LocaleSelector::Any)],
        )));
        SarCycle::new(
            gateway,
            compliance,
            SarConfig::default(),
            LimitsConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_identity_cycle_completes() {
        let cycle = cycle_with(vec![Arc::new(IdentityProvider {
            executions: AtomicU32::new(0),
        })]);
        let kb = Mutex::new(KnowledgeBase::new());
        let state = cycle
            .run(CheckType::Identity, &context(), &kb, &CancelSignal::new())
            .await;

        assert!(state.status.is_complete(), "status {:?}", state.status);
        assert!(!state.findings.is_empty());
        assert!(state.iterations <= 4);
        assert!(kb.lock().has_confirmed(FactKind::Name));
    }

    #[tokio::test]
    async fn test_no_provider_ends_without_findings() {
        let cycle = cycle_with(vec![]);
        let kb = Mutex::new(KnowledgeBase::new());
        let state = cycle
            .run(CheckType::Criminal, &context(), &kb, &CancelSignal::new())
            .await;

        // queries found no source; gain stays zero and the loop winds down
        assert!(state.findings.is_empty());
        assert!(matches!(
            state.status,
            CycleStatus::CompleteDiminished | CycleStatus::CompleteCapped
        ));
    }

    #[tokio::test]
    async fn test_blocked_check_fails_with_reason() {
        let registry = Arc::new(ProviderRegistry::new());
        let gateway = Arc::new(ProviderGateway::new(
            registry,
            Arc::new(CacheStore::new()),
            Arc::new(AuditLog::new()),
            Duration::from_secs(5),
        ));
        let compliance = Arc::new(ComplianceEngine::new(RuleSet::new(
            1,
            vec![
                ComplianceRule::permit_all(LocaleSelector::Any),
                ComplianceRule {
                    permitted: false,
                    check: Some(CheckType::Criminal),
                    ..ComplianceRule::permit_all(LocaleSelector::Country("DE".into()))
                },
            ],
        )));
        let cycle = SarCycle::new(
            gateway,
            compliance,
            SarConfig::default(),
            LimitsConfig::default(),
        );

        let mut ctx = context();
        ctx.locale = Locale::country("DE");
        let kb = Mutex::new(KnowledgeBase::new());
        let state = cycle
            .run(CheckType::Criminal, &ctx, &kb, &CancelSignal::new())
            .await;

        assert_eq!(state.status, CycleStatus::Failed);
        assert!(state.blocked_reason.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_cycle_keeps_partial_state() {
        let cycle = cycle_with(vec![Arc::new(IdentityProvider {
            executions: AtomicU32::new(0),
        })]);
        let kb = Mutex::new(KnowledgeBase::new());
        let cancel = CancelSignal::new();
        cancel.cancel();

        let state = cycle
            .run(CheckType::Identity, &context(), &kb, &cancel)
            .await;
        assert_eq!(state.status, CycleStatus::Failed);
        assert!(state.findings.is_empty());
    }
}
