//! The investigation engine

use crate::checkpoint::{CheckpointStore, InvestigationCheckpoint};
use crate::phases::Phase;
use crate::profile_store::ProfileStore;
use crate::OrchestratorError;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use vet_analysis::{DeceptionAnalyzer, Inconsistency};
use vet_audit::{Actor, AuditCategory, AuditLog};
use vet_cache::{CacheScope, CacheStore, Fingerprint};
use vet_common::{
    CancelSignal, CheckType, ConsentScope, CustomerId, Degree, EntityId, EntityProfile,
    ExcludedCheck, Finding, FindingDetails, InvestigationId, LimitsConfig, Locale, ProfileStatus,
    ProfileTrigger, Provenance, ProviderId, RoleCategory, SarConfig, ServiceConfig, Severity,
    Tier, VetError, VetResult,
};
use vet_compliance::{ComplianceEngine, DecisionContext};
use vet_entity::{
    CandidateIdentity, ConnectionGraph, Edge, EntityRegistry, EntityResolver, ReviewQueue,
    WeakIdentity,
};
use vet_gateway::{
    BilledTo, Demand, DiscoveredEntity, ProviderGateway, QueryParam, SubjectRef,
};
use vet_risk::{EvolutionDetector, RiskScorer};
use vet_sar::{dominant_source, CycleStatus, KnowledgeBase, SarContext, SarCycle, TypeCycleState};

/// Identity confidence below which the investigation aborts
const IDENTITY_MIN_CONFIDENCE: f64 = 0.5;

/// An investigation request from the platform surface
#[derive(Debug, Clone)]
pub struct InvestigationRequest {
    pub candidate: CandidateIdentity,
    pub customer_id: CustomerId,
    pub locale: Locale,
    pub role: RoleCategory,
    pub config: ServiceConfig,
    pub consents: HashSet<ConsentScope>,
}

/// Mutable state carried across phases
struct InvestigationState {
    investigation_id: InvestigationId,
    entity_id: EntityId,
    kb: Arc<Mutex<KnowledgeBase>>,
    emitted_keys: HashSet<String>,
    findings: Vec<Finding>,
    inconsistencies: Vec<Inconsistency>,
    type_statuses: Vec<(CheckType, CycleStatus)>,
    stale_sources: Vec<CheckType>,
    excluded_checks: Vec<ExcludedCheck>,
    deferred_network: Vec<EntityId>,
    sanctioned: HashSet<EntityId>,
    visited: HashSet<EntityId>,
    /// D2 entities actually investigated, in expansion order
    investigated_d2: Vec<EntityId>,
}

impl InvestigationState {
    fn fresh(entity_id: EntityId) -> Self {
        Self {
            investigation_id: InvestigationId::new(),
            entity_id,
            kb: Arc::new(Mutex::new(KnowledgeBase::new())),
            emitted_keys: HashSet::new(),
            findings: Vec::new(),
            inconsistencies: Vec::new(),
            type_statuses: Vec::new(),
            stale_sources: Vec::new(),
            excluded_checks: Vec::new(),
            deferred_network: Vec::new(),
            sanctioned: HashSet::new(),
            visited: HashSet::new(),
            investigated_d2: Vec::new(),
        }
    }

    fn from_checkpoint(checkpoint: InvestigationCheckpoint) -> Self {
        Self {
            investigation_id: checkpoint.investigation_id,
            entity_id: checkpoint.entity_id,
            kb: Arc::new(Mutex::new(checkpoint.knowledge_base)),
            emitted_keys: checkpoint.emitted_keys,
            findings: checkpoint.findings,
            inconsistencies: Vec::new(),
            type_statuses: Vec::new(),
            stale_sources: checkpoint.stale_sources,
            excluded_checks: checkpoint.excluded_checks,
            deferred_network: checkpoint.deferred_network,
            sanctioned: checkpoint.sanctioned,
            visited: checkpoint.visited,
            investigated_d2: Vec::new(),
        }
    }
}

/// Drives phased investigations end to end
pub struct InvestigationEngine {
    gateway: Arc<ProviderGateway>,
    compliance: Arc<ComplianceEngine>,
    registry: Arc<EntityRegistry>,
    resolver: EntityResolver,
    review: Arc<ReviewQueue>,
    graph: Arc<ConnectionGraph>,
    profiles: Arc<ProfileStore>,
    checkpoints: Arc<CheckpointStore>,
    cache: Arc<CacheStore>,
    audit: Arc<AuditLog>,
    sar: Arc<SarCycle>,
    limits: LimitsConfig,
}

impl InvestigationEngine {
    /// Engine over shared platform components
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<ProviderGateway>,
        compliance: Arc<ComplianceEngine>,
        registry: Arc<EntityRegistry>,
        review: Arc<ReviewQueue>,
        graph: Arc<ConnectionGraph>,
        cache: Arc<CacheStore>,
        audit: Arc<AuditLog>,
        sar_config: SarConfig,
        limits: LimitsConfig,
    ) -> Self {
        let sar = Arc::new(SarCycle::new(
            Arc::clone(&gateway),
            Arc::clone(&compliance),
            sar_config,
            limits.clone(),
        ));
        Self {
            gateway,
            compliance,
            registry,
            resolver: EntityResolver::new(),
            review,
            graph,
            profiles: Arc::new(ProfileStore::new()),
            checkpoints: Arc::new(CheckpointStore::new()),
            cache,
            audit,
            sar,
            limits,
        }
    }

    /// The versioned profile store
    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    /// The entity registry
    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    /// The checkpoint store
    pub fn checkpoints(&self) -> &Arc<CheckpointStore> {
        &self.checkpoints
    }

    /// Run a full investigation and produce a profile version.
    pub async fn run(&self, request: InvestigationRequest) -> VetResult<EntityProfile> {
        request.config.validate()?;
        self.audit_event(
            AuditCategory::Config,
            format!("investigation-config:{:?}", request.config.tier),
        )?;
        if !request.consents.is_empty() {
            self.audit_event(
                AuditCategory::Consent,
                format!("consents:{}", request.consents.len()),
            )?;
        }

        let outcome = self
            .resolver
            .resolve(
                request.candidate.clone(),
                request.config.tier,
                &self.registry,
                &self.review,
                &self.audit,
            )
            .map_err(|e| VetError::Orchestration(e.to_string()))?;
        let entity_id = outcome.entity_id();

        let mut state = InvestigationState::fresh(entity_id);
        self.seed_knowledge_base(&state, &request);
        let ctx = self.context_for(entity_id, &request, Degree::D1)?;
        let cancel = CancelSignal::with_timeout(self.limits.investigation_timeout);

        tracing::info!(
            investigation = %state.investigation_id,
            entity = %entity_id,
            tier = ?request.config.tier,
            "investigation started"
        );

        self.run_phases(&mut state, &ctx, &request, &cancel, None).await?;
        self.assemble(&state, &request, &cancel, ProfileTrigger::Investigation)
    }

    /// Resume an investigation from its last checkpoint.
    ///
    /// Committed findings are retained; re-executed demands hit the
    /// cache first, and the emission key set guarantees no finding is
    /// emitted twice for the same (fingerprint, iteration).
    pub async fn resume(
        &self,
        investigation_id: InvestigationId,
        request: InvestigationRequest,
    ) -> VetResult<EntityProfile> {
        let checkpoint = self
            .checkpoints
            .load(investigation_id)
            .ok_or(OrchestratorError::NoCheckpoint(investigation_id))
            .map_err(|e| VetError::Orchestration(e.to_string()))?;

        request.config.validate()?;
        let resume_from = checkpoint.completed_phase;
        if !checkpoint.pending_fingerprints.is_empty() {
            tracing::info!(
                pending = checkpoint.pending_fingerprints.len(),
                "resume: pending calls will consult cache before re-issue"
            );
        }
        let mut state = InvestigationState::from_checkpoint(checkpoint);
        let ctx = self.context_for(state.entity_id, &request, Degree::D1)?;
        let cancel = CancelSignal::with_timeout(self.limits.investigation_timeout);

        tracing::info!(
            investigation = %investigation_id,
            from = ?resume_from,
            "investigation resumed"
        );

        self.run_phases(&mut state, &ctx, &request, &cancel, resume_from)
            .await?;
        self.assemble(&state, &request, &cancel, ProfileTrigger::Investigation)
    }

    /// Erase a subject across registry, graph, cache, and profiles.
    /// Idempotent; audit retains anonymized references only.
    pub fn erase_subject(&self, entity_id: EntityId) -> VetResult<()> {
        self.registry
            .erase(entity_id, &self.audit)
            .map_err(|e| VetError::Orchestration(e.to_string()))?;
        let edges = self.graph.erase_entity(entity_id);
        let cached = self.cache.purge_entity(entity_id);
        let versions = self.profiles.erase(entity_id);
        tracing::info!(%entity_id, edges, cached, versions, "subject erased");
        Ok(())
    }

    async fn run_phases(
        &self,
        state: &mut InvestigationState,
        ctx: &SarContext,
        request: &InvestigationRequest,
        cancel: &CancelSignal,
        completed: Option<Phase>,
    ) -> VetResult<()> {
        let mut phase = match completed {
            None => Some(Phase::Foundation),
            Some(p) => p.next(),
        };

        while let Some(current) = phase {
            if cancel.checkpoint().is_err() {
                tracing::warn!(phase = %current, "investigation cancelled");
                break;
            }

            match current {
                Phase::Foundation => {
                    if !self.run_foundation(state, ctx, cancel).await? {
                        // identity could not be verified: partial profile
                        let profile = self.assemble(
                            state,
                            request,
                            cancel,
                            ProfileTrigger::Investigation,
                        )?;
                        tracing::error!(
                            investigation = %state.investigation_id,
                            version = profile.version,
                            "identity unverified, investigation aborted"
                        );
                        return Err(VetError::IdentityUnverified);
                    }
                }
                Phase::Records => {
                    let checks = self.records_checks(&request.config);
                    self.run_parallel(state, ctx, cancel, checks).await?;
                }
                Phase::Intelligence => {
                    let checks = self.intelligence_checks(&request.config);
                    self.run_parallel(state, ctx, cancel, checks).await?;
                }
                Phase::Network => {
                    if request.config.degrees >= Degree::D2 {
                        self.run_network(state, ctx, request, cancel).await?;
                    }
                }
                Phase::Reconciliation => {
                    self.run_reconciliation(state, ctx, cancel).await?;
                }
            }

            self.save_checkpoint(state, Some(current))?;
            phase = current.next();
        }
        Ok(())
    }

    /// Foundation runs strictly Identity -> Employment -> Education.
    /// Returns false when identity verification failed.
    async fn run_foundation(
        &self,
        state: &mut InvestigationState,
        ctx: &SarContext,
        cancel: &CancelSignal,
    ) -> VetResult<bool> {
        for check in CheckType::FOUNDATION {
            if cancel.checkpoint().is_err() {
                return Ok(true);
            }
            let mut cycle = self.sar.run(check, ctx, &state.kb, cancel).await;
            let identity_failed = check == CheckType::Identity
                && (cycle.status == CycleStatus::Failed
                    || cycle.type_confidence < IDENTITY_MIN_CONFIDENCE);
            if identity_failed {
                cycle.status = CycleStatus::Failed;
            }
            self.commit_cycle(state, ctx, cycle)?;
            if identity_failed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fan a set of checks out under the type-concurrency ceiling
    async fn run_parallel(
        &self,
        state: &mut InvestigationState,
        ctx: &SarContext,
        cancel: &CancelSignal,
        checks: Vec<CheckType>,
    ) -> VetResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.limits.type_concurrency));
        let mut join = JoinSet::new();
        for check in checks {
            let sar = Arc::clone(&self.sar);
            let ctx = ctx.clone();
            let kb = Arc::clone(&state.kb);
            let cancel = cancel.clone();
            let semaphore = Arc::clone(&semaphore);
            join.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                sar.run(check, &ctx, &kb, &cancel).await
            });
        }

        while let Some(joined) = join.join_next().await {
            match joined {
                Ok(cycle) => self.commit_cycle(state, ctx, cycle)?,
                Err(e) => tracing::warn!(error = %e, "type task panicked"),
            }
        }
        Ok(())
    }

    /// D2 (and D3 under Enhanced) expansion with a visited-set guard
    async fn run_network(
        &self,
        state: &mut InvestigationState,
        ctx: &SarContext,
        request: &InvestigationRequest,
        cancel: &CancelSignal,
    ) -> VetResult<()> {
        state.visited.insert(state.entity_id);
        let cap = self.limits.network_max_entities_per_degree;

        let selection = self
            .graph
            .select_for_expansion(state.entity_id, cap, &state.visited);
        state.deferred_network.extend(selection.deferred.iter().copied());

        for related in selection.selected {
            if cancel.checkpoint().is_err() {
                return Ok(());
            }
            if !state.visited.insert(related) {
                continue;
            }
            self.investigate_related(state, ctx, cancel, related, Degree::D2)
                .await?;
            state.investigated_d2.push(related);
        }

        // D3 expands one step from each investigated D2 entity
        if request.config.degrees == Degree::D3 && request.config.tier == Tier::Enhanced {
            let d2_entities = state.investigated_d2.clone();
            for d2_entity in d2_entities {
                let selection = self
                    .graph
                    .select_for_expansion(d2_entity, cap, &state.visited);
                state
                    .deferred_network
                    .extend(selection.deferred.iter().copied());
                for related in selection.selected {
                    if cancel.checkpoint().is_err() {
                        return Ok(());
                    }
                    if !state.visited.insert(related) {
                        continue;
                    }
                    self.investigate_related(state, ctx, cancel, related, Degree::D3)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Reduced cycle (Identity + records subset) for a related entity,
    /// then a network summary finding on the subject.
    async fn investigate_related(
        &self,
        state: &mut InvestigationState,
        ctx: &SarContext,
        cancel: &CancelSignal,
        related: EntityId,
        degree: Degree,
    ) -> VetResult<()> {
        let Some(entity) = self.registry.get(related) else {
            return Ok(());
        };
        let related_ctx = SarContext {
            entity_id: related,
            subject: SubjectRef {
                entity_id: related,
                name: entity.weak.name.clone(),
                dob: entity.weak.dob,
                address: entity.weak.address.clone(),
                aliases: entity.aliases.clone(),
            },
            degree,
            ..ctx.clone()
        };

        let related_kb = Arc::new(Mutex::new(KnowledgeBase::new()));
        let mut max_severity = Severity::Low;
        let mut is_sanctioned = false;

        let mut reduced = vec![CheckType::Identity];
        reduced.extend(CheckType::NETWORK_RECORDS);
        for check in reduced {
            let cycle = self.sar.run(check, &related_ctx, &related_kb, cancel).await;
            if check == CheckType::Sanctions && !cycle.findings.is_empty() {
                is_sanctioned = true;
            }
            for cf in &cycle.findings {
                max_severity = max_severity.max(cf.finding.severity);
            }
            // discoveries at this hop seed the next degree's edges
            for discovered in &cycle.discovered {
                self.link_discovered(related, discovered, Degree::D3)?;
            }
        }

        if is_sanctioned {
            state.sanctioned.insert(related);
            max_severity = Severity::Critical;
        }

        let edge = self
            .graph
            .connections_of(state.entity_id)
            .into_iter()
            .find(|e| e.to == related);
        let (relation, link_strength) = edge
            .map(|e| (e.relation.to_string(), e.link_strength))
            .unwrap_or_else(|| ("associate".to_string(), 0.5));

        let mut finding = Finding::new(
            max_severity,
            0.8,
            Provenance {
                provider_id: ProviderId::new("network-analysis"),
                acquired_at: Utc::now(),
                cache_hit: false,
                stale: false,
            },
            FindingDetails::Network {
                related_entity: related,
                relation,
                degree,
                link_strength,
            },
        );
        finding.contributing_entities.push(related);
        self.emit(state, finding, &format!("network:{related}"), 0)?;
        Ok(())
    }

    /// Reconciliation: cross-reference open inconsistencies, score
    /// deception, emit verification findings.
    async fn run_reconciliation(
        &self,
        state: &mut InvestigationState,
        ctx: &SarContext,
        cancel: &CancelSignal,
    ) -> VetResult<()> {
        let mut open = Vec::new();
        let budget = self.limits.reconciliation_max_queries;

        let inconsistencies = std::mem::take(&mut state.inconsistencies);
        for (index, inconsistency) in inconsistencies.into_iter().enumerate() {
            if index >= budget || cancel.checkpoint().is_err() {
                open.push(inconsistency);
                continue;
            }

            let demand = Demand {
                fingerprint: Fingerprint {
                    entity_id: state.entity_id,
                    provider_class: format!("recon:{}", inconsistency.field),
                    check: inconsistency.info_type,
                    locale: ctx.locale.clone(),
                    degree_scope: Degree::D1,
                },
                subject: ctx.subject.clone(),
                tier: ctx.tier,
                scope: ctx.scope.clone(),
                billed_to: ctx.billed_to.clone(),
                params: vec![
                    QueryParam::new("cross_reference", inconsistency.field.clone()),
                    QueryParam::new("claimed", inconsistency.claimed.clone()),
                    QueryParam::new("observed", inconsistency.observed.clone()),
                ],
            };

            // an authoritative cross-reference settles the conflict
            let resolved = match self.gateway.fetch(&demand, cancel).await {
                Ok(result) => result.findings.iter().any(|f| f.confidence >= 0.85),
                Err(_) => false,
            };
            if resolved {
                tracing::debug!(field = %inconsistency.field, "inconsistency resolved");
            } else {
                open.push(inconsistency);
            }
        }

        let assessment = DeceptionAnalyzer::score(&open);
        let findings = DeceptionAnalyzer::to_findings(
            &open,
            &assessment,
            ProviderId::new("reconciliation"),
        );
        for finding in findings {
            let key_part = finding.correlation_key();
            self.emit(state, finding, &format!("reconciliation:{key_part}"), 0)?;
        }
        state.inconsistencies = open;
        Ok(())
    }

    /// Commit a cycle's output: redact, dedup, audit, and accumulate
    fn commit_cycle(
        &self,
        state: &mut InvestigationState,
        ctx: &SarContext,
        cycle: TypeCycleState,
    ) -> VetResult<()> {
        let decision = self.compliance.evaluate(&DecisionContext {
            locale: ctx.locale.clone(),
            role: ctx.role,
            check: cycle.check,
            tier: ctx.tier,
            source: dominant_source(cycle.check),
            consents: ctx.consents.clone(),
        });

        for cycle_finding in cycle.findings {
            let mut finding = cycle_finding.finding;
            // post-normalization pass may redact classified fields
            if decision.permitted {
                self.compliance.redact(&decision, &mut finding.details);
            }
            self.emit(
                state,
                finding,
                &cycle_finding.fingerprint_key,
                cycle_finding.iteration,
            )?;
        }

        if cycle.served_stale && !state.stale_sources.contains(&cycle.check) {
            state.stale_sources.push(cycle.check);
        }
        if let Some(reason) = &cycle.blocked_reason {
            state.excluded_checks.push(ExcludedCheck {
                check: cycle.check,
                reason: reason.clone(),
            });
        }
        state.inconsistencies.extend(cycle.inconsistencies);
        state.type_statuses.push((cycle.check, cycle.status));

        // discoveries become graph edges at the next degree out
        for discovered in &cycle.discovered {
            self.link_discovered(state.entity_id, discovered, Degree::D2)?;
        }
        Ok(())
    }

    /// At-most-once finding emission keyed by
    /// (investigation, fingerprint, iteration, fact identity)
    fn emit(
        &self,
        state: &mut InvestigationState,
        finding: Finding,
        fingerprint_key: &str,
        iteration: u32,
    ) -> VetResult<()> {
        let key = format!(
            "{fingerprint_key}:{iteration}:{}",
            finding.correlation_key()
        );
        if !state.emitted_keys.insert(key) {
            return Ok(());
        }
        self.audit_event(
            AuditCategory::FindingEmitted,
            format!("finding:{}:{}", state.investigation_id, finding.id),
        )?;
        state.findings.push(finding);
        Ok(())
    }

    fn link_discovered(
        &self,
        from: EntityId,
        discovered: &DiscoveredEntity,
        degree: Degree,
    ) -> VetResult<()> {
        let candidate = CandidateIdentity {
            kind: discovered.kind,
            weak: WeakIdentity {
                name: discovered.name.clone(),
                dob: None,
                address: None,
            },
            identifiers: Vec::new(),
        };
        // discovered entities resolve under Standard rules; ambiguity
        // here only affects graph granularity, not the subject record
        let outcome = self
            .resolver
            .resolve(candidate, Tier::Standard, &self.registry, &self.review, &self.audit)
            .map_err(|e| VetError::Orchestration(e.to_string()))?;

        self.graph.add_edge(
            from,
            Edge {
                to: outcome.entity_id(),
                relation: discovered.relation,
                link_strength: discovered.link_strength,
                degree_of_discovery: degree,
                first_seen: Utc::now(),
            },
        );
        Ok(())
    }

    fn assemble(
        &self,
        state: &InvestigationState,
        request: &InvestigationRequest,
        cancel: &CancelSignal,
        trigger: ProfileTrigger,
    ) -> VetResult<EntityProfile> {
        let version = self.profiles.next_version(state.entity_id);
        let scorer = RiskScorer::new(request.role);
        let risk_score = scorer.score(&state.findings);
        let status = if cancel.is_cancelled() {
            ProfileStatus::Partial
        } else if state
            .type_statuses
            .iter()
            .any(|(check, s)| *check == CheckType::Identity && !s.is_complete())
        {
            ProfileStatus::Partial
        } else {
            ProfileStatus::Complete
        };

        let mut profile = EntityProfile {
            entity_id: state.entity_id,
            version,
            created_at: Utc::now(),
            trigger,
            status,
            findings: state.findings.clone(),
            risk_score,
            connections: self.graph.profile_connections(state.entity_id),
            stale_sources: state.stale_sources.clone(),
            excluded_checks: state.excluded_checks.clone(),
            deferred_network: state.deferred_network.clone(),
            delta: None,
        };

        if version > 1 {
            let history = self.profiles.history(state.entity_id);
            let (earlier, previous) = history.split_at(history.len() - 1);
            profile.delta = Some(EvolutionDetector::compute_delta(
                &previous[0],
                &profile,
                earlier,
                &state.sanctioned,
            ));
        }

        self.profiles
            .append(profile.clone())
            .map_err(|e| VetError::Orchestration(e.to_string()))?;
        Ok(profile)
    }

    fn save_checkpoint(
        &self,
        state: &InvestigationState,
        completed_phase: Option<Phase>,
    ) -> VetResult<()> {
        let checkpoint = InvestigationCheckpoint {
            investigation_id: state.investigation_id,
            entity_id: state.entity_id,
            completed_phase,
            knowledge_base: state.kb.lock().clone(),
            emitted_keys: state.emitted_keys.clone(),
            findings: state.findings.clone(),
            pending_fingerprints: Vec::new(),
            stale_sources: state.stale_sources.clone(),
            excluded_checks: state.excluded_checks.clone(),
            deferred_network: state.deferred_network.clone(),
            sanctioned: state.sanctioned.clone(),
            visited: state.visited.clone(),
            created_at: Utc::now(),
        };
        self.checkpoints.save(checkpoint, &self.audit)
    }

    fn seed_knowledge_base(&self, state: &InvestigationState, request: &InvestigationRequest) {
        use vet_sar::{Fact, FactKind};
        let source = ProviderId::new("customer-intake");
        let mut kb = state.kb.lock();
        let weak = &request.candidate.weak;
        kb.assimilate(
            Fact::new(FactKind::Name, weak.name.clone(), 0.95, source.clone()),
            0.7,
            |_| 0,
        );
        if let Some(dob) = weak.dob {
            kb.assimilate(
                Fact::new(FactKind::Dob, dob.to_string(), 0.95, source.clone()),
                0.7,
                |_| 0,
            );
        }
        if let Some(address) = &weak.address {
            kb.assimilate(
                Fact::new(FactKind::Address, address.clone(), 0.95, source),
                0.7,
                |_| 0,
            );
        }
    }

    fn context_for(
        &self,
        entity_id: EntityId,
        request: &InvestigationRequest,
        degree: Degree,
    ) -> VetResult<SarContext> {
        let weak = &request.candidate.weak;
        Ok(SarContext {
            entity_id,
            subject: SubjectRef {
                entity_id,
                name: weak.name.clone(),
                dob: weak.dob,
                address: weak.address.clone(),
                aliases: Vec::new(),
            },
            locale: request.locale.clone(),
            tier: request.config.tier,
            role: request.role,
            consents: request.consents.clone(),
            scope: CacheScope::Customer(request.customer_id),
            billed_to: BilledTo::Customer(request.customer_id),
            degree,
        })
    }

    fn records_checks(&self, config: &ServiceConfig) -> Vec<CheckType> {
        let mut checks: Vec<CheckType> = CheckType::RECORDS
            .into_iter()
            .filter(|c| !config.excluded_checks.contains(c))
            .collect();
        for check in &config.additional_checks {
            let tier_ok = !check.requires_enhanced() || config.tier == Tier::Enhanced;
            if tier_ok && !checks.contains(check) && !CheckType::FOUNDATION.contains(check) {
                checks.push(*check);
            }
        }
        checks
    }

    fn intelligence_checks(&self, config: &ServiceConfig) -> Vec<CheckType> {
        CheckType::INTELLIGENCE
            .into_iter()
            .filter(|c| !config.excluded_checks.contains(c))
            .filter(|c| !c.requires_enhanced() || config.tier == Tier::Enhanced)
            .collect()
    }

    fn audit_event(&self, category: AuditCategory, payload_ref: String) -> VetResult<()> {
        self.audit
            .append(Actor::System, category, payload_ref)
            .map(|_| ())
            .map_err(|e| VetError::AuditWriteFailed(e.to_string()))
    }
}
