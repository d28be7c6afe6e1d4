//! The provider gateway

use crate::breaker::CircuitBreaker;
use crate::cost::{BilledTo, CostMeter};
use crate::health::ProviderHealthTracker;
use crate::provider::{ProviderRequest, QueryParam, SubjectRef};
use crate::ratelimit::RateLimiter;
use crate::registry::ProviderRegistry;
use crate::singleflight::{FlightFailure, FlightRole, SingleFlight};
use crate::DiscoveredEntity;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use vet_audit::{Actor, AuditCategory, AuditLog};
use vet_cache::{CacheDecision, CacheEntry, CacheScope, CacheStore, Fingerprint, Origin};
use vet_common::{
    AtomicCounter, CancelSignal, CheckType, Finding, Provenance, ProviderId, RetryConfig, Tier,
    VetError, VetResult,
};

/// Coalescing window: at most one execution per fingerprint inside it
const SINGLE_FLIGHT_WINDOW: Duration = Duration::from_secs(60);

/// A routed demand
#[derive(Debug, Clone)]
pub struct Demand {
    pub fingerprint: Fingerprint,
    pub subject: SubjectRef,
    pub tier: Tier,
    pub scope: CacheScope,
    pub billed_to: BilledTo,
    pub params: Vec<QueryParam>,
}

/// What the gateway returns to the SAR executor
#[derive(Debug, Clone)]
pub struct GatewayResult {
    pub findings: Vec<Finding>,
    pub discovered: Vec<DiscoveredEntity>,
    pub cache_hit: bool,
    /// Served from a stale entry under a FLAG policy
    pub stale: bool,
    /// Another in-flight demand executed; this caller shared the result
    pub coalesced: bool,
    pub provider_id: Option<ProviderId>,
    pub fingerprint_key: String,
}

/// Work item for the async refresh worker
#[derive(Debug, Clone)]
pub struct RefreshJob {
    pub demand: Demand,
}

/// Gateway statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayStats {
    pub calls: u64,
    pub cache_hits: u64,
    pub stale_served: u64,
    pub coalesced: u64,
    pub failovers: u64,
    pub short_circuits: u64,
    pub no_source: u64,
}

/// Routes demands through cache, policy, limits, and providers
pub struct ProviderGateway {
    registry: Arc<ProviderRegistry>,
    cache: Arc<CacheStore>,
    audit: Arc<AuditLog>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    health: ProviderHealthTracker,
    cost: CostMeter,
    flights: SingleFlight<GatewayResult>,
    call_timeout: Duration,
    retry: RetryConfig,
    refresh_tx: mpsc::UnboundedSender<RefreshJob>,
    refresh_rx: Mutex<Option<mpsc::UnboundedReceiver<RefreshJob>>>,

    calls: AtomicCounter,
    cache_hits: AtomicCounter,
    stale_served: AtomicCounter,
    coalesced: AtomicCounter,
    failovers: AtomicCounter,
    short_circuits: AtomicCounter,
    no_source: AtomicCounter,
}

impl ProviderGateway {
    /// Gateway over a registry, cache, and audit log
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<CacheStore>,
        audit: Arc<AuditLog>,
        call_timeout: Duration,
    ) -> Self {
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            cache,
            audit,
            limiter: RateLimiter::default(),
            breaker: CircuitBreaker::default(),
            health: ProviderHealthTracker::new(),
            cost: CostMeter::new(),
            flights: SingleFlight::new(SINGLE_FLIGHT_WINDOW),
            call_timeout,
            retry: RetryConfig::default(),
            refresh_tx,
            refresh_rx: Mutex::new(Some(refresh_rx)),
            calls: AtomicCounter::new(0),
            cache_hits: AtomicCounter::new(0),
            stale_served: AtomicCounter::new(0),
            coalesced: AtomicCounter::new(0),
            failovers: AtomicCounter::new(0),
            short_circuits: AtomicCounter::new(0),
            no_source: AtomicCounter::new(0),
        }
    }

    /// The provider registry
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The cost meter
    pub fn cost_meter(&self) -> &CostMeter {
        &self.cost
    }

    /// The rate limiter (per-provider overrides are configured here)
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The circuit breaker
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Serve a demand: cache first, then a single-flighted provider call
    pub async fn fetch(&self, demand: &Demand, cancel: &CancelSignal) -> VetResult<GatewayResult> {
        cancel.checkpoint()?;
        self.calls.inc();

        let key = demand.fingerprint.key();
        let check = demand.fingerprint.check;
        let (decision, hit) = self
            .cache
            .lookup(&demand.fingerprint, demand.tier, &demand.scope);

        match decision {
            CacheDecision::UseFresh => {
                let entry = hit.expect("fresh decision carries an entry");
                self.cache_hits.inc();
                self.audit_event(AuditCategory::CacheHit, format!("cache-hit:{key}"))?;
                return Ok(self.result_from_entry(entry, &key, false));
            }
            CacheDecision::UseStaleFlagAndRefresh => {
                let entry = hit.expect("stale-flag decision carries an entry");
                self.cache_hits.inc();
                self.stale_served.inc();
                self.audit_event(AuditCategory::CacheHit, format!("cache-hit-stale:{key}"))?;
                self.enqueue_refresh(demand.clone());
                return Ok(self.result_from_entry(entry, &key, true));
            }
            CacheDecision::BlockRefresh => {
                self.audit_event(AuditCategory::StaleBlocked, format!("stale-blocked:{key}"))?;
            }
            CacheDecision::MissExecute => {}
        }

        // live path: coalesce identical concurrent demands
        match self.flights.begin(&key) {
            FlightRole::Done(outcome) => {
                self.coalesced.inc();
                Self::adapt_shared(outcome, check)
            }
            FlightRole::Follower(rx) => {
                self.coalesced.inc();
                match self.flights.follow(&key, rx).await {
                    Some(outcome) => {
                        cancel.checkpoint()?;
                        Self::adapt_shared(outcome, check)
                    }
                    // leader vanished without publishing; run it ourselves
                    None => self.lead(demand, cancel, &key).await,
                }
            }
            FlightRole::Leader => self.lead(demand, cancel, &key).await,
        }
    }

    async fn lead(
        &self,
        demand: &Demand,
        cancel: &CancelSignal,
        key: &str,
    ) -> VetResult<GatewayResult> {
        let outcome = self.execute_with_failover(demand, cancel).await;
        match &outcome {
            Ok(result) => self.flights.complete(key, Ok(result.clone())),
            Err(VetError::Cancelled) | Err(VetError::DeadlineExceeded) => {
                self.flights.complete(key, Err(FlightFailure::Cancelled))
            }
            Err(_) => self
                .flights
                .complete(key, Err(FlightFailure::NoSourceAvailable)),
        }
        outcome
    }

    fn adapt_shared(
        outcome: Result<GatewayResult, FlightFailure>,
        check: CheckType,
    ) -> VetResult<GatewayResult> {
        match outcome {
            Ok(result) => Ok(GatewayResult {
                coalesced: true,
                ..result
            }),
            Err(FlightFailure::NoSourceAvailable) => Err(VetError::NoSourceAvailable(check)),
            Err(FlightFailure::Cancelled) => Err(VetError::Cancelled),
        }
    }

    /// Execute against ordered candidates, failing over until one
    /// succeeds. At most one successful response is recorded.
    pub(crate) async fn execute_with_failover(
        &self,
        demand: &Demand,
        cancel: &CancelSignal,
    ) -> VetResult<GatewayResult> {
        let check = demand.fingerprint.check;
        let locale = &demand.fingerprint.locale;
        let key = demand.fingerprint.key();

        let mut candidates = self.registry.candidates(check, locale, demand.tier);
        candidates.sort_by(|a, b| {
            let (a_id, b_id) = (a.provider_id(), b.provider_id());
            self.health
                .score(&b_id)
                .total_cmp(&self.health.score(&a_id))
                .then(a.cost_tier().cmp(&b.cost_tier()))
                .then(
                    self.health
                        .latency_ms(&a_id)
                        .total_cmp(&self.health.latency_ms(&b_id)),
                )
        });

        if candidates.is_empty() {
            self.no_source.inc();
            self.audit_event(AuditCategory::ProviderCall, format!("no-source:{check}"))?;
            return Err(VetError::NoSourceAvailable(check));
        }

        let request = ProviderRequest {
            check,
            subject: demand.subject.clone(),
            locale: locale.clone(),
            degree: demand.fingerprint.degree_scope,
            params: demand.params.clone(),
        };

        let mut tried = 0usize;
        for provider in candidates {
            cancel.checkpoint()?;
            let pid = provider.provider_id();

            if !self.breaker.allow(&pid) {
                self.short_circuits.inc();
                tracing::debug!(provider = %pid, "circuit open, short-circuited");
                continue;
            }
            if !self.limiter.try_acquire(&pid, provider.cost_tier()) {
                tracing::debug!(provider = %pid, "pacing exhausted, trying next candidate");
                continue;
            }

            if tried > 0 {
                self.failovers.inc();
            }
            tried += 1;

            let started = Instant::now();
            match tokio::time::timeout(self.call_timeout, provider.execute(&request)).await {
                Err(_) => {
                    self.health.record_failure(&pid);
                    self.breaker.on_failure(&pid);
                    tracing::warn!(provider = %pid, %check, "provider timeout");
                }
                Ok(Err(e)) => {
                    self.health.record_failure(&pid);
                    self.breaker.on_failure(&pid);
                    tracing::warn!(provider = %pid, %check, error = %e, "provider failed");
                }
                Ok(Ok(mut response)) => {
                    // a cancelled call must not cache a partial result
                    if cancel.is_cancelled() {
                        return Err(VetError::Cancelled);
                    }
                    let latency_ms = started.elapsed().as_millis() as u64;
                    self.health.record_success(&pid, latency_ms);
                    self.breaker.on_success(&pid);
                    self.cost.record(
                        pid.clone(),
                        response.cost,
                        &response.currency,
                        demand.billed_to.clone(),
                    );

                    let now = Utc::now();
                    for finding in &mut response.findings {
                        finding.provenance = Provenance {
                            provider_id: pid.clone(),
                            acquired_at: now,
                            cache_hit: false,
                            stale: false,
                        };
                    }

                    self.audit_event(
                        AuditCategory::ProviderCall,
                        format!("provider-call:{pid}:{key}"),
                    )?;

                    let (fresh_window, stale_window) = self.cache.policy().windows(check);
                    let entry = CacheEntry {
                        fingerprint: demand.fingerprint.clone(),
                        origin: Origin::PaidExternal,
                        acquired_at: now,
                        fresh_until: now + fresh_window,
                        stale_until: now
                            + stale_window.unwrap_or_else(|| ChronoDuration::days(36_500)),
                        findings: response.findings.clone(),
                        discovered: Vec::new(),
                        raw_ciphertext: Vec::new(),
                        cost: response.cost,
                    };
                    self.cache
                        .put(entry, &response.raw, &self.audit)
                        .map_err(|e| VetError::AuditWriteFailed(e.to_string()))?;

                    return Ok(GatewayResult {
                        findings: response.findings,
                        discovered: response.discovered,
                        cache_hit: false,
                        stale: false,
                        coalesced: false,
                        provider_id: Some(pid),
                        fingerprint_key: key,
                    });
                }
            }
        }

        self.no_source.inc();
        self.audit_event(AuditCategory::ProviderCall, format!("no-source:{check}"))?;
        Err(VetError::NoSourceAvailable(check))
    }

    fn result_from_entry(&self, entry: CacheEntry, key: &str, stale: bool) -> GatewayResult {
        let mut findings = entry.findings;
        let provider_id = findings.first().map(|f| f.provenance.provider_id.clone());
        for finding in &mut findings {
            finding.provenance.cache_hit = true;
            finding.provenance.stale = stale;
        }
        GatewayResult {
            findings,
            discovered: Vec::new(),
            cache_hit: true,
            stale,
            coalesced: false,
            provider_id,
            fingerprint_key: key.to_string(),
        }
    }

    fn audit_event(&self, category: AuditCategory, payload_ref: String) -> VetResult<()> {
        self.audit
            .append(Actor::System, category, payload_ref)
            .map(|_| ())
            .map_err(|e| VetError::AuditWriteFailed(e.to_string()))
    }

    /// Transient failures back off and retry per policy; anything else
    /// fails immediately and leaves the stale entry in place.
    async fn refresh_with_backoff(&self, demand: &Demand) -> VetResult<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let cancel = CancelSignal::with_timeout(self.call_timeout * 2);
            match self.execute_with_failover(demand, &cancel).await {
                Ok(_) => return Ok(()),
                // every candidate being down is transient from the
                // refresh worker's point of view
                Err(e)
                    if (e.is_transient() || matches!(e, VetError::NoSourceAvailable(_)))
                        && !self.retry.exhausted(attempt) =>
                {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(attempt, ?delay, "refresh backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn enqueue_refresh(&self, demand: Demand) {
        if self.refresh_tx.send(RefreshJob { demand }).is_err() {
            tracing::warn!("refresh queue closed; stale entry left in place");
        }
    }

    /// Start the best-effort async refresh worker. Failures leave the
    /// stale entry in place and record a refresh_failed audit event.
    pub fn spawn_refresh_worker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let gateway = Arc::clone(self);
        let mut rx = self
            .refresh_rx
            .lock()
            .take()
            .expect("refresh worker already running");

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let key = job.demand.fingerprint.key();
                if let Err(e) = gateway.refresh_with_backoff(&job.demand).await {
                    tracing::warn!(%key, error = %e, "async refresh failed");
                    let _ = gateway.audit.append(
                        Actor::System,
                        AuditCategory::RefreshFailed,
                        format!("refresh-failed:{key}"),
                    );
                } else {
                    tracing::debug!(%key, "async refresh landed");
                }
            }
        })
    }

    /// Gateway statistics
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            calls: self.calls.get(),
            cache_hits: self.cache_hits.get(),
            stale_served: self.stale_served.get(),
            coalesced: self.coalesced.get(),
            failovers: self.failovers.get(),
            short_circuits: self.short_circuits.get(),
            no_source: self.no_source.get(),
        }
    }
}
