//! Vigilance scheduler
//!
//! Recurring re-screens per monitoring level: V1 annual full re-screen,
//! V2 monthly delta checks, V3 bi-monthly delta plus real-time hooks.
//! Scheduling is deterministic per entity - the jitter that spreads
//! load derives from the entity id, not a RNG - so due times are
//! reproducible. A delta that surfaces any new finding at MEDIUM or
//! above raises an alert and requires a new profile version.

#![warn(missing_docs)]

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vet_common::{
    CheckType, CustomerId, EntityId, EntityProfile, ProfileDelta, Severity, VigilanceLevel,
};

/// Real-time events V3 subscriptions react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A sanctions list the entity may appear on changed
    SanctionsListUpdate { list_name: String },
    /// The continuous adverse-media watch matched
    AdverseMediaMention { source: String },
}

/// Why a run is due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Full re-screen across all configured checks
    FullRescreen,
    /// Delta pass over the level's check subset
    DeltaCheck,
}

/// A scheduled recurring check for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCheck {
    pub entity_id: EntityId,
    pub customer_id: CustomerId,
    pub level: VigilanceLevel,
    pub last_run: Option<DateTime<Utc>>,
    pub next_due: DateTime<Utc>,
    pub kind: RunKind,
}

/// An alert raised by a delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VigilanceAlert {
    pub entity_id: EntityId,
    pub customer_id: CustomerId,
    pub max_severity: Severity,
    pub new_finding_count: usize,
    pub triggered_at: DateTime<Utc>,
    /// The delta requires a new profile version
    pub new_version_required: bool,
}

/// The vigilance scheduler
pub struct VigilanceScheduler {
    schedule: DashMap<EntityId, ScheduledCheck>,
    alerts: RwLock<Vec<VigilanceAlert>>,
}

impl VigilanceScheduler {
    /// Empty scheduler
    pub fn new() -> Self {
        Self {
            schedule: DashMap::new(),
            alerts: RwLock::new(Vec::new()),
        }
    }

    /// Base interval for a level; None for one-shot V0
    pub fn interval(level: VigilanceLevel) -> Option<Duration> {
        match level {
            VigilanceLevel::V0 => None,
            VigilanceLevel::V1 => Some(Duration::days(365)),
            VigilanceLevel::V2 => Some(Duration::days(30)),
            VigilanceLevel::V3 => Some(Duration::days(61)),
        }
    }

    /// Checks a delta run covers at this level
    pub fn delta_checks(level: VigilanceLevel) -> &'static [CheckType] {
        match level {
            VigilanceLevel::V0 => &[],
            // annual runs are full re-screens, not deltas
            VigilanceLevel::V1 => &[],
            VigilanceLevel::V2 | VigilanceLevel::V3 => &[
                CheckType::Criminal,
                CheckType::Sanctions,
                CheckType::AdverseMedia,
                CheckType::Regulatory,
                CheckType::Civil,
            ],
        }
    }

    /// Deterministic per-entity jitter, at most 5% of the interval
    fn jitter(entity_id: EntityId, interval: Duration) -> Duration {
        let mut hasher = Sha256::new();
        hasher.update(entity_id.0.as_bytes());
        let digest = hasher.finalize();
        let bucket = u16::from_be_bytes([digest[0], digest[1]]) as i64 % 1000;
        Duration::seconds(interval.num_seconds() * 5 / 100 * bucket / 1000)
    }

    /// Register or update an entity's monitoring level.
    /// V0 registers nothing.
    pub fn register(
        &self,
        entity_id: EntityId,
        customer_id: CustomerId,
        level: VigilanceLevel,
        from: DateTime<Utc>,
    ) {
        let Some(interval) = Self::interval(level) else {
            self.schedule.remove(&entity_id);
            return;
        };
        let next_due = from + interval + Self::jitter(entity_id, interval);
        let kind = if level == VigilanceLevel::V1 {
            RunKind::FullRescreen
        } else {
            RunKind::DeltaCheck
        };
        tracing::info!(%entity_id, ?level, %next_due, "vigilance registered");
        self.schedule.insert(
            entity_id,
            ScheduledCheck {
                entity_id,
                customer_id,
                level,
                last_run: None,
                next_due,
                kind,
            },
        );
    }

    /// Checks due at `now`, soonest first
    pub fn due(&self, now: DateTime<Utc>) -> Vec<ScheduledCheck> {
        let mut due: Vec<ScheduledCheck> = self
            .schedule
            .iter()
            .filter(|c| c.next_due <= now)
            .map(|c| c.clone())
            .collect();
        due.sort_by_key(|c| c.next_due);
        due
    }

    /// Record a completed run; the next due time advances one interval
    /// plus the entity's deterministic jitter.
    pub fn record_run(&self, entity_id: EntityId, ran_at: DateTime<Utc>) {
        if let Some(mut check) = self.schedule.get_mut(&entity_id) {
            let interval =
                Self::interval(check.level).expect("scheduled entries always have intervals");
            check.last_run = Some(ran_at);
            check.next_due = ran_at + interval + Self::jitter(entity_id, interval);
            check.kind = if check.level == VigilanceLevel::V1 {
                RunKind::FullRescreen
            } else {
                RunKind::DeltaCheck
            };
        }
    }

    /// React to a real-time event: V3 entities get a delta check queued
    /// within five minutes.
    pub fn on_realtime_event(
        &self,
        entity_id: EntityId,
        event: &RealtimeEvent,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(mut check) = self.schedule.get_mut(&entity_id) else {
            return false;
        };
        if check.level != VigilanceLevel::V3 {
            return false;
        }
        let target = now + Duration::minutes(5);
        if check.next_due > target {
            tracing::info!(%entity_id, ?event, "real-time event queued delta check");
            check.next_due = target;
            check.kind = RunKind::DeltaCheck;
        }
        true
    }

    /// Evaluate a freshly computed delta: a new finding at MEDIUM or
    /// above raises an alert and requires a new profile version.
    pub fn process_delta(
        &self,
        profile: &EntityProfile,
        delta: &ProfileDelta,
        customer_id: CustomerId,
    ) -> Option<VigilanceAlert> {
        let max_severity = delta.max_new_severity(profile)?;
        if max_severity < Severity::Medium {
            return None;
        }
        let alert = VigilanceAlert {
            entity_id: profile.entity_id,
            customer_id,
            max_severity,
            new_finding_count: delta.new_findings.len(),
            triggered_at: Utc::now(),
            new_version_required: true,
        };
        tracing::warn!(
            entity = %profile.entity_id,
            severity = ?max_severity,
            new_findings = delta.new_findings.len(),
            "vigilance alert raised"
        );
        self.alerts.write().push(alert.clone());
        Some(alert)
    }

    /// Alerts raised so far
    pub fn alerts(&self) -> Vec<VigilanceAlert> {
        self.alerts.read().clone()
    }

    /// Monitored entity count
    pub fn monitored_count(&self) -> usize {
        self.schedule.len()
    }
}

impl Default for VigilanceScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vet_common::{
        Finding, FindingDetails, ProfileStatus, ProfileTrigger, Provenance, ProviderId, RiskBand,
        RiskScore,
    };

    fn profile_with_finding(severity: Severity) -> (EntityProfile, ProfileDelta) {
        let finding = Finding::new(
            severity,
            0.9,
            Provenance {
                provider_id: ProviderId::new("delta"),
                acquired_at: Utc::now(),
                cache_hit: false,
                stale: false,
            },
            FindingDetails::Regulatory {
                list_name: "enforcement actions".into(),
                authority: "SEC".into(),
                action: "fine".into(),
            },
        );
        let delta = ProfileDelta {
            previous_version: 1,
            new_findings: vec![finding.id],
            resolved_findings: Vec::new(),
            changed_findings: Vec::new(),
            risk_score_change: 5.0,
            connection_count_change: 0,
            evolution_signals: Vec::new(),
        };
        let profile = EntityProfile {
            entity_id: EntityId::new(),
            version: 2,
            created_at: Utc::now(),
            trigger: ProfileTrigger::VigilanceDelta,
            status: ProfileStatus::Complete,
            findings: vec![finding],
            risk_score: RiskScore {
                overall: 20.0,
                by_category: Default::default(),
                band: RiskBand::Moderate,
            },
            connections: Vec::new(),
            stale_sources: Vec::new(),
            excluded_checks: Vec::new(),
            deferred_network: Vec::new(),
            delta: Some(delta.clone()),
        };
        (profile, delta)
    }

    #[test]
    fn test_v0_is_one_shot() {
        let scheduler = VigilanceScheduler::new();
        scheduler.register(EntityId::new(), CustomerId::new(), VigilanceLevel::V0, Utc::now());
        assert_eq!(scheduler.monitored_count(), 0);
    }

    #[test]
    fn test_next_due_is_deterministic() {
        let scheduler = VigilanceScheduler::new();
        let entity = EntityId::new();
        let customer = CustomerId::new();
        let from = Utc::now();

        scheduler.register(entity, customer, VigilanceLevel::V2, from);
        let first = scheduler.due(from + Duration::days(40))[0].next_due;

        scheduler.register(entity, customer, VigilanceLevel::V2, from);
        let second = scheduler.due(from + Duration::days(40))[0].next_due;
        assert_eq!(first, second);
    }

    #[test]
    fn test_jitter_bounded_at_five_percent() {
        let from = Utc::now();
        for _ in 0..50 {
            let scheduler = VigilanceScheduler::new();
            let entity = EntityId::new();
            scheduler.register(entity, CustomerId::new(), VigilanceLevel::V2, from);
            let check = scheduler.due(from + Duration::days(40)).pop().unwrap();
            let offset = check.next_due - (from + Duration::days(30));
            assert!(offset >= Duration::zero());
            assert!(offset <= Duration::seconds(30 * 24 * 3600 * 5 / 100));
        }
    }

    #[test]
    fn test_due_and_advance() {
        let scheduler = VigilanceScheduler::new();
        let entity = EntityId::new();
        let from = Utc::now();
        scheduler.register(entity, CustomerId::new(), VigilanceLevel::V2, from);

        assert!(scheduler.due(from + Duration::days(20)).is_empty());
        let due = scheduler.due(from + Duration::days(35));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].kind, RunKind::DeltaCheck);

        scheduler.record_run(entity, from + Duration::days(35));
        assert!(scheduler.due(from + Duration::days(40)).is_empty());
    }

    #[test]
    fn test_v1_runs_full_rescreen() {
        let scheduler = VigilanceScheduler::new();
        let entity = EntityId::new();
        let from = Utc::now();
        scheduler.register(entity, CustomerId::new(), VigilanceLevel::V1, from);
        let due = scheduler.due(from + Duration::days(400));
        assert_eq!(due[0].kind, RunKind::FullRescreen);
    }

    #[test]
    fn test_realtime_event_queues_within_five_minutes() {
        let scheduler = VigilanceScheduler::new();
        let entity = EntityId::new();
        let now = Utc::now();
        scheduler.register(entity, CustomerId::new(), VigilanceLevel::V3, now);

        let handled = scheduler.on_realtime_event(
            entity,
            &RealtimeEvent::SanctionsListUpdate {
                list_name: "OFAC SDN".into(),
            },
            now,
        );
        assert!(handled);
        let due = scheduler.due(now + Duration::minutes(5));
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn test_realtime_event_ignored_below_v3() {
        let scheduler = VigilanceScheduler::new();
        let entity = EntityId::new();
        let now = Utc::now();
        scheduler.register(entity, CustomerId::new(), VigilanceLevel::V2, now);
        let handled = scheduler.on_realtime_event(
            entity,
            &RealtimeEvent::AdverseMediaMention {
                source: "wire".into(),
            },
            now,
        );
        assert!(!handled);
    }

    #[test]
    fn test_medium_finding_raises_alert() {
        let scheduler = VigilanceScheduler::new();
        let (profile, delta) = profile_with_finding(Severity::Medium);
        let alert = scheduler.process_delta(&profile, &delta, CustomerId::new());
        let alert = alert.expect("medium severity alerts");
        assert!(alert.new_version_required);
        assert_eq!(scheduler.alerts().len(), 1);
    }

    #[test]
    fn test_low_finding_stays_quiet() {
        let scheduler = VigilanceScheduler::new();
        let (profile, delta) = profile_with_finding(Severity::Low);
        assert!(scheduler
            .process_delta(&profile, &delta, CustomerId::new())
            .is_none());
        assert!(scheduler.alerts().is_empty());
    }
}
