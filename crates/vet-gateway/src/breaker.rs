//! Shared per-provider circuit breaker

use dashmap::DashMap;
use std::time::{Duration, Instant};
use vet_common::ProviderId;

/// Breaker tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Failures must land within this window to count as consecutive
    pub failure_window: Duration,
    /// Open duration before a half-open probe is allowed
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Observable circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    consecutive_failures: u32,
    window_start: Option<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            window_start: None,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

/// Circuit breaker shared across investigations, one state per provider
pub struct CircuitBreaker {
    states: DashMap<ProviderId, BreakerState>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    /// Breaker with the given config
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            states: DashMap::new(),
            config,
        }
    }

    /// May a call proceed? Half-open admits exactly one probe.
    pub fn allow(&self, provider: &ProviderId) -> bool {
        let mut state = self
            .states
            .entry(provider.clone())
            .or_insert_with(BreakerState::new);

        match state.opened_at {
            None => true,
            Some(opened) => {
                if opened.elapsed() < self.config.cooldown {
                    false
                } else if state.probe_in_flight {
                    false
                } else {
                    state.probe_in_flight = true;
                    tracing::info!(%provider, "circuit half-open, probing");
                    true
                }
            }
        }
    }

    /// Record a successful call; closes a half-open circuit
    pub fn on_success(&self, provider: &ProviderId) {
        let mut state = self
            .states
            .entry(provider.clone())
            .or_insert_with(BreakerState::new);
        if state.opened_at.is_some() {
            tracing::info!(%provider, "circuit closed");
        }
        *state = BreakerState::new();
    }

    /// Record a failed call; may open the circuit
    pub fn on_failure(&self, provider: &ProviderId) {
        let mut state = self
            .states
            .entry(provider.clone())
            .or_insert_with(BreakerState::new);

        // a failed half-open probe re-opens immediately
        if state.opened_at.is_some() {
            state.opened_at = Some(Instant::now());
            state.probe_in_flight = false;
            return;
        }

        let now = Instant::now();
        match state.window_start {
            Some(start) if now.duration_since(start) <= self.config.failure_window => {
                state.consecutive_failures += 1;
            }
            _ => {
                state.window_start = Some(now);
                state.consecutive_failures = 1;
            }
        }

        if state.consecutive_failures >= self.config.failure_threshold {
            tracing::warn!(
                %provider,
                failures = state.consecutive_failures,
                "circuit opened"
            );
            state.opened_at = Some(now);
            state.probe_in_flight = false;
        }
    }

    /// Current state for a provider
    pub fn state(&self, provider: &ProviderId) -> CircuitState {
        match self.states.get(provider) {
            None => CircuitState::Closed,
            Some(state) => match state.opened_at {
                None => CircuitState::Closed,
                Some(opened) if opened.elapsed() >= self.config.cooldown => CircuitState::HalfOpen,
                Some(_) => CircuitState::Open,
            },
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
