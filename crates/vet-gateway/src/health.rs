//! Provider health tracking for routing order

use dashmap::DashMap;
use vet_common::ProviderId;

#[derive(Debug, Clone)]
struct ProviderStats {
    total_calls: u64,
    failures: u64,
    consecutive_failures: u32,
    /// Exponential moving average, alpha 0.2
    latency_ema_ms: f64,
}

impl ProviderStats {
    fn new() -> Self {
        Self {
            total_calls: 0,
            failures: 0,
            consecutive_failures: 0,
            latency_ema_ms: 0.0,
        }
    }

    fn score(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        let success_rate = 1.0 - self.failures as f64 / self.total_calls as f64;
        // recent instability weighs harder than lifetime rate
        let streak_penalty = 0.15 * self.consecutive_failures.min(6) as f64;
        (success_rate - streak_penalty).clamp(0.0, 1.0)
    }
}

/// Rolling health and latency per provider
pub struct ProviderHealthTracker {
    stats: DashMap<ProviderId, ProviderStats>,
}

impl ProviderHealthTracker {
    /// Empty tracker; unknown providers score 1.0
    pub fn new() -> Self {
        Self {
            stats: DashMap::new(),
        }
    }

    /// Record a successful call with its latency
    pub fn record_success(&self, provider: &ProviderId, latency_ms: u64) {
        let mut stats = self
            .stats
            .entry(provider.clone())
            .or_insert_with(ProviderStats::new);
        stats.total_calls += 1;
        stats.consecutive_failures = 0;
        stats.latency_ema_ms = if stats.latency_ema_ms == 0.0 {
            latency_ms as f64
        } else {
            0.8 * stats.latency_ema_ms + 0.2 * latency_ms as f64
        };
    }

    /// Record a failed call
    pub fn record_failure(&self, provider: &ProviderId) {
        let mut stats = self
            .stats
            .entry(provider.clone())
            .or_insert_with(ProviderStats::new);
        stats.total_calls += 1;
        stats.failures += 1;
        stats.consecutive_failures += 1;
    }

    /// Health score in [0, 1]; higher routes first
    pub fn score(&self, provider: &ProviderId) -> f64 {
        self.stats.get(provider).map(|s| s.score()).unwrap_or(1.0)
    }

    /// Smoothed historical latency; unknown providers sort last among ties
    pub fn latency_ms(&self, provider: &ProviderId) -> f64 {
        self.stats
            .get(provider)
            .map(|s| s.latency_ema_ms)
            .unwrap_or(0.0)
    }
}

impl Default for ProviderHealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
