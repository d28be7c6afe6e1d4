//! Per-provider call pacing
//!
//! External data providers meter by call volume and by spend, so the
//! limiter paces both at once: each provider holds a credit balance
//! that accrues continuously up to a burst ceiling, and a call draws
//! credits weighted by the provider's cost tier. Premium sources drain
//! the same balance faster than core ones. Balances are shared across
//! every investigation in the process.

use crate::provider::CostTier;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Instant;
use vet_common::ProviderId;

/// Pacing settings for one provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Credits accrued per second of wall clock
    pub sustained_per_second: f64,
    /// Balance never accrues past this ceiling
    pub burst_ceiling: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            sustained_per_second: 10.0,
            burst_ceiling: 20.0,
        }
    }
}

impl CostTier {
    /// How many pacing credits one call at this tier draws
    pub fn draw_weight(&self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Standard => 1.0,
            Self::Premium => 2.0,
        }
    }
}

struct CreditBalance {
    credits: f64,
    accrued_at: Instant,
}

/// Continuously-accruing credit balance for one provider
pub struct ProviderPacer {
    balance: Mutex<CreditBalance>,
    config: RateLimitConfig,
}

impl ProviderPacer {
    /// Pacer starting at a full balance
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            balance: Mutex::new(CreditBalance {
                credits: config.burst_ceiling,
                accrued_at: Instant::now(),
            }),
            config,
        }
    }

    /// Draw `weight` credits if the balance covers them.
    ///
    /// Accrual happens on the way in, so an idle provider recovers its
    /// burst ceiling without a background task.
    pub fn try_draw(&self, weight: f64) -> bool {
        let mut balance = self.balance.lock();
        let now = Instant::now();
        let accrued =
            now.duration_since(balance.accrued_at).as_secs_f64() * self.config.sustained_per_second;
        balance.credits = (balance.credits + accrued).min(self.config.burst_ceiling);
        balance.accrued_at = now;

        if balance.credits >= weight {
            balance.credits -= weight;
            true
        } else {
            false
        }
    }

    /// Current balance after accrual
    pub fn available(&self) -> f64 {
        let mut balance = self.balance.lock();
        let now = Instant::now();
        let accrued =
            now.duration_since(balance.accrued_at).as_secs_f64() * self.config.sustained_per_second;
        balance.credits = (balance.credits + accrued).min(self.config.burst_ceiling);
        balance.accrued_at = now;
        balance.credits
    }
}

/// Pacers shared per provider across all investigations
pub struct RateLimiter {
    pacers: DashMap<ProviderId, ProviderPacer>,
    default_config: RateLimitConfig,
    overrides: DashMap<ProviderId, RateLimitConfig>,
}

impl RateLimiter {
    /// Limiter with a platform default
    pub fn new(default_config: RateLimitConfig) -> Self {
        Self {
            pacers: DashMap::new(),
            default_config,
            overrides: DashMap::new(),
        }
    }

    /// Per-provider override (from provider onboarding config)
    pub fn configure(&self, provider: ProviderId, config: RateLimitConfig) {
        self.overrides.insert(provider.clone(), config);
        // rebuilt with the new config on next draw
        self.pacers.remove(&provider);
    }

    /// Draw the pacing cost of one call at the given tier
    pub fn try_acquire(&self, provider: &ProviderId, tier: CostTier) -> bool {
        let pacer = self.pacers.entry(provider.clone()).or_insert_with(|| {
            let config = self
                .overrides
                .get(provider)
                .map(|c| *c)
                .unwrap_or(self.default_config);
            ProviderPacer::new(config)
        });
        pacer.try_draw(tier.draw_weight())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slow_config(ceiling: f64) -> RateLimitConfig {
        RateLimitConfig {
            sustained_per_second: 0.001,
            burst_ceiling: ceiling,
        }
    }

    #[test]
    fn test_balance_exhausts_at_ceiling() {
        let pacer = ProviderPacer::new(slow_config(3.0));
        assert!(pacer.try_draw(1.0));
        assert!(pacer.try_draw(1.0));
        assert!(pacer.try_draw(1.0));
        assert!(!pacer.try_draw(1.0));
    }

    #[test]
    fn test_balance_accrues_while_idle() {
        let pacer = ProviderPacer::new(RateLimitConfig {
            sustained_per_second: 1000.0,
            burst_ceiling: 1.0,
        });
        assert!(pacer.try_draw(1.0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(pacer.try_draw(1.0));
    }

    #[test]
    fn test_premium_calls_drain_faster() {
        let pacer = ProviderPacer::new(slow_config(2.0));
        // one premium call spends what two standard calls would
        assert!(pacer.try_draw(CostTier::Premium.draw_weight()));
        assert!(!pacer.try_draw(CostTier::Standard.draw_weight()));

        let pacer = ProviderPacer::new(slow_config(2.0));
        assert!(pacer.try_draw(CostTier::Standard.draw_weight()));
        assert!(pacer.try_draw(CostTier::Standard.draw_weight()));
        assert!(!pacer.try_draw(CostTier::Standard.draw_weight()));
    }

    #[test]
    fn test_balances_are_per_provider() {
        let limiter = RateLimiter::new(slow_config(1.0));
        let a = ProviderId::new("a");
        let b = ProviderId::new("b");
        assert!(limiter.try_acquire(&a, CostTier::Standard));
        assert!(!limiter.try_acquire(&a, CostTier::Standard));
        assert!(limiter.try_acquire(&b, CostTier::Standard));
    }

    #[test]
    fn test_override_replaces_default() {
        let limiter = RateLimiter::new(slow_config(10.0));
        let p = ProviderId::new("p");
        limiter.configure(p.clone(), slow_config(1.0));
        assert!(limiter.try_acquire(&p, CostTier::Standard));
        assert!(!limiter.try_acquire(&p, CostTier::Standard));
    }
}
