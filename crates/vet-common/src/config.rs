//! Service, SAR, limits, and retry configuration

use crate::{CheckType, ConfigError, Degree, Tier, VigilanceLevel};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Review handling level for ambiguous matches and flagged findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewLevel {
    Automated,
    Analyst,
    Investigator,
    Dedicated,
}

/// Per-customer service configuration for an investigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub tier: Tier,
    pub vigilance: VigilanceLevel,
    pub degrees: Degree,
    pub review: ReviewLevel,
    #[serde(default)]
    pub additional_checks: Vec<CheckType>,
    #[serde(default)]
    pub excluded_checks: Vec<CheckType>,
}

impl ServiceConfig {
    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.degrees == Degree::D3 && self.tier != Tier::Enhanced {
            return Err(ConfigError::new("degrees=d3 requires tier=enhanced"));
        }
        if let Some(check) = self
            .additional_checks
            .iter()
            .find(|c| self.excluded_checks.contains(*c))
        {
            return Err(ConfigError::new(format!(
                "check {check} is both additional and excluded"
            )));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tier: Tier::Standard,
            vigilance: VigilanceLevel::V0,
            degrees: Degree::D1,
            review: ReviewLevel::Automated,
            additional_checks: Vec::new(),
            excluded_checks: Vec::new(),
        }
    }
}

/// SAR loop thresholds. All tunable; defaults match production policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarConfig {
    /// type_confidence needed for COMPLETE (threshold)
    pub complete_threshold: f64,
    /// Higher bar applied to foundation types
    pub foundation_threshold: f64,
    pub max_iterations: u32,
    pub foundation_max_iterations: u32,
    /// info_gain_rate below this ends the loop as diminished
    pub min_info_gain: f64,
    /// Facts below this confidence stay unconfirmed unless corroborated
    pub kb_confidence_floor: f64,
}

impl Default for SarConfig {
    fn default() -> Self {
        Self {
            complete_threshold: 0.85,
            foundation_threshold: 0.90,
            max_iterations: 3,
            foundation_max_iterations: 4,
            min_info_gain: 0.10,
            kb_confidence_floor: 0.7,
        }
    }
}

impl SarConfig {
    /// Completion threshold for a given type
    pub fn threshold_for(&self, check: CheckType) -> f64 {
        if check.is_foundation() {
            self.foundation_threshold
        } else {
            self.complete_threshold
        }
    }

    /// Iteration cap for a given type
    pub fn cap_for(&self, check: CheckType) -> u32 {
        if check.is_foundation() {
            self.foundation_max_iterations
        } else {
            self.max_iterations
        }
    }
}

/// Concurrency ceilings and timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Concurrent per-type tasks within a parallel phase
    pub type_concurrency: usize,
    /// Concurrent provider calls within a type
    pub provider_concurrency: usize,
    pub provider_call_timeout: Duration,
    pub type_timeout: Duration,
    pub investigation_timeout: Duration,
    pub network_max_entities_per_degree: usize,
    pub reconciliation_max_queries: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            type_concurrency: 6,
            provider_concurrency: 4,
            provider_call_timeout: Duration::from_secs(30),
            type_timeout: Duration::from_secs(300),
            investigation_timeout: Duration::from_secs(3600),
            network_max_entities_per_degree: 20,
            reconciliation_max_queries: 10,
        }
    }
}

/// Exponential backoff for transient provider errors and cache conflicts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub base: Duration,
    pub factor: f64,
    /// Fractional jitter, +/- around the computed delay
    pub jitter: f64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2.0,
            jitter: 0.25,
            max_attempts: 5,
        }
    }
}

impl RetryConfig {
    /// Delay before the given attempt (1-based). Jitter is derived from
    /// the attempt number so retry schedules are reproducible.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base.as_millis() as f64 * self.factor.powi(attempt.saturating_sub(1) as i32);
        // attempt-derived value in [-1, 1]
        let spread = ((attempt as u64).wrapping_mul(2654435761) % 2001) as f64 / 1000.0 - 1.0;
        let jittered = exp * (1.0 + self.jitter * spread);
        Duration::from_millis(jittered.max(0.0) as u64)
    }

    /// Whether another attempt is allowed after `attempt` attempts
    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_d3_requires_enhanced() {
        let cfg = ServiceConfig {
            degrees: Degree::D3,
            tier: Tier::Standard,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ServiceConfig {
            degrees: Degree::D3,
            tier: Tier::Enhanced,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_foundation_gets_higher_bar() {
        let sar = SarConfig::default();
        assert_eq!(sar.threshold_for(CheckType::Identity), 0.90);
        assert_eq!(sar.threshold_for(CheckType::Criminal), 0.85);
        assert_eq!(sar.cap_for(CheckType::Identity), 4);
        assert_eq!(sar.cap_for(CheckType::Criminal), 3);
    }

    #[test]
    fn test_backoff_grows_and_stays_bounded() {
        let retry = RetryConfig::default();
        let d1 = retry.delay_for(1);
        let d3 = retry.delay_for(3);
        assert!(d3 > d1);
        // within +/- 25% of 500ms
        assert!(d1 >= Duration::from_millis(375) && d1 <= Duration::from_millis(625));
        // deterministic
        assert_eq!(retry.delay_for(2), retry.delay_for(2));
    }
}
