//! Provider registry and gateway
//!
//! Routes demands to providers by (check, locale, tier), failing over
//! down the candidate list. Every call passes the provider's pacing
//! budget and circuit breaker; identical concurrent demands coalesce to
//! a single execution (single-flight) and every paid call is metered.

#![warn(missing_docs)]

pub mod breaker;
pub mod cost;
pub mod gateway;
pub mod health;
pub mod provider;
pub mod ratelimit;
pub mod registry;
pub mod singleflight;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use cost::{BilledTo, CostMeter, CostRecord};
pub use gateway::{Demand, GatewayResult, GatewayStats, ProviderGateway, RefreshJob};
pub use health::ProviderHealthTracker;
pub use provider::{
    CostTier, DiscoveredEntity, Provider, ProviderHealth, ProviderRequest, ProviderResponse,
    QueryParam, SubjectRef,
};
pub use ratelimit::{ProviderPacer, RateLimitConfig, RateLimiter};
pub use registry::ProviderRegistry;
pub use singleflight::{FlightFailure, FlightRole, SingleFlight};
