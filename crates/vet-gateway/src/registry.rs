//! Provider registry

use crate::provider::Provider;
use parking_lot::RwLock;
use std::sync::Arc;
use vet_common::{CheckType, Locale, ProviderId, Tier};

/// Registered providers in admin-configured order.
///
/// Registration order is load-bearing: it breaks confidence ties in the
/// knowledge base and orders equally-ranked routing candidates.
pub struct ProviderRegistry {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
        }
    }

    /// Register a provider at the end of the order
    pub fn register(&self, provider: Arc<dyn Provider>) {
        tracing::info!(provider = %provider.provider_id(), "provider registered");
        self.providers.write().push(provider);
    }

    /// Look up by id
    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .iter()
            .find(|p| &p.provider_id() == id)
            .cloned()
    }

    /// Position in registry order; usize::MAX for unknown providers
    pub fn registry_order(&self, id: &ProviderId) -> usize {
        self.providers
            .read()
            .iter()
            .position(|p| &p.provider_id() == id)
            .unwrap_or(usize::MAX)
    }

    /// Candidate providers for a demand, in registration order.
    /// The gateway re-orders by health, cost, and latency.
    pub fn candidates(
        &self,
        check: CheckType,
        locale: &Locale,
        tier: Tier,
    ) -> Vec<Arc<dyn Provider>> {
        self.providers
            .read()
            .iter()
            .filter(|p| {
                p.supported_checks().contains(&check)
                    && p.supports_locale(locale)
                    && p.tier_category().permitted_for(tier)
            })
            .cloned()
            .collect()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// True when no provider is registered
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
