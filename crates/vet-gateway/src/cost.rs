//! Cost metering
//!
//! Every live provider call records its cost and billing scope.
//! Cache hits and coalesced followers are free.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use vet_common::{CustomerId, ProviderId};

/// Who pays for a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BilledTo {
    /// Shared platform cost (paid-external data reused across customers)
    Shared,
    /// A specific customer's isolated spend
    Customer(CustomerId),
}

/// One metered call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub provider_id: ProviderId,
    pub cost: f64,
    pub currency: String,
    pub billed_to: BilledTo,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory cost meter
pub struct CostMeter {
    records: RwLock<Vec<CostRecord>>,
}

impl CostMeter {
    /// Empty meter
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Record a call's cost
    pub fn record(&self, provider_id: ProviderId, cost: f64, currency: &str, billed_to: BilledTo) {
        self.records.write().push(CostRecord {
            provider_id,
            cost,
            currency: currency.to_string(),
            billed_to,
            recorded_at: Utc::now(),
        });
    }

    /// Total spend for one provider
    pub fn total_for_provider(&self, provider: &ProviderId) -> f64 {
        self.records
            .read()
            .iter()
            .filter(|r| &r.provider_id == provider)
            .map(|r| r.cost)
            .sum()
    }

    /// Total spend for a billing scope
    pub fn total_for_scope(&self, scope: &BilledTo) -> f64 {
        self.records
            .read()
            .iter()
            .filter(|r| &r.billed_to == scope)
            .map(|r| r.cost)
            .sum()
    }

    /// Number of metered calls
    pub fn call_count(&self) -> usize {
        self.records.read().len()
    }

    /// Snapshot of all records
    pub fn records(&self) -> Vec<CostRecord> {
        self.records.read().clone()
    }
}

impl Default for CostMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_totals() {
        let meter = CostMeter::new();
        let customer = CustomerId::new();
        let p = ProviderId::new("courts");
        meter.record(p.clone(), 2.0, "USD", BilledTo::Shared);
        meter.record(p.clone(), 3.5, "USD", BilledTo::Customer(customer));
        meter.record(ProviderId::new("media"), 1.0, "USD", BilledTo::Shared);

        assert_eq!(meter.total_for_provider(&p), 5.5);
        assert_eq!(meter.total_for_scope(&BilledTo::Shared), 3.0);
        assert_eq!(meter.total_for_scope(&BilledTo::Customer(customer)), 3.5);
        assert_eq!(meter.call_count(), 3);
    }
}
