//! Investigation phases

use serde::{Deserialize, Serialize};

/// The five investigation phases, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Foundation,
    Records,
    Intelligence,
    Network,
    Reconciliation,
}

impl Phase {
    /// The next phase, None after reconciliation
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Foundation => Some(Self::Records),
            Self::Records => Some(Self::Intelligence),
            Self::Intelligence => Some(Self::Network),
            Self::Network => Some(Self::Reconciliation),
            Self::Reconciliation => None,
        }
    }

    /// All phases in execution order
    pub fn all() -> [Self; 5] {
        [
            Self::Foundation,
            Self::Records,
            Self::Intelligence,
            Self::Network,
            Self::Reconciliation,
        ]
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Foundation => "foundation",
            Self::Records => "records",
            Self::Intelligence => "intelligence",
            Self::Network => "network",
            Self::Reconciliation => "reconciliation",
        };
        f.write_str(s)
    }
}
