//! Append-only audit log with hash-chain integrity
//!
//! Every externally visible state transition writes here first
//! (write-ahead discipline). Events carry a monotone sequence assigned
//! under a single exclusive section, and each event hashes its
//! predecessor so tampering is detectable. Payloads are referenced by
//! opaque id - raw PII never enters the log.

#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const GENESIS: &str = "genesis";

/// Who performed the audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    User,
    Provider,
}

/// Event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Config,
    Consent,
    ComplianceDecision,
    ProviderCall,
    CacheHit,
    StaleBlocked,
    RefreshFailed,
    FindingEmitted,
    Merge,
    Erasure,
    ReviewDecision,
    Checkpoint,
}

/// A single chained audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Monotone per-log sequence
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub category: AuditCategory,
    /// Opaque reference to the payload - never raw PII
    pub payload_ref: String,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditEvent {
    fn compute_hash(&self, prev_hash: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sequence.to_be_bytes());
        hasher.update(self.timestamp.timestamp_micros().to_be_bytes());
        hasher.update([self.actor as u8, self.category as u8]);
        hasher.update(self.payload_ref.as_bytes());
        hasher.update(prev_hash.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Chain verification outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityResult {
    pub valid: bool,
    pub checked_count: u64,
    pub error: Option<String>,
}

/// Audit failure
#[derive(Debug, Error)]
pub enum AuditError {
    /// The log refused the append; the guarded transition must abort
    #[error("audit append rejected: {0}")]
    AppendRejected(String),
}

struct ChainState {
    next_sequence: u64,
    last_hash: String,
}

/// Append-only audit log
///
/// Sequence assignment and the chain head live under one mutex; reads
/// go through a separate RwLock so verification and exports do not
/// block appends longer than the copy takes.
pub struct AuditLog {
    chain: Mutex<ChainState>,
    events: RwLock<Vec<AuditEvent>>,
    sealed: std::sync::atomic::AtomicBool,
}

impl AuditLog {
    /// Empty log
    pub fn new() -> Self {
        Self {
            chain: Mutex::new(ChainState {
                next_sequence: 1,
                last_hash: GENESIS.to_string(),
            }),
            events: RwLock::new(Vec::new()),
            sealed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Append an event, returning its assigned sequence.
    ///
    /// Callers must treat an error as fatal for the action being audited.
    pub fn append(
        &self,
        actor: Actor,
        category: AuditCategory,
        payload_ref: impl Into<String>,
    ) -> Result<u64, AuditError> {
        if self.sealed.load(std::sync::atomic::Ordering::Acquire) {
            return Err(AuditError::AppendRejected("log sealed".into()));
        }

        let mut chain = self.chain.lock();
        let mut event = AuditEvent {
            sequence: chain.next_sequence,
            timestamp: Utc::now(),
            actor,
            category,
            payload_ref: payload_ref.into(),
            prev_hash: chain.last_hash.clone(),
            hash: String::new(),
        };
        event.hash = event.compute_hash(&chain.last_hash);

        chain.next_sequence += 1;
        chain.last_hash = event.hash.clone();

        tracing::debug!(sequence = event.sequence, category = ?category, "audit append");
        self.events.write().push(event.clone());
        Ok(event.sequence)
    }

    /// Stop accepting appends (used by tests and shutdown paths)
    pub fn seal(&self) {
        self.sealed.store(true, std::sync::atomic::Ordering::Release);
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True when no events have been appended
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Events in a sequence range, inclusive
    pub fn range(&self, from: u64, to: u64) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.sequence >= from && e.sequence <= to)
            .cloned()
            .collect()
    }

    /// Events of one category
    pub fn by_category(&self, category: AuditCategory) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    /// Latest assigned sequence, 0 when empty
    pub fn last_sequence(&self) -> u64 {
        self.events.read().last().map(|e| e.sequence).unwrap_or(0)
    }

    /// Walk the chain and verify every link and hash
    pub fn verify(&self) -> IntegrityResult {
        let events = self.events.read();
        let mut prev_hash = GENESIS.to_string();
        let mut checked = 0u64;

        for event in events.iter() {
            if event.prev_hash != prev_hash {
                return IntegrityResult {
                    valid: false,
                    checked_count: checked,
                    error: Some(format!("chain broken at sequence {}", event.sequence)),
                };
            }
            if event.compute_hash(&prev_hash) != event.hash {
                return IntegrityResult {
                    valid: false,
                    checked_count: checked,
                    error: Some(format!("hash mismatch at sequence {}", event.sequence)),
                };
            }
            prev_hash = event.hash.clone();
            checked += 1;
        }

        IntegrityResult {
            valid: true,
            checked_count: checked,
            error: None,
        }
    }

    /// Export all events as JSON
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&*self.events.read()).unwrap_or_default()
    }

    /// Test hook: mutate an event in place (tamper simulation)
    #[cfg(test)]
    fn tamper(&self, index: usize, f: impl FnOnce(&mut AuditEvent)) {
        let mut events = self.events.write();
        if let Some(e) = events.get_mut(index) {
            f(e);
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
