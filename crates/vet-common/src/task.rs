//! Cooperative cancellation and deadlines
//!
//! Every suspension point checks the signal on resume. Child signals share
//! the parent's cancel flag but may carry a tighter deadline.

use crate::{VetError, VetResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag plus an absolute deadline
#[derive(Debug, Clone)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// Signal with no deadline
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Signal that expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Child sharing the cancel flag with a deadline no later than
    /// both the parent's and `timeout` from now
    pub fn child(&self, timeout: Duration) -> Self {
        let child_deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => Some(parent.min(child_deadline)),
            None => Some(child_deadline),
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline,
        }
    }

    /// Request cancellation; propagates to all children
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Check on suspension resume: errors if cancelled or past deadline
    pub fn checkpoint(&self) -> VetResult<()> {
        if self.is_cancelled() {
            return Err(VetError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(VetError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Remaining time until the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
