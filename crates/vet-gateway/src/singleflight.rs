//! Single-flight request coalescing
//!
//! At most one provider execution runs per fingerprint per window.
//! Concurrent identical demands either follow the in-flight leader or
//! take the recently published result.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Clonable failure shared with followers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlightFailure {
    /// Every candidate failed or was unavailable
    NoSourceAvailable,
    /// The leader was cancelled before completing
    Cancelled,
}

/// Role assigned to a caller for one key
pub enum FlightRole<T> {
    /// Caller must execute and publish the outcome
    Leader,
    /// Caller awaits the leader's broadcast
    Follower(broadcast::Receiver<Result<T, FlightFailure>>),
    /// A result was already published inside the window
    Done(Result<T, FlightFailure>),
}

/// Coalesces concurrent identical requests to one execution
pub struct SingleFlight<T: Clone> {
    inflight: DashMap<String, broadcast::Sender<Result<T, FlightFailure>>>,
    recent: DashMap<String, (Instant, Result<T, FlightFailure>)>,
    window: Duration,
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    /// Coalescer with the at-most-once window
    pub fn new(window: Duration) -> Self {
        Self {
            inflight: DashMap::new(),
            recent: DashMap::new(),
            window,
        }
    }

    /// Join or start a flight for the key
    pub fn begin(&self, key: &str) -> FlightRole<T> {
        if let Some(entry) = self.recent.get(key) {
            let (published, outcome) = entry.value();
            if published.elapsed() < self.window {
                return FlightRole::Done(outcome.clone());
            }
        }

        match self.inflight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => FlightRole::Follower(e.get().subscribe()),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                let (tx, _rx) = broadcast::channel(1);
                v.insert(tx);
                FlightRole::Leader
            }
        }
    }

    /// Publish the leader's outcome: recorded for the window, broadcast
    /// to followers, and the flight is closed.
    pub fn complete(&self, key: &str, outcome: Result<T, FlightFailure>) {
        self.recent
            .insert(key.to_string(), (Instant::now(), outcome.clone()));
        if let Some((_, tx)) = self.inflight.remove(key) {
            let _ = tx.send(outcome);
        }
    }

    /// Await a follower receiver, falling back to the published record
    /// if the broadcast was missed.
    pub async fn follow(
        &self,
        key: &str,
        mut rx: broadcast::Receiver<Result<T, FlightFailure>>,
    ) -> Option<Result<T, FlightFailure>> {
        match rx.recv().await {
            Ok(outcome) => Some(outcome),
            Err(_) => self.recent.get(key).map(|e| e.value().1.clone()),
        }
    }

    /// Drop expired published results
    pub fn sweep(&self) {
        let window = self.window;
        self.recent.retain(|_, (published, _)| published.elapsed() < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_followers_share_leader_result() {
        let sf: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new(Duration::from_secs(60)));
        let executions = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sf = Arc::clone(&sf);
            let executions = Arc::clone(&executions);
            handles.push(tokio::spawn(async move {
                match sf.begin("fp") {
                    FlightRole::Leader => {
                        executions.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        sf.complete("fp", Ok(42));
                        42
                    }
                    FlightRole::Follower(rx) => sf.follow("fp", rx).await.unwrap().unwrap(),
                    FlightRole::Done(outcome) => outcome.unwrap(),
                }
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap(), 42);
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_published_result_serves_within_window() {
        let sf: SingleFlight<u32> = SingleFlight::new(Duration::from_secs(60));
        assert!(matches!(sf.begin("k"), FlightRole::Leader));
        sf.complete("k", Ok(7));
        match sf.begin("k") {
            FlightRole::Done(Ok(7)) => {}
            _ => panic!("expected published result"),
        }
    }

    #[tokio::test]
    async fn test_window_expiry_allows_new_leader() {
        let sf: SingleFlight<u32> = SingleFlight::new(Duration::from_millis(1));
        assert!(matches!(sf.begin("k"), FlightRole::Leader));
        sf.complete("k", Ok(7));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(sf.begin("k"), FlightRole::Leader));
    }

    #[tokio::test]
    async fn test_failure_is_shared() {
        let sf: SingleFlight<u32> = SingleFlight::new(Duration::from_secs(60));
        assert!(matches!(sf.begin("k"), FlightRole::Leader));
        sf.complete("k", Err(FlightFailure::NoSourceAvailable));
        match sf.begin("k") {
            FlightRole::Done(Err(FlightFailure::NoSourceAvailable)) => {}
            _ => panic!("expected shared failure"),
        }
    }
}
