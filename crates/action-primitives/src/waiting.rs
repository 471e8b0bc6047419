//! The single wait/poll primitive.
//!
//! Every "wait, then check" loop in the workspace runs through a [`PollSession`]. Timing uses
//! the tokio clock, so paused-clock tests see exactly the waits a live run would.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::config::PollPolicy;

/// Hands out poll sessions under one policy.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    policy: PollPolicy,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn session(&self, timeout: Duration) -> PollSession {
        PollSession::new(self.policy.clone(), timeout)
    }

    /// Re-checks `predicate` until it holds or `timeout` passes. Never errors.
    pub async fn poll_until<F, Fut>(&self, timeout: Duration, mut predicate: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut session = self.session(timeout);
        while session.next_attempt().await {
            if predicate().await {
                trace!(
                    attempts = session.attempts(),
                    elapsed_ms = session.elapsed().as_millis() as u64,
                    "poll satisfied"
                );
                return true;
            }
        }
        false
    }

    /// Like [`Poller::poll_until`] but yields the first `Some` the probe returns.
    pub async fn poll_for<T, F, Fut>(&self, timeout: Duration, mut probe: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut session = self.session(timeout);
        while session.next_attempt().await {
            if let Some(value) = probe().await {
                return Some(value);
            }
        }
        None
    }
}

/// One bounded polling run.
///
/// The first [`next_attempt`](PollSession::next_attempt) returns at once. Later calls sleep
/// for the current interval (never past the deadline) and return `true`; the last attempt
/// lands on the deadline itself, after which `false` is returned.
#[derive(Debug)]
pub struct PollSession {
    policy: PollPolicy,
    started: Instant,
    deadline: Instant,
    interval: Duration,
    attempts: u32,
}

impl PollSession {
    pub fn new(policy: PollPolicy, timeout: Duration) -> Self {
        let started = Instant::now();
        let interval = policy.interval();
        Self {
            policy,
            started,
            deadline: started + timeout,
            interval,
            attempts: 0,
        }
    }

    pub async fn next_attempt(&mut self) -> bool {
        if self.attempts == 0 {
            self.attempts = 1;
            return true;
        }
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let wait = self.interval.min(self.deadline - now);
        sleep(wait).await;
        self.attempts += 1;
        self.interval = self.policy.next_interval(self.interval);
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// `pollUntil(predicate, timeout, interval)` with a fixed interval.
pub async fn poll_until<F, Fut>(predicate: F, timeout_ms: u64, interval_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    Poller::new(PollPolicy::fixed(interval_ms.max(1)))
        .poll_until(Duration::from_millis(timeout_ms), predicate)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_attempt_is_immediate_and_last_lands_on_deadline() {
        let mut session = Poller::new(PollPolicy::fixed(300)).session(Duration::from_millis(1000));
        let start = Instant::now();
        let mut stamps = Vec::new();
        while session.next_attempt().await {
            stamps.push(start.elapsed().as_millis() as u64);
        }
        let expected = [0u64, 300, 600, 900, 1000];
        assert_eq!(stamps.len(), expected.len());
        for (got, want) in stamps.iter().zip(expected) {
            assert!(got.abs_diff(want) <= 1, "attempt at {}ms, wanted {}ms", got, want);
        }
        assert_eq!(session.attempts(), 5);
        assert!(session.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_checks_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let ok = poll_until(
            move || {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    false
                }
            },
            0,
            250,
        )
        .await;
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_true_soon_after_predicate_flips() {
        let start = Instant::now();
        let flip_at = start + Duration::from_millis(1000);
        let ok = poll_until(move || async move { Instant::now() >= flip_at }, 3000, 300).await;
        assert!(ok);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1500), "waited {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_budget() {
        let start = Instant::now();
        let ok = poll_until(|| async { false }, 800, 250).await;
        assert!(!ok);
        let elapsed = start.elapsed().as_millis() as u64;
        assert!(elapsed.abs_diff(800) <= 1, "waited {}ms", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_for_returns_first_value() {
        let counter = Arc::new(AtomicU32::new(0));
        let poller = Poller::new(PollPolicy::fixed(100));
        let found = poller
            .poll_for(Duration::from_secs(2), || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    (n >= 3).then_some(n)
                }
            })
            .await;
        assert_eq!(found, Some(3));
    }
}
