//! Bounded poll loop with exponential backoff and jitter

use crate::config::WaiterConfig;
use crate::error::{ConvergenceTimeout, WaitError};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Classifier verdict for one observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<T, E> {
    Retry,
    Success(T),
    Fail(E),
}

/// Polls a resource until a classifier accepts or rejects what it sees
#[derive(Debug, Clone, Default)]
pub struct ConvergenceWaiter {
    config: WaiterConfig,
}

impl ConvergenceWaiter {
    pub fn new(config: WaiterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WaiterConfig {
        &self.config
    }

    /// Poll `describe` until `classify` returns `Success` or `Fail`, or the
    /// deadline passes.
    ///
    /// The first poll is immediate. Sleeps are clamped to the time left, so
    /// the last poll happens at the deadline and a timeout is reported exactly
    /// when it passes.
    pub async fn wait<S, T, E, D, Fut, C>(
        &self,
        resource: &str,
        mut describe: D,
        mut classify: C,
    ) -> Result<T, WaitError<E>>
    where
        S: fmt::Debug,
        D: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        C: FnMut(S) -> Classification<T, E>,
    {
        let started = Instant::now();
        let deadline = started + self.config.deadline;
        let mut delay = self.config.initial_delay;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let observed = describe().await.map_err(WaitError::Describe)?;
            let last_observed = format!("{observed:?}");

            match classify(observed) {
                Classification::Success(value) => {
                    debug!(
                        resource = %resource,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Resource converged"
                    );
                    return Ok(value);
                }
                Classification::Fail(err) => {
                    debug!(resource = %resource, attempts, state = %last_observed, "Resource reached a failed state");
                    return Err(WaitError::Failed(err));
                }
                Classification::Retry => {}
            }

            let now = Instant::now();
            if now >= deadline {
                let timeout = ConvergenceTimeout {
                    resource: resource.to_string(),
                    waited: now - started,
                    attempts,
                    last_observed,
                };
                warn!(
                    resource = %resource,
                    attempts,
                    waited_ms = timeout.waited.as_millis() as u64,
                    state = %timeout.last_observed,
                    "Resource did not converge before deadline"
                );
                return Err(WaitError::Timeout(timeout));
            }

            let sleep_for = self.jittered(delay).min(deadline - now);
            debug!(
                resource = %resource,
                attempt = attempts,
                state = %last_observed,
                delay_ms = sleep_for.as_millis() as u64,
                "Resource not converged, polling again"
            );
            tokio::time::sleep(sleep_for).await;

            delay = self.next_delay(delay);
        }
    }

    /// Grow `delay` by the multiplier, capped at `max_delay`. A multiplier
    /// below 1 or not finite keeps the delay constant.
    fn next_delay(&self, delay: Duration) -> Duration {
        let max = self.config.max_delay;
        let multiplier = self.config.multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return delay.min(max);
        }
        Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier).map_or(max, |next| next.min(max))
    }

    fn jittered(&self, base: Duration) -> Duration {
        if !self.config.jitter {
            return base;
        }
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64(base.as_secs_f64() * factor).min(self.config.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum State {
        Creating,
        Enabled,
        Deleted,
    }

    fn classify_enabled(state: State) -> Classification<State, String> {
        match state {
            State::Creating => Classification::Retry,
            State::Enabled => Classification::Success(state),
            other => Classification::Fail(format!("unexpected {other:?}")),
        }
    }

    fn scripted(states: Vec<State>, calls: Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<Result<State, String>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) as usize;
            let state = states[n.min(states.len() - 1)];
            std::future::ready(Ok(state))
        }
    }

    fn config(deadline_secs: u64) -> WaiterConfig {
        WaiterConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            deadline: Duration::from_secs(deadline_secs),
            jitter: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_poll() {
        let calls = Arc::new(AtomicU32::new(0));
        let waiter = ConvergenceWaiter::new(config(60));

        let result = waiter
            .wait(
                "mapping",
                scripted(vec![State::Creating, State::Creating, State::Enabled], calls.clone()),
                classify_enabled,
            )
            .await;

        assert_eq!(result.unwrap(), State::Enabled);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_exactly_at_deadline() {
        let calls = Arc::new(AtomicU32::new(0));
        let waiter = ConvergenceWaiter::new(config(10));
        let started = Instant::now();

        let result = waiter
            .wait("mapping", scripted(vec![State::Creating], calls.clone()), classify_enabled)
            .await;

        let timeout = match result {
            Err(WaitError::Timeout(timeout)) => timeout,
            other => panic!("expected timeout, got {other:?}"),
        };
        // Polls at 0s, 1s, 3s, 7s and a final clamped poll at 10s
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(timeout.attempts, 5);
        assert_eq!(timeout.waited, Duration::from_secs(10));
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(timeout.last_observed, "Creating");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_stops_polling() {
        let calls = Arc::new(AtomicU32::new(0));
        let waiter = ConvergenceWaiter::new(config(60));

        let result = waiter
            .wait(
                "mapping",
                scripted(vec![State::Creating, State::Deleted, State::Enabled], calls.clone()),
                classify_enabled,
            )
            .await;

        assert!(matches!(result, Err(WaitError::Failed(ref msg)) if msg.contains("Deleted")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_describe_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let waiter = ConvergenceWaiter::new(config(60));

        let result: Result<State, WaitError<String>> = waiter
            .wait(
                "role",
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(Err::<State, _>("access denied".to_string()))
                },
                classify_enabled,
            )
            .await;

        assert!(matches!(result, Err(WaitError::Describe(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_waits_run_concurrently() {
        let waiter = ConvergenceWaiter::new(config(60));
        let slow = Arc::new(AtomicU32::new(0));
        let fast = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let (a, b) = futures::join!(
            waiter.wait(
                "slow",
                scripted(vec![State::Creating, State::Creating, State::Creating, State::Enabled], slow.clone()),
                classify_enabled,
            ),
            waiter.wait("fast", scripted(vec![State::Enabled], fast.clone()), classify_enabled),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(fast.load(Ordering::SeqCst), 1);
        // 1s + 2s + 4s of backoff for the slow resource only
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_multiplier_keeps_a_constant_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let config: WaiterConfig =
            serde_json::from_str(r#"{"initial_delay": 1000, "multiplier": -1.0, "deadline": 5000, "jitter": false}"#)
                .unwrap();
        let waiter = ConvergenceWaiter::new(config);

        let result = waiter
            .wait("mapping", scripted(vec![State::Creating], calls.clone()), classify_enabled)
            .await;

        assert!(matches!(result, Err(WaitError::Timeout(_))));
        // Polls every second from 0s through 5s
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_next_delay_is_capped() {
        let waiter = ConvergenceWaiter::new(WaiterConfig {
            multiplier: f64::INFINITY,
            ..config(60)
        });
        assert_eq!(waiter.next_delay(Duration::from_secs(1)), Duration::from_secs(1));

        let waiter = ConvergenceWaiter::new(WaiterConfig {
            multiplier: 1e300,
            ..config(60)
        });
        assert_eq!(waiter.next_delay(Duration::from_secs(1)), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let waiter = ConvergenceWaiter::new(WaiterConfig {
            max_delay: Duration::from_secs(3),
            jitter: true,
            ..config(60)
        });

        for _ in 0..200 {
            let d = waiter.jittered(Duration::from_secs(2));
            assert!(d >= Duration::from_secs(1));
            assert!(d <= Duration::from_secs(3));
        }
    }
}
