//! Bounded "try, wait, try again" loop shared by every retrying stage.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    /// Pause between attempts. Not applied after the last one.
    pub delay: Duration,
    /// Stop early once this much time has passed since the first attempt.
    pub budget: Option<Duration>,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// What a single attempt produced.
#[derive(Debug)]
pub enum Probe<T> {
    Ready(T),
    /// Not satisfied yet. The value, if any, is kept as the last observation.
    Pending(Option<T>),
}

#[derive(Debug, PartialEq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { last: Option<T>, attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Ready { attempts, .. } | PollOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The ready value, or else the last pending observation.
    pub fn into_value(self) -> Option<T> {
        match self {
            PollOutcome::Ready { value, .. } => Some(value),
            PollOutcome::Exhausted { last, .. } => last,
        }
    }
}

/// Run `probe` until it reports ready, the attempts run out, or the budget is spent.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut probe: F) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Probe<T>>,
{
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut last = None;

    for attempt in 1..=max_attempts {
        match probe(attempt).await {
            Probe::Ready(value) => {
                return PollOutcome::Ready {
                    value,
                    attempts: attempt,
                };
            }
            Probe::Pending(observed) => {
                if observed.is_some() {
                    last = observed;
                }
            }
        }

        if attempt == max_attempts {
            break;
        }
        if let Some(budget) = policy.budget
            && started.elapsed() + policy.delay > budget
        {
            debug!("Poll budget of {:?} spent after {} attempt(s)", budget, attempt);
            return PollOutcome::Exhausted {
                last,
                attempts: attempt,
            };
        }

        debug!("Attempt {}/{} not ready, retrying in {:?}", attempt, max_attempts, policy.delay);
        tokio::time::sleep(policy.delay).await;
    }

    PollOutcome::Exhausted {
        last,
        attempts: max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_ready_on_first_attempt() {
        let outcome = poll_until(PollPolicy::new(3, Duration::from_millis(10)), |_| async {
            Probe::Ready(42)
        })
        .await;
        assert_eq!(outcome, PollOutcome::Ready { value: 42, attempts: 1 });
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let outcome = poll_until(PollPolicy::new(5, Duration::ZERO), |attempt| async move {
            if attempt == 3 {
                Probe::Ready(attempt)
            } else {
                Probe::Pending(None)
            }
        })
        .await;
        assert!(outcome.is_ready());
        assert_eq!(outcome.attempts(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_keeps_last_observation() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let outcome = poll_until(PollPolicy::new(3, Duration::ZERO), move |attempt| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Probe::Pending(Some(attempt * 10))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome, PollOutcome::Exhausted { last: Some(30), attempts: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_final_attempt() {
        let started = tokio::time::Instant::now();
        let outcome: PollOutcome<()> =
            poll_until(PollPolicy::new(3, Duration::from_secs(2)), |_| async {
                Probe::Pending(None)
            })
            .await;

        assert_eq!(outcome.attempts(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_budget_stops_early() {
        let policy = PollPolicy::new(10, Duration::from_millis(50)).with_budget(Duration::from_millis(20));
        let outcome: PollOutcome<u32> = poll_until(policy, |_| async { Probe::Pending(None) }).await;
        assert_eq!(outcome.attempts(), 1);
        assert!(!outcome.is_ready());
        assert_eq!(outcome.into_value(), None);
    }

    #[test]
    fn test_policy_never_allows_zero_attempts() {
        assert_eq!(PollPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
