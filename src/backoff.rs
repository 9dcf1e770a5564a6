//! Exponential backoff with jitter.
//!
//! Used in three places: pacing between batch items after consecutive
//! failures, retrying the discovery feed, and the optional retry decorator
//! around the chat summarization backend.
//!
//! The delay for attempt `n` (zero-based) is:
//! ```text
//! delay = min(base_delay * 2^n, max_delay) + random_jitter(0..=jitter)
//! ```

use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Backoff {
    pub fn new(base_delay: Duration, max_delay: Duration, jitter: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter,
        }
    }

    /// Delay before attempt `attempt`, without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before attempt `attempt`, with random jitter added.
    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=jitter_ms)
        };
        self.delay_for(attempt) + Duration::from_millis(extra)
    }
}

/// Run `op` until it succeeds or `max_retries` extra attempts are used up.
pub async fn retry_with_backoff<T, E, F, Fut>(
    label: &str,
    max_retries: usize,
    backoff: Backoff,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        let attempt_t0 = Instant::now();
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                let attempt_dt = attempt_t0.elapsed();
                let total_dt = total_t0.elapsed();

                if attempt > max_retries {
                    if max_retries > 0 {
                        error!(
                            label,
                            attempt,
                            max = max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "exhausted retries"
                        );
                    }
                    return Err(e);
                }

                let delay = backoff.jittered_delay_for((attempt - 1) as u32);
                warn!(
                    label,
                    attempt,
                    max = max_retries,
                    elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                    ?delay,
                    error = %e,
                    "attempt failed; backing off"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn quick() -> Backoff {
        Backoff::new(Duration::from_millis(1), Duration::from_millis(4), Duration::ZERO)
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let b = Backoff::new(Duration::from_secs(1), Duration::from_secs(30), Duration::ZERO);
        assert_eq!(b.delay_for(0), Duration::from_secs(1));
        assert_eq!(b.delay_for(1), Duration::from_secs(2));
        assert_eq!(b.delay_for(3), Duration::from_secs(8));
        assert_eq!(b.delay_for(5), Duration::from_secs(30));
        assert_eq!(b.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let b = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), Duration::from_millis(50));
        for _ in 0..50 {
            let d = b.jittered_delay_for(0);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let calls = Cell::new(0);
        let result: Result<u32, String> = retry_with_backoff("test", 3, quick(), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { if n < 3 { Err(format!("fail {n}")) } else { Ok(n) } }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_calls_once() {
        let calls = Cell::new(0);
        let result: Result<(), String> = retry_with_backoff("test", 0, quick(), || {
            calls.set(calls.get() + 1);
            async { Err("nope".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
