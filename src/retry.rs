use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

const MAX_DELAY_MS: u64 = 10_000;

/// Exponential backoff with +/-25% jitter for transient service failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let delay_ms = base_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(MAX_DELAY_MS);
        let jitter_range = delay_ms / 4;
        if jitter_range == 0 {
            return Duration::from_millis(delay_ms);
        }
        let jitter = fastrand::u64(0..=jitter_range * 2);
        Duration::from_millis(delay_ms.saturating_sub(jitter_range).saturating_add(jitter))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or runs out of retries.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    context: &str,
    mut operation: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && is_retryable(&err) => {
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "Attempt {}/{} for {} failed: {}. Retrying in {}ms.",
                    attempt + 1,
                    policy.max_retries + 1,
                    context,
                    err,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_and_stays_within_jitter() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(400),
        };
        for (attempt, nominal) in [(0, 400u64), (1, 800), (2, 1600)] {
            let delay = policy.delay_for(attempt).as_millis() as u64;
            assert!(delay >= nominal - nominal / 4, "attempt {}: {}", attempt, delay);
            assert!(delay <= nominal + nominal / 4, "attempt {}: {}", attempt, delay);
        }
        assert!(policy.delay_for(20).as_millis() as u64 <= MAX_DELAY_MS + MAX_DELAY_MS / 4);
    }

    #[tokio::test]
    async fn retries_only_retryable_errors() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        };
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = retry_with_backoff(
            &policy,
            "flaky",
            move || async move {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                if call < 2 {
                    Err("unavailable".to_string())
                } else {
                    Ok(call)
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = retry_with_backoff(
            &policy,
            "fatal",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("bad request".to_string())
            },
            |err: &String| err != "bad request",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = retry_with_backoff(
            &RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            },
            "down",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            |_| true,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
