use crate::config::RetryConfig;
use cf_core::CoreError;
use cf_core::RandomSource;
use std::future::Future;
use std::time::Duration;

fn backoff_delay_ms(config: &RetryConfig, attempt: u32, rng: &dyn RandomSource) -> u64 {
    let exponent = attempt.saturating_sub(1) as i32;
    let raw = config.base_delay_ms as f64 * config.factor.powi(exponent);
    let capped = raw.min(config.max_delay_ms as f64);
    if !config.jitter {
        return capped as u64;
    }
    let jitter_factor = 1.0 + (rng.next_f32() as f64 * 2.0 - 1.0) * 0.5;
    (capped * jitter_factor).max(0.0) as u64
}

/// Exponential backoff retry around `f`. `should_retry`
/// decides whether an error is worth another attempt; breaker rejections
/// are non-retryable by default because [`CoreError::CircuitOpen`] is not
/// in [`CoreError::retryable_by_default`]. Retrying does not reset any
/// breaker state — each attempt is an independent call through `f`.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    rng: &dyn RandomSource,
    should_retry: impl Fn(&CoreError) -> bool,
    mut f: F,
) -> Result<T, CoreError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                let delay = backoff_delay_ms(config, attempt, rng);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::SeededRandom;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    #[test]
    fn backoff_grows_exponentially_without_jitter() {
        let config = RetryConfig { jitter: false, base_delay_ms: 100, factor: 2.0, max_delay_ms: 10_000, max_attempts: 5 };
        let rng = SeededRandom::new(1);
        assert_eq!(backoff_delay_ms(&config, 1, &rng), 100);
        assert_eq!(backoff_delay_ms(&config, 2, &rng), 200);
        assert_eq!(backoff_delay_ms(&config, 3, &rng), 400);
    }

    #[test]
    fn backoff_is_capped_at_max_delay() {
        let config = RetryConfig { jitter: false, base_delay_ms: 1000, factor: 10.0, max_delay_ms: 5_000, max_attempts: 5 };
        let rng = SeededRandom::new(1);
        assert_eq!(backoff_delay_ms(&config, 5, &rng), 5_000);
    }

    #[test]
    fn jitter_stays_within_plus_minus_fifty_percent() {
        let config = RetryConfig { jitter: true, base_delay_ms: 1000, factor: 1.0, max_delay_ms: 10_000, max_attempts: 5 };
        let rng = SeededRandom::new(7);
        for _ in 0..50 {
            let delay = backoff_delay_ms(&config, 1, &rng);
            assert!((500..=1500).contains(&delay), "delay {delay} outside +-50%");
        }
    }

    #[tokio::test]
    async fn stops_retrying_once_should_retry_returns_false() {
        let config = RetryConfig { jitter: false, base_delay_ms: 1, factor: 1.0, max_delay_ms: 10, max_attempts: 10 };
        let rng = SeededRandom::new(1);
        let calls = AtomicU32::new(0);
        let result: Result<(), CoreError> = retry_with_backoff(&config, &rng, |_| false, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CoreError::TransientCompute("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_max_attempts_then_gives_up() {
        let config = RetryConfig { jitter: false, base_delay_ms: 1, factor: 1.0, max_delay_ms: 10, max_attempts: 3 };
        let rng = SeededRandom::new(1);
        let calls = AtomicU32::new(0);
        let result: Result<(), CoreError> =
            retry_with_backoff(&config, &rng, |e| e.retryable_by_default(), |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CoreError::TransientCompute("nope".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let config = RetryConfig { jitter: false, base_delay_ms: 1, factor: 1.0, max_delay_ms: 10, max_attempts: 5 };
        let rng = SeededRandom::new(1);
        let result = retry_with_backoff(&config, &rng, |e| e.retryable_by_default(), |attempt| async move {
            if attempt < 3 {
                Err(CoreError::TransientCompute("nope".into()))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }
}
