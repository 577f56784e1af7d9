//! ---
//! arb_section: "04-provisioning"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Bounded exponential backoff for the signing-key download."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::thread;
use std::time::Duration;

use arb_deploy_common::FetchPolicyConfig;
use arb_deploy_logging::LogContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Policy parameters controlling download attempts and their spacing.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each attempt after that.
    pub base_delay: Duration,
    /// Maximum random delay added on top of the backoff.
    pub jitter: Duration,
    seed: Option<u64>,
}

/// The last error once every attempt has been spent, or a permanent error.
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub attempts: u32,
    pub error: E,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter,
            seed: None,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Fix the jitter sequence, for reproducible delays.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Delay slept after the given (1-indexed) failed attempt.
    pub fn backoff_delay(&self, attempt: u32, rng: &mut StdRng) -> Duration {
        let exponent = attempt.saturating_sub(1).min(8);
        let base = self.base_delay.saturating_mul(2u32.pow(exponent));
        if self.jitter.is_zero() {
            base
        } else {
            let jitter_ms = rng.gen_range(0..=self.jitter.as_millis().max(1)) as u64;
            base + Duration::from_millis(jitter_ms)
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The closure receives the 1-indexed attempt number.
    pub fn retry<T, E, F, P>(&self, mut operation: F, is_transient: P) -> Result<T, RetryFailure<E>>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts && is_transient(&error) => {
                    let delay = self.backoff_delay(attempt, &mut rng);
                    let ctx = LogContext::new()
                        .with_component("provisioner")
                        .with_step("fetch-key")
                        .with_attempt(attempt);
                    arb_deploy_logging::deploy_warn!(
                        context = ctx,
                        "attempt failed: {error}; retrying in {}ms",
                        delay.as_millis()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(error) => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                    })
                }
            }
        }
    }
}

impl From<&FetchPolicyConfig> for RetryPolicy {
    fn from(config: &FetchPolicyConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay, config.jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetchPolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(policy.backoff_delay(1, &mut rng), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2, &mut rng), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(4, &mut rng), Duration::from_millis(800));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(5));
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 1..=3 {
            let delay = policy.backoff_delay(attempt, &mut rng);
            let base = Duration::from_millis(10 * 2u64.pow(attempt - 1));
            assert!(delay >= base && delay <= base + Duration::from_millis(5));
        }
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let policy = RetryPolicy::new(4, Duration::ZERO, Duration::ZERO);
        let result = policy.retry(
            |attempt| if attempt < 3 { Err("timeout") } else { Ok(attempt) },
            |_| true,
        );
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO);
        let mut calls = 0;
        let failure = policy
            .retry(
                |_| {
                    calls += 1;
                    Err::<(), _>("connection reset")
                },
                |_| true,
            )
            .unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert_eq!(calls, 2);
    }

    #[test]
    fn permanent_errors_stop_immediately() {
        let policy = RetryPolicy::new(5, Duration::ZERO, Duration::ZERO);
        let failure = policy
            .retry(|_| Err::<(), _>("404"), |_| false)
            .unwrap_err();
        assert_eq!(failure.attempts, 1);
    }

    #[test]
    fn zero_attempts_are_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }
}
