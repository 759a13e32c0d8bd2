//! Retry policy, delay calculation, and the shared retry loop.
//!
//! Every gateway call goes through [`with_retry()`], so attempt counting,
//! backoff, error classification and cancellation live in one place.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::telemetry;
use crate::{KotobaError, Result};

/// Default number of attempts per invocation (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default linear backoff step.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(5);

/// How long to wait after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `step × n` after the n-th failure (5s, 10s, 15s, ...).
    Linear { step: Duration },
    /// `initial × 2^(n-1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
    /// Same delay after every failure.
    Fixed(Duration),
    /// Retry immediately.
    None,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Linear {
            step: DEFAULT_BACKOFF_STEP,
        }
    }
}

/// Reusable retry policy shared by all gateway calls.
///
/// ```rust
/// # use kotoba::providers::retry::{Backoff, RetryPolicy};
/// # use std::time::Duration;
/// let policy = RetryPolicy::new()
///     .max_attempts(4)
///     .backoff(Backoff::Linear { step: Duration::from_secs(2) });
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(6));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Delay schedule between attempts. Default: linear, 5s step.
    pub backoff: Backoff,
    /// Which errors are worth another attempt.
    /// Default: [`KotobaError::is_transient`].
    pub retryable: fn(&KotobaError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            retryable: KotobaError::is_transient,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy with the default linear schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request). Values below 1
    /// are treated as 1.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Set the backoff schedule.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the retryable-error classifier.
    pub fn retry_if(mut self, retryable: fn(&KotobaError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Whether `err` should consume another attempt.
    pub fn is_retryable(&self, err: &KotobaError) -> bool {
        (self.retryable)(err)
    }

    /// Calculate the delay after a given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear { step } => step.saturating_mul(attempt.saturating_add(1)),
            Backoff::Exponential { initial, max } => initial
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(max),
            Backoff::Fixed(delay) => delay,
            Backoff::None => Duration::ZERO,
        }
    }

    /// Calculate the effective delay, respecting provider `retry_after` hints.
    ///
    /// A hint only ever lengthens the wait, so the schedule stays monotonic.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let computed = self.delay_for_attempt(attempt);
        retry_after.map_or(computed, |hint| hint.max(computed))
    }
}

/// Execute an async operation under a retry policy.
///
/// - `Ok` is returned as soon as an attempt succeeds.
/// - Retryable errors sleep for [`RetryPolicy::effective_delay`] and try
///   again, up to `max_attempts` attempts in total. There is no sleep after
///   the final attempt; exhaustion returns
///   [`KotobaError::TransientExhausted`].
/// - Any other error returns [`KotobaError::PermanentRejected`] at once.
/// - Gateway outcomes ([`KotobaError::is_gateway_outcome`]) returned by the
///   operation itself are passed through untouched.
/// - If `cancel` fires during an attempt or a backoff sleep the loop stops
///   with [`KotobaError::Cancelled`].
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    provider_name: &str,
    operation: &str,
    cancel: Option<&CancellationToken>,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        debug!(
            provider = provider_name,
            operation,
            attempt = attempt + 1,
            max_attempts,
            "sending request"
        );
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => return Err(KotobaError::Cancelled),
                outcome = f() => outcome,
            },
            None => f().await,
        };

        let err = match outcome {
            Ok(result) => return Ok(result),
            Err(e) if e.is_gateway_outcome() => return Err(e),
            Err(e) if policy.is_retryable(&e) => e,
            Err(e) => return Err(KotobaError::rejected(e)), // permanent error, no retry
        };

        attempt += 1;
        if attempt >= max_attempts {
            warn!(
                provider = provider_name,
                operation,
                attempts = attempt,
                error = %err,
                "retry budget exhausted"
            );
            return Err(KotobaError::TransientExhausted {
                attempts: attempt,
                last_error: Box::new(err),
            });
        }

        metrics::counter!(telemetry::RETRIES_TOTAL,
            "provider" => provider_name.to_owned(),
            "operation" => operation.to_owned(),
        )
        .increment(1);

        let delay = policy.effective_delay(attempt - 1, err.retry_after());
        warn!(
            provider = provider_name,
            operation,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after transient error"
        );
        backoff_sleep(delay, cancel).await?;
    }
}

async fn backoff_sleep(delay: Duration, cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => Err(KotobaError::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}
