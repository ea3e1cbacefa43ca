//! Retry configuration, delay calculation, and the retry executor.
//!
//! [`call_with_retry`] runs one provider attempt at a time under a fixed
//! per-attempt timeout, backs off exponentially with bounded jitter between
//! transient failures, and stops at once on anything that is not transient.
//! It reports how many attempts it made so the gateway can put that number
//! in the call outcome record.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use super::traits::{ProviderRequest, TextProvider};
use crate::telemetry;
use crate::{GatewayError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// The delay before attempt `k + 1` (0-indexed `k`) is
/// `initial_delay * 2^k`, capped at `max_delay`, plus a uniform random
/// jitter in `[0, jitter]`.
///
/// ```rust
/// # use quill::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Maximum backoff between retries, before jitter. Default: 30s.
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to each delay. Default: 100ms.
    pub jitter: Duration,
    /// Time limit for a single attempt. Default: 30s.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(100),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter bound. `Duration::ZERO` disables jitter.
    pub fn jitter(mut self, bound: Duration) -> Self {
        self.jitter = bound;
        self
    }

    /// Set the per-attempt timeout.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`.
    /// Does NOT include jitter; see [`jittered_delay()`](Self::jittered_delay)
    /// for the full calculation.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Backoff plus jitter, respecting provider `retry_after` hints.
    ///
    /// A `retry_after` hint (from a `RateLimited` error) raises the backoff
    /// floor but never beyond `max_delay`.
    pub fn jittered_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let mut base = self.delay_for_attempt(attempt);
        if let Some(hint) = retry_after {
            base = base.max(hint.min(self.max_delay));
        }
        base + self.sample_jitter()
    }

    fn sample_jitter(&self) -> Duration {
        let bound = self.jitter.as_nanos().min(u64::MAX as u128) as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rand::thread_rng().gen_range(0..=bound))
    }
}

/// Result of a retried call plus the number of attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

/// Execute an async operation with retry logic.
///
/// Each attempt is bounded by `config.attempt_timeout`; an attempt that
/// overruns is dropped (not awaited further) and counts as a transient
/// [`GatewayError::Timeout`]. Transient errors (as classified by
/// [`GatewayError::is_transient()`]) are retried up to
/// `config.max_attempts`; everything else is returned immediately. After
/// exhaustion the last error is returned unchanged, classification included.
pub async fn call_with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    mut f: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 0..max_attempts {
        let result = match tokio::time::timeout(config.attempt_timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(config.attempt_timeout)),
        };
        match result {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt + 1,
                };
            }
            Err(e) if e.is_transient() => {
                if attempt + 1 < max_attempts {
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "provider" => provider_name.to_owned(),
                        "operation" => operation.to_owned(),
                    )
                    .increment(1);
                    let delay = config.jittered_delay(attempt, e.retry_after());
                    warn!(
                        provider = provider_name,
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => {
                // permanent error, no retry
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt + 1,
                };
            }
        }
    }
    RetryOutcome {
        result: Err(last_err.unwrap_or_else(|| {
            GatewayError::Internal("retry loop finished without an attempt".to_string())
        })),
        attempts: max_attempts,
    }
}

// =============================================================================
// Retrying wrapper
// =============================================================================

/// Wraps a [`TextProvider`] so every `attempt` runs the full retry policy.
///
/// The gateway applies the retry executor itself; this wrapper is for
/// embedders that drive a provider directly.
pub struct RetryingProvider {
    inner: Arc<dyn TextProvider>,
    config: RetryConfig,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn TextProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl TextProvider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn attempt(&self, request: &ProviderRequest) -> Result<String> {
        call_with_retry(
            &self.config,
            self.inner.name(),
            request.operation.as_str(),
            || self.inner.attempt(request),
        )
        .await
        .into_result()
    }
}
