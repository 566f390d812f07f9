//! Per-source resilience wrapper: admission control, circuit breaking,
//! per-attempt timeouts, and bounded retries.
//!
//! One `SourcePolicy` is constructed per configured source at startup
//! and shared by every concurrent request; the limiter and breaker it
//! owns are the process-wide resilience state for that source.
//!
//! A rate-limiter rejection is a skip, not a fault: it is never recorded
//! into the breaker and never retried. Each *logical call* records
//! exactly one breaker outcome — its final one — so retries cannot
//! inflate the failure window. The breaker permit rides the call
//! future: if the future is dropped mid-flight (deadline abort, client
//! disconnect), the permit returns its probe slot without recording an
//! outcome.

use std::sync::Arc;

use tokio::time::{timeout_at, Instant};
use tracing::Instrument;

use crate::breaker::CircuitBreaker;
use crate::config::PolicyConfig;
use crate::error::{GatewayError, Result};
use crate::metrics::SourceMetrics;
use crate::rate_limit::TokenBucket;
use crate::source::Source;
use crate::types::SourceResult;

/// Wraps one upstream source with the full resilience stack.
pub struct SourcePolicy {
    name: String,
    source: Arc<dyn Source>,
    limiter: TokenBucket,
    breaker: CircuitBreaker,
    config: PolicyConfig,
    metrics: SourceMetrics,
}

impl SourcePolicy {
    /// Build the policy for one source. The limiter starts full and the
    /// breaker starts closed.
    pub fn new(source: Arc<dyn Source>, config: PolicyConfig) -> Self {
        Self {
            name: source.name().to_owned(),
            limiter: TokenBucket::new(config.rate_limit.clone()),
            breaker: CircuitBreaker::new(config.breaker.clone()),
            source,
            config,
            metrics: SourceMetrics::default(),
        }
    }

    /// Name of the wrapped source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The breaker guarding this source, for metrics snapshots.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The admission-control bucket, for metrics snapshots.
    pub fn limiter(&self) -> &TokenBucket {
        &self.limiter
    }

    /// Per-source call counters.
    pub fn metrics(&self) -> &SourceMetrics {
        &self.metrics
    }

    /// Execute one logical call against the wrapped source.
    ///
    /// Order of checks: rate limiter (skip on rejection), breaker
    /// (fast-fail while open), then up to `1 + retry_max` attempts, each
    /// bounded by `min(configured timeout, remaining budget until
    /// `deadline`)`. Only timeouts and backend errors are retried.
    pub async fn call(&self, query: &str, k: usize, deadline: Instant) -> Result<SourceResult> {
        if !self.limiter.try_acquire() {
            self.metrics.record_rate_limited();
            tracing::debug!(source = %self.name, "rate limited, skipping source");
            return Err(GatewayError::RateLimited(self.name.clone()));
        }

        let Some(permit) = self.breaker.try_acquire() else {
            tracing::debug!(source = %self.name, "circuit open, fast-failing source");
            return Err(GatewayError::CircuitOpen(self.name.clone()));
        };

        self.metrics.record_call();
        let started = Instant::now();
        let span = tracing::debug_span!("source_call", source = %self.name);
        let result = self.attempts(query, k, deadline).instrument(span).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(source_result) => {
                self.metrics.record_success();
                permit.record(true);
                tracing::debug!(
                    source = %self.name,
                    items = source_result.items.len(),
                    latency_ms,
                    "source call succeeded"
                );
            }
            Err(err) => {
                self.metrics.record_failure();
                permit.record(false);
                tracing::warn!(
                    source = %self.name,
                    error = %err,
                    latency_ms,
                    "source call failed"
                );
            }
        }
        result
    }

    /// Run the bounded attempt loop for one logical call.
    async fn attempts(&self, query: &str, k: usize, deadline: Instant) -> Result<SourceResult> {
        let mut last_err = GatewayError::SourceTimeout(self.name.clone());

        for attempt in 0..=self.config.retry_max {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let attempt_deadline = deadline.min(now + self.config.timeout);

            match timeout_at(attempt_deadline, self.source.search(query, k, attempt_deadline)).await
            {
                Ok(Ok(items)) => {
                    return Ok(SourceResult {
                        source: self.name.clone(),
                        items,
                    });
                }
                Ok(Err(err)) => {
                    tracing::debug!(
                        source = %self.name,
                        attempt,
                        error = %err,
                        "source attempt failed"
                    );
                    let retryable = err.is_retryable();
                    last_err = err;
                    if !retryable {
                        break;
                    }
                }
                Err(_elapsed) => {
                    tracing::debug!(source = %self.name, attempt, "source attempt timed out");
                    last_err = GatewayError::SourceTimeout(self.name.clone());
                }
            }
        }

        Err(last_err)
    }
}

impl std::fmt::Debug for SourcePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourcePolicy")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
