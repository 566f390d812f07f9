//! Budget-bounded fan-out / fan-in over the configured sources.
//!
//! One controller is built at startup from the per-source policies and
//! shared by every request. Each request establishes a single deadline
//! (`now + budget`) propagated to every fan-out task; results that miss
//! the deadline are discarded and their tasks aborted. Dropping an
//! in-flight request future (client disconnect) aborts the fan-out the
//! same way — the `JoinSet` owns the tasks.
//!
//! Per-source failures, rate-limit skips, and open circuits are
//! absorbed here: a source that contributed nothing never fails the
//! request on its own. Only an empty fan-in becomes an error.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::Instrument;

use crate::config::ControllerConfig;
use crate::error::{GatewayError, Result};
use crate::fusion;
use crate::metrics::{
    breaker_state_label, FusionMetrics, MetricsSnapshot, SourceMetricsSnapshot,
};
use crate::policy::SourcePolicy;
use crate::types::{FusedItem, SourceResult};

/// Orchestrates policy-wrapped source calls and fuses their results.
#[derive(Debug)]
pub struct Controller {
    policies: Vec<Arc<SourcePolicy>>,
    config: ControllerConfig,
    fusion_metrics: FusionMetrics,
}

impl Controller {
    /// Build a controller over the given per-source policies.
    pub fn new(policies: Vec<Arc<SourcePolicy>>, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            policies,
            config,
            fusion_metrics: FusionMetrics::default(),
        })
    }

    /// Number of configured sources, for readiness checks.
    pub fn source_count(&self) -> usize {
        self.policies.len()
    }

    /// The controller-level configuration in effect.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Fan a query out to every configured source under one deadline and
    /// fuse whatever came back in time.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NoSourcesAvailable`] when every source failed,
    /// was rate-limited, or was circuit-open;
    /// [`GatewayError::BudgetExceeded`] when the deadline expired before
    /// any source returned.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<FusedItem>> {
        let deadline = Instant::now() + self.config.budget;
        let span = tracing::info_span!("fanout", sources = self.policies.len(), k);
        self.run(query, k, deadline).instrument(span).await
    }

    async fn run(&self, query: &str, k: usize, deadline: Instant) -> Result<Vec<FusedItem>> {
        if self.policies.is_empty() {
            return Err(GatewayError::NoSourcesAvailable);
        }

        // Ask each source for a full fusion pool even when the caller
        // wants only a few fused items; top_k_max stays the ceiling.
        let fetch_k = k
            .max(self.config.combine.top_k_init)
            .min(self.config.combine.top_k_max);

        let mut tasks = JoinSet::new();
        for policy in &self.policies {
            let policy = Arc::clone(policy);
            let query = query.to_owned();
            tasks.spawn(async move {
                let result = policy.call(&query, fetch_k, deadline).await;
                (policy.name().to_owned(), result)
            });
        }

        let mut collected: Vec<SourceResult> = Vec::new();
        let mut deadline_hit = false;

        while !tasks.is_empty() {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((_, Ok(result))))) => {
                    tracing::debug!(
                        source = %result.source,
                        items = result.items.len(),
                        "source returned in time"
                    );
                    collected.push(result);
                }
                Ok(Some(Ok((name, Err(err))))) => {
                    // Absorbed: this source contributes nothing.
                    tracing::warn!(source = %name, error = %err, "source contributed nothing");
                }
                Ok(Some(Err(join_err))) => {
                    tracing::warn!(error = %join_err, "fan-out task terminated abnormally");
                }
                Ok(None) => break,
                Err(_elapsed) => {
                    deadline_hit = true;
                    let outstanding = tasks.len();
                    tracing::warn!(outstanding, "request budget expired, aborting stragglers");
                    tasks.abort_all();
                    break;
                }
            }
        }

        if collected.is_empty() {
            return Err(if deadline_hit {
                GatewayError::BudgetExceeded
            } else {
                GatewayError::NoSourcesAvailable
            });
        }

        let started = Instant::now();
        let mut fused = fusion::combine(&collected, &self.config.combine);
        let micros = started.elapsed().as_micros() as u64;
        self.fusion_metrics.record_fusion(fused.len() as u64, micros);
        tracing::debug!(
            contributing = collected.len(),
            fused = fused.len(),
            fusion_micros = micros,
            "fusion complete"
        );

        fused.truncate(k.min(self.config.combine.top_k_max));
        Ok(fused)
    }

    /// Assemble a point-in-time view of every counter for `/metrics`.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        use std::sync::atomic::Ordering;

        let sources = self
            .policies
            .iter()
            .map(|policy| {
                let metrics = policy.metrics();
                SourceMetricsSnapshot {
                    source: policy.name().to_owned(),
                    calls: metrics.calls.load(Ordering::Relaxed),
                    successes: metrics.successes.load(Ordering::Relaxed),
                    failures: metrics.failures.load(Ordering::Relaxed),
                    rate_limited: metrics.rate_limited.load(Ordering::Relaxed),
                    breaker_state: breaker_state_label(policy.breaker().state()).to_owned(),
                    breaker_transitions: policy.breaker().transition_count(),
                }
            })
            .collect();

        MetricsSnapshot {
            sources,
            fusions: self.fusion_metrics.fusions.load(Ordering::Relaxed),
            fused_results: self.fusion_metrics.fused_results.load(Ordering::Relaxed),
            fusion_micros_total: self.fusion_metrics.fusion_micros.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::CombineConfig;

    #[test]
    fn empty_controller_reports_zero_sources() {
        let controller =
            Controller::new(vec![], ControllerConfig::default()).expect("valid config");
        assert_eq!(controller.source_count(), 0);
        let snapshot = controller.metrics_snapshot();
        assert!(snapshot.sources.is_empty());
        assert_eq!(snapshot.fusions, 0);
    }

    #[tokio::test]
    async fn empty_controller_returns_no_sources_available() {
        let controller =
            Controller::new(vec![], ControllerConfig::default()).expect("valid config");
        let err = controller.search("query", 10).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoSourcesAvailable));
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let config = ControllerConfig {
            budget: Duration::ZERO,
            ..Default::default()
        };
        assert!(Controller::new(vec![], config).is_err());

        let config = ControllerConfig {
            combine: CombineConfig {
                rrf_k: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(Controller::new(vec![], config).is_err());
    }
}
