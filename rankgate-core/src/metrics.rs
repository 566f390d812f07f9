//! Lock-free counters for the gateway's observable behaviour.
//!
//! Counters are plain atomics incremented on the hot path; the
//! serializable snapshot structs are assembled on demand by the
//! controller for the `/metrics` endpoint. Exporter integration is an
//! external collaborator's concern.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::breaker::CircuitState;

/// Per-source call counters, owned by that source's policy for the
/// process lifetime.
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// Logical calls admitted past the rate limiter and breaker.
    pub calls: AtomicU64,
    /// Logical calls that produced a result list.
    pub successes: AtomicU64,
    /// Logical calls that failed after exhausting retries.
    pub failures: AtomicU64,
    /// Calls rejected by admission control.
    pub rate_limited: AtomicU64,
}

impl SourceMetrics {
    pub fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }
}

/// Gateway-wide fusion counters, owned by the controller.
#[derive(Debug, Default)]
pub struct FusionMetrics {
    /// Completed fusion passes.
    pub fusions: AtomicU64,
    /// Fused items returned across all passes.
    pub fused_results: AtomicU64,
    /// Total time spent inside `combine`, in microseconds.
    pub fusion_micros: AtomicU64,
}

impl FusionMetrics {
    pub fn record_fusion(&self, fused_results: u64, micros: u64) {
        self.fusions.fetch_add(1, Ordering::Relaxed);
        self.fused_results.fetch_add(fused_results, Ordering::Relaxed);
        self.fusion_micros.fetch_add(micros, Ordering::Relaxed);
    }
}

/// Point-in-time view of one source's counters and breaker state.
#[derive(Debug, Clone, Serialize)]
pub struct SourceMetricsSnapshot {
    pub source: String,
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub rate_limited: u64,
    pub breaker_state: String,
    pub breaker_transitions: u64,
}

/// Point-in-time view of every counter the gateway exposes.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub sources: Vec<SourceMetricsSnapshot>,
    pub fusions: u64,
    pub fused_results: u64,
    pub fusion_micros_total: u64,
}

/// Stable label for a breaker state in the metrics exposition.
pub fn breaker_state_label(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half_open",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_counters_accumulate() {
        let metrics = SourceMetrics::default();
        metrics.record_call();
        metrics.record_call();
        metrics.record_success();
        metrics.record_failure();
        metrics.record_rate_limited();

        assert_eq!(metrics.calls.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.successes.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rate_limited.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn fusion_counters_accumulate() {
        let metrics = FusionMetrics::default();
        metrics.record_fusion(10, 120);
        metrics.record_fusion(5, 80);

        assert_eq!(metrics.fusions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.fused_results.load(Ordering::Relaxed), 15);
        assert_eq!(metrics.fusion_micros.load(Ordering::Relaxed), 200);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let snapshot = MetricsSnapshot {
            sources: vec![SourceMetricsSnapshot {
                source: "lexical".into(),
                calls: 3,
                successes: 2,
                failures: 1,
                rate_limited: 0,
                breaker_state: breaker_state_label(CircuitState::Closed).into(),
                breaker_transitions: 0,
            }],
            fusions: 1,
            fused_results: 7,
            fusion_micros_total: 42,
        };
        let json = serde_json::to_string(&snapshot).expect("serialize");
        assert!(json.contains("\"source\":\"lexical\""));
        assert!(json.contains("\"breaker_state\":\"closed\""));
        assert!(json.contains("\"fused_results\":7"));
    }

    #[test]
    fn breaker_state_labels_are_stable() {
        assert_eq!(breaker_state_label(CircuitState::Closed), "closed");
        assert_eq!(breaker_state_label(CircuitState::Open), "open");
        assert_eq!(breaker_state_label(CircuitState::HalfOpen), "half_open");
    }
}
