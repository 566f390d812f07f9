//! In-process source adapters.
//!
//! Concrete backend clients are out of scope for this binary; what
//! ships is [`StaticSource`], a fixed pre-ranked list behind the
//! [`Source`] trait. It backs local smoke runs and the integration
//! suite, and doubles as the reference for writing real adapters.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use rankgate_core::{GatewayError, Item, Source};

/// A source serving a fixed, pre-ranked result list.
///
/// The list is returned in stored order regardless of the query; `k`
/// truncates it. An optional artificial latency makes budget and
/// straggler behaviour observable in local runs.
pub struct StaticSource {
    name: String,
    items: Vec<Item>,
    latency: Option<Duration>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            name: name.into(),
            items,
            latency: None,
        }
    }

    /// Adds a fixed per-call delay before results are returned.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Builds a ranked list of `count` items with descending scores.
    pub fn ranked_items(prefix: &str, count: usize) -> Vec<Item> {
        (0..count)
            .map(|i| Item {
                id: format!("{prefix}-{i:03}"),
                score: (count - i) as f64,
                payload: serde_json::json!({ "title": format!("{prefix} document {i}") }),
            })
            .collect()
    }
}

impl Source for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(
        &'a self,
        _query: &'a str,
        k: usize,
        _deadline: Instant,
    ) -> BoxFuture<'a, Result<Vec<Item>, GatewayError>> {
        Box::pin(async move {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            Ok(self.items.iter().take(k).cloned().collect())
        })
    }
}

/// The sources wired by the default binary: two overlapping corpora
/// ranked differently, so fused output exercises the cross-source
/// merge path.
pub fn demo_sources() -> Vec<std::sync::Arc<dyn Source>> {
    let docs = StaticSource::ranked_items("docs", 40);

    // Same ids in reverse preference, plus a few of its own, rescored
    // so the list stays best-first.
    let mut web: Vec<Item> = docs.iter().rev().cloned().collect();
    web.extend(StaticSource::ranked_items("web", 10));
    let total = web.len();
    for (i, item) in web.iter_mut().enumerate() {
        item.score = (total - i) as f64;
    }

    vec![
        std::sync::Arc::new(StaticSource::new("docs", docs)),
        std::sync::Arc::new(StaticSource::new("web", web)),
    ]
}
