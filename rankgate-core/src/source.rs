//! Trait definition for pluggable upstream ranked-search sources.
//!
//! A source adapter owns all backend wire-protocol details; the core
//! only sees a pre-ranked item list or an error. Futures are boxed so
//! the controller can hold heterogeneous sources as `Arc<dyn Source>`.

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::types::Item;

/// A pluggable upstream ranked-search backend.
///
/// Implementations must be `Send + Sync`: every request calls every
/// configured source concurrently through a shared reference.
///
/// Contract:
/// - returned items are pre-ranked, best first;
/// - item IDs are unique within one returned list (fusion trusts this
///   and does not deduplicate within a single source's list);
/// - the call should observe `deadline` and return promptly once it
///   passes — the wrapping policy enforces it regardless, and the
///   controller aborts outstanding calls at the request deadline;
/// - backend-side retries, if any, are the adapter's own business and
///   orthogonal to the proxy-level retries in the source policy.
pub trait Source: Send + Sync {
    /// Stable name of this source, used for logging, metrics, and
    /// fused-item provenance.
    fn name(&self) -> &str;

    /// Perform a ranked search for `query`, returning up to `k` items.
    fn search<'a>(
        &'a self,
        query: &'a str,
        k: usize,
        deadline: Instant,
    ) -> BoxFuture<'a, Result<Vec<Item>, GatewayError>>;
}
