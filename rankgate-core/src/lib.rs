//! # rankgate-core
//!
//! The resilience-and-fusion engine behind the rankgate retrieval
//! gateway. It fans a query out to several upstream ranked-search
//! sources, shields the request from individual backend failure or
//! latency, and merges the per-source rankings into one deduplicated,
//! deterministically ordered list.
//!
//! ## Design
//!
//! - One [`policy::SourcePolicy`] per source: token-bucket admission
//!   control, a sliding-window circuit breaker, a per-attempt timeout
//!   bounded by the remaining request budget, and bounded retries
//! - A [`controller::Controller`] fans out one task per source under a
//!   single shared deadline and absorbs per-source failures — only an
//!   empty fan-in becomes an error
//! - [`fusion::combine`] merges whatever arrived in time with
//!   Reciprocal Rank Fusion and a fully pinned tie-break order
//! - Resilience state is process-wide: limiters and breakers are built
//!   once at startup and shared by every concurrent request
//!
//! Backend adapters live behind the [`source::Source`] trait; this
//! crate never speaks a wire protocol.

pub mod breaker;
pub mod config;
pub mod controller;
pub mod error;
pub mod fusion;
pub mod metrics;
pub mod policy;
pub mod rate_limit;
pub mod source;
pub mod types;

pub use breaker::{CallPermit, CircuitBreaker, CircuitState};
pub use config::{
    BreakerConfig, CombineConfig, ControllerConfig, PolicyConfig, RateLimitConfig,
};
pub use controller::Controller;
pub use error::{GatewayError, Result};
pub use metrics::{MetricsSnapshot, SourceMetricsSnapshot};
pub use policy::SourcePolicy;
pub use rate_limit::TokenBucket;
pub use source::Source;
pub use types::{Contribution, FusedItem, Item, SourceResult};
