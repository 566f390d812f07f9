//! Error taxonomy for the gateway core.
//!
//! Per-source conditions (`SourceTimeout`, `SourceError`, `RateLimited`,
//! `CircuitOpen`) are absorbed at the controller boundary; only
//! request-level conditions (`NoSourcesAvailable`, `BudgetExceeded`)
//! propagate to callers.

/// Errors that can occur while fanning out to sources and fusing results.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A source call exceeded its per-attempt timeout.
    #[error("source '{0}' timed out")]
    SourceTimeout(String),

    /// A source reported a backend failure.
    #[error("source '{name}' failed: {message}")]
    SourceError {
        /// Which source failed.
        name: String,
        /// Backend-reported failure detail.
        message: String,
    },

    /// Admission control rejected the call. A skip, not a fault.
    #[error("source '{0}' rate limited")]
    RateLimited(String),

    /// The source's circuit breaker is open; the call was fast-failed
    /// without reaching the backend. Not counted as a new failure.
    #[error("source '{0}' circuit open")]
    CircuitOpen(String),

    /// Every configured source failed, was skipped, or was circuit-open.
    #[error("no sources available")]
    NoSourcesAvailable,

    /// The request deadline expired before any source returned.
    #[error("request budget exceeded")]
    BudgetExceeded,

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether the source policy may retry this error within the same
    /// logical call. Only transient faults qualify; rejections from the
    /// rate limiter or circuit breaker are deliberate and final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceTimeout(_) | Self::SourceError { .. })
    }

    /// Whether this is an intentional rejection (skip) rather than a
    /// fault signal. Rejections are never recorded into the breaker.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::CircuitOpen(_))
    }
}

/// Convenience type alias for gateway-core results.
pub type Result<T> = std::result::Result<T, GatewayError>;
