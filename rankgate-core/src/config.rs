//! Gateway configuration with sensible defaults.
//!
//! Each config struct carries a `validate()` that rejects values which
//! would make the corresponding state machine degenerate (zero-capacity
//! buckets, failure thresholds outside `(0, 1]`, and so on).

use std::time::Duration;

use crate::error::GatewayError;

/// Fusion tuning for Reciprocal Rank Fusion.
#[derive(Debug, Clone)]
pub struct CombineConfig {
    /// RRF damping constant `k` in `1 / (k + rank)`. Larger values
    /// flatten the influence of top ranks.
    pub rrf_k: f64,
    /// How many fused items the combine step keeps.
    pub top_k_init: usize,
    /// Hard ceiling on output size regardless of the caller's `k`.
    pub top_k_max: usize,
    /// Optional minimum aggregate score; items below it are dropped.
    pub score_floor: Option<f64>,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            top_k_init: 20,
            top_k_max: 64,
            score_floor: None,
        }
    }
}

impl CombineConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !self.rrf_k.is_finite() || self.rrf_k <= 0.0 {
            return Err(GatewayError::Config("rrf_k must be a positive number".into()));
        }
        if self.top_k_init == 0 {
            return Err(GatewayError::Config("top_k_init must be greater than 0".into()));
        }
        if self.top_k_max == 0 {
            return Err(GatewayError::Config("top_k_max must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Token-bucket admission control settings for one source.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Bucket capacity; also the initial token count.
    pub capacity: u32,
    /// Tokens added per elapsed refill interval.
    pub refill_tokens: u32,
    /// Length of one refill interval.
    pub refill_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_tokens: 100,
            refill_interval: Duration::from_secs(1),
        }
    }
}

impl RateLimitConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.capacity == 0 {
            return Err(GatewayError::Config("rate limit capacity must be greater than 0".into()));
        }
        if self.refill_tokens == 0 {
            return Err(GatewayError::Config("refill_tokens must be greater than 0".into()));
        }
        if self.refill_interval.is_zero() {
            return Err(GatewayError::Config("refill_interval must be non-zero".into()));
        }
        Ok(())
    }
}

/// Sliding-window circuit breaker settings for one source.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Length of the rolling outcome window.
    pub window: Duration,
    /// Failure-rate trip threshold in `(0, 1]`.
    pub failure_threshold: f64,
    /// Minimum outcomes in the window before the rate is consulted.
    /// Prevents false trips from one or two failures on a quiet source.
    pub min_samples: usize,
    /// How long an open breaker fast-fails before probing.
    pub cooldown: Duration,
    /// Concurrent probe cap while half-open; also the number of probe
    /// successes required to close.
    pub half_open_cap: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            failure_threshold: 0.5,
            min_samples: 10,
            cooldown: Duration::from_secs(10),
            half_open_cap: 2,
        }
    }
}

impl BreakerConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.window.is_zero() {
            return Err(GatewayError::Config("breaker window must be non-zero".into()));
        }
        if !(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0) {
            return Err(GatewayError::Config(
                "failure_threshold must be within (0, 1]".into(),
            ));
        }
        if self.min_samples == 0 {
            return Err(GatewayError::Config("min_samples must be greater than 0".into()));
        }
        if self.half_open_cap == 0 {
            return Err(GatewayError::Config("half_open_cap must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Per-source resilience policy: timeout, retries, admission, breaking.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Per-attempt timeout for one source call. The effective bound is
    /// `min(timeout, remaining request budget)`.
    pub timeout: Duration,
    /// Additional attempts after the first on timeout or backend error.
    pub retry_max: u32,
    /// Admission control settings.
    pub rate_limit: RateLimitConfig,
    /// Fault isolation settings.
    pub breaker: BreakerConfig,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(800),
            retry_max: 1,
            rate_limit: RateLimitConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl PolicyConfig {
    /// Validates this configuration, including nested sections.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.timeout.is_zero() {
            return Err(GatewayError::Config("source timeout must be non-zero".into()));
        }
        self.rate_limit.validate()?;
        self.breaker.validate()
    }
}

/// Controller-level settings: the overall request budget and fusion tuning.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Overall per-request deadline shared by every fan-out call.
    pub budget: Duration,
    /// Fusion tuning.
    pub combine: CombineConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_millis(2000),
            combine: CombineConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Validates this configuration, including nested sections.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.budget.is_zero() {
            return Err(GatewayError::Config("budget must be non-zero".into()));
        }
        self.combine.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_defaults_match_rrf_convention() {
        let cfg = CombineConfig::default();
        assert!((cfg.rrf_k - 60.0).abs() < f64::EPSILON);
        assert_eq!(cfg.top_k_init, 20);
        assert_eq!(cfg.top_k_max, 64);
        assert!(cfg.score_floor.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn combine_rejects_non_positive_rrf_k() {
        let cfg = CombineConfig {
            rrf_k: 0.0,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("rrf_k"));

        let cfg = CombineConfig {
            rrf_k: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn combine_rejects_zero_top_k() {
        let cfg = CombineConfig {
            top_k_init: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = CombineConfig {
            top_k_max: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rate_limit_defaults_valid() {
        let cfg = RateLimitConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rate_limit_rejects_degenerate_values() {
        let cfg = RateLimitConfig {
            capacity: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = RateLimitConfig {
            refill_tokens: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = RateLimitConfig {
            refill_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn breaker_defaults_valid() {
        let cfg = BreakerConfig::default();
        assert!(cfg.validate().is_ok());
        assert!((cfg.failure_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(cfg.min_samples, 10);
    }

    #[test]
    fn breaker_rejects_threshold_outside_unit_interval() {
        for bad in [0.0, -0.1, 1.5] {
            let cfg = BreakerConfig {
                failure_threshold: bad,
                ..Default::default()
            };
            assert!(cfg.validate().is_err(), "threshold {bad} should be rejected");
        }
        let cfg = BreakerConfig {
            failure_threshold: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn policy_validate_covers_nested_sections() {
        let cfg = PolicyConfig {
            breaker: BreakerConfig {
                min_samples: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = PolicyConfig {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        assert!(PolicyConfig::default().validate().is_ok());
    }

    #[test]
    fn controller_validate_covers_budget_and_combine() {
        let cfg = ControllerConfig {
            budget: Duration::ZERO,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ControllerConfig {
            combine: CombineConfig {
                top_k_init: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        assert!(ControllerConfig::default().validate().is_ok());
    }
}
