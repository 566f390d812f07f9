//! Environment-variable configuration for the rankgate service.
//!
//! Every option has a default; an unparseable value is a startup error
//! rather than a silent fallback.

use std::time::Duration;

use rankgate_core::config::{
    BreakerConfig, CombineConfig, ControllerConfig, PolicyConfig, RateLimitConfig,
};
use rankgate_core::GatewayError;

/// Full service configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the HTTP surface listens on.
    pub port: u16,
    /// Fused item count when a request omits `k`.
    pub default_k: usize,
    /// Controller-level settings (budget, fusion tuning).
    pub controller: ControllerConfig,
    /// Per-source resilience settings, applied to every source.
    pub policy: PolicyConfig,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, GatewayError> {
        let combine = CombineConfig {
            rrf_k: env_parse("RRF_K", 60.0)?,
            top_k_init: env_parse("TOPK_INIT", 20)?,
            top_k_max: env_parse("TOPK_MAX", 64)?,
            score_floor: env_parse_opt("SCORE_FLOOR")?,
        };
        let controller = ControllerConfig {
            budget: Duration::from_millis(env_parse("BUDGET_MS", 2000)?),
            combine,
        };
        let policy = PolicyConfig {
            timeout: Duration::from_millis(env_parse("SOURCE_TIMEOUT_MS", 800)?),
            retry_max: env_parse("RETRY_MAX", 1)?,
            rate_limit: RateLimitConfig {
                capacity: env_parse("RATE_CAPACITY", 100)?,
                refill_tokens: env_parse("RATE_REFILL_TOKENS", 100)?,
                refill_interval: Duration::from_millis(env_parse("RATE_REFILL_INTERVAL_MS", 1000)?),
            },
            breaker: BreakerConfig {
                window: Duration::from_millis(env_parse("BREAKER_WINDOW_MS", 30_000)?),
                failure_threshold: env_parse("BREAKER_FAILURE_THRESHOLD", 0.5)?,
                min_samples: env_parse("BREAKER_MIN_SAMPLES", 10)?,
                cooldown: Duration::from_millis(env_parse("BREAKER_COOLDOWN_MS", 10_000)?),
                half_open_cap: env_parse("BREAKER_HALF_OPEN_CAP", 2)?,
            },
        };

        let config = Self {
            port: env_parse("PORT", 4090)?,
            default_k: env_parse("DEFAULT_K", 10)?,
            controller,
            policy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the assembled configuration, including nested sections.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.default_k == 0 {
            return Err(GatewayError::Config("DEFAULT_K must be greater than 0".into()));
        }
        self.controller.validate()?;
        self.policy.validate()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4090,
            default_k: 10,
            controller: ControllerConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, GatewayError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| GatewayError::Config(format!("invalid value for {key}: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

/// Parse an optional environment variable; unset means `None`.
fn env_parse_opt<T: std::str::FromStr>(key: &str) -> Result<Option<T>, GatewayError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GatewayError::Config(format!("invalid value for {key}: {raw:?}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::{Mutex, MutexGuard};

    /// Environment mutations are process-global; serialise the tests
    /// that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Restores an environment variable to its previous value on drop,
    /// keeping env-mutating tests self-contained.
    struct EnvGuard {
        key: &'static str,
        previous: Option<std::ffi::OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = std::env::var_os(key);
            unsafe { std::env::set_var(key, value) };
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(value) => unsafe { std::env::set_var(self.key, value) },
                None => unsafe { std::env::remove_var(self.key) },
            }
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 4090);
        assert_eq!(config.default_k, 10);
        assert_eq!(config.controller.budget, Duration::from_millis(2000));
        assert!((config.controller.combine.rrf_k - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.controller.combine.top_k_init, 20);
        assert_eq!(config.controller.combine.top_k_max, 64);
        assert_eq!(config.policy.timeout, Duration::from_millis(800));
        assert_eq!(config.policy.retry_max, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_override_applies() {
        let _lock = env_lock();
        let _budget = EnvGuard::set("BUDGET_MS", "750");
        let _k = EnvGuard::set("DEFAULT_K", "25");

        let config = ServerConfig::from_env().expect("config should load");
        assert_eq!(config.controller.budget, Duration::from_millis(750));
        assert_eq!(config.default_k, 25);
    }

    #[test]
    fn unparseable_value_is_a_startup_error() {
        let _lock = env_lock();
        let _guard = EnvGuard::set("RETRY_MAX", "lots");

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("RETRY_MAX"));
    }

    #[test]
    fn score_floor_unset_means_none() {
        let _lock = env_lock();
        let config = ServerConfig::from_env().expect("config should load");
        assert!(config.controller.combine.score_floor.is_none());

        let _guard = EnvGuard::set("SCORE_FLOOR", "0.01");
        let config = ServerConfig::from_env().expect("config should load");
        assert_eq!(config.controller.combine.score_floor, Some(0.01));
    }

    #[test]
    fn zero_default_k_rejected() {
        let _lock = env_lock();
        let _guard = EnvGuard::set("DEFAULT_K", "0");
        assert!(ServerConfig::from_env().is_err());
    }
}
