//! Token-bucket admission control, one bucket per source.
//!
//! `try_acquire` never blocks and never sleeps: a rejected call is an
//! immediate skip signal to the source policy, not a queued request.
//! There is no background refill task — elapsed-time refill is computed
//! lazily on every access, under the same lock that guards the token
//! count, so the limiter cannot leak tasks on shutdown.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// A lazily-refilled token bucket.
///
/// Starts full. Every `refill_interval`, `refill_tokens` tokens are
/// added (capped at `capacity`); partial intervals carry over because
/// `last_refill` only advances by whole intervals.
#[derive(Debug)]
pub struct TokenBucket {
    config: RateLimitConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket with the given settings.
    pub fn new(config: RateLimitConfig) -> Self {
        let state = BucketState {
            tokens: config.capacity,
            last_refill: Instant::now(),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Try to consume one token. Returns `false` when the bucket is
    /// empty; the caller must treat that as a skip, not a fault.
    pub fn try_acquire(&self) -> bool {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            // A poisoned lock means a panic mid-update; fail closed.
            Err(_) => return false,
        };
        self.refill(&mut state, Instant::now());

        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after applying any pending refill.
    pub fn remaining(&self) -> u32 {
        match self.state.lock() {
            Ok(mut state) => {
                self.refill(&mut state, Instant::now());
                state.tokens
            }
            Err(_) => 0,
        }
    }

    /// Apply whole elapsed refill intervals to the bucket.
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let interval = self.config.refill_interval;
        let elapsed = now.saturating_duration_since(state.last_refill);
        let intervals = whole_intervals(elapsed, interval);
        if intervals == 0 {
            return;
        }

        let added = intervals.saturating_mul(self.config.refill_tokens);
        state.tokens = state.tokens.saturating_add(added).min(self.config.capacity);
        // Advance by whole intervals only; the fractional remainder
        // keeps accruing toward the next refill.
        state.last_refill += interval * intervals;
    }
}

/// Whole refill intervals inside `elapsed`, saturated at `u32::MAX`.
///
/// The division runs in `u128` so a very long idle gap (a short interval
/// after days without traffic) cannot wrap. Saturation is lossless for
/// the token count, which is capped at `capacity` long before that many
/// intervals matter; `last_refill` then advances by the saturated
/// amount and the remainder keeps accruing on the next call.
fn whole_intervals(elapsed: Duration, interval: Duration) -> u32 {
    let intervals = elapsed.as_nanos() / interval.as_nanos();
    u32::try_from(intervals).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn make_bucket(capacity: u32, refill_tokens: u32, interval_ms: u64) -> TokenBucket {
        TokenBucket::new(RateLimitConfig {
            capacity,
            refill_tokens,
            refill_interval: Duration::from_millis(interval_ms),
        })
    }

    #[test]
    fn allows_exactly_capacity_immediate_acquisitions() {
        let bucket = make_bucket(5, 5, 60_000);

        for i in 0..5 {
            assert!(bucket.try_acquire(), "acquisition {i} should succeed");
        }
        assert!(!bucket.try_acquire(), "sixth acquisition should be rejected");
    }

    #[test]
    fn rejection_is_immediate_and_repeatable() {
        let bucket = make_bucket(1, 1, 60_000);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn refill_adds_exactly_refill_tokens_after_one_interval() {
        let bucket = make_bucket(10, 2, 50);

        for _ in 0..10 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());

        thread::sleep(Duration::from_millis(60));

        // Exactly one interval elapsed: two tokens back, no more.
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let bucket = make_bucket(3, 100, 10);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(bucket.remaining(), 3);
    }

    #[test]
    fn partial_interval_does_not_refill() {
        let bucket = make_bucket(1, 1, 10_000);
        assert!(bucket.try_acquire());
        thread::sleep(Duration::from_millis(20));
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn remaining_reflects_consumption() {
        let bucket = make_bucket(4, 4, 60_000);
        assert_eq!(bucket.remaining(), 4);
        assert!(bucket.try_acquire());
        assert_eq!(bucket.remaining(), 3);
        assert!(bucket.try_acquire());
        assert_eq!(bucket.remaining(), 2);
    }

    #[test]
    fn interval_arithmetic_saturates_on_long_idle_gaps() {
        // A millisecond interval after years idle overflows u32; the
        // count saturates instead of wrapping.
        let long_idle = Duration::from_secs(200 * 365 * 24 * 60 * 60);
        assert_eq!(
            whole_intervals(long_idle, Duration::from_millis(1)),
            u32::MAX
        );

        // Ordinary gaps still count exactly.
        assert_eq!(
            whole_intervals(Duration::from_millis(130), Duration::from_millis(50)),
            2
        );
        assert_eq!(
            whole_intervals(Duration::from_millis(49), Duration::from_millis(50)),
            0
        );
    }

    #[test]
    fn concurrent_acquisitions_never_exceed_capacity() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let bucket = Arc::new(make_bucket(50, 50, 60_000));
        let granted = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                let granted = Arc::clone(&granted);
                thread::spawn(move || {
                    for _ in 0..20 {
                        if bucket.try_acquire() {
                            granted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        assert_eq!(granted.load(Ordering::Relaxed), 50);
    }
}
