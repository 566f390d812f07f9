//! Per-source circuit breaker with a sliding failure-rate window.
//!
//! Unlike a consecutive-failure counter, the trip condition here is
//! rate-based with a minimum-sample floor, so one or two failures on a
//! quiet source never trip the circuit. The half-open phase bounds how
//! many probes may be in flight against a possibly-still-broken backend.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐ rate >= F over  ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├────────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘  >= N samples   └────────┘             └────┬─────┘
//!     │                          ▲                       │
//!     │  H probe successes       │  any probe failure    │
//!     └──────────────────────────┴───────────────────────┘
//! ```
//!
//! Admission hands out a [`CallPermit`]. The permit is how the outcome
//! comes back, and it is also the probe slot itself: when the call
//! future is dropped before resolving (deadline abort, client
//! disconnect), dropping the permit returns the slot, so an aborted
//! probe can never wedge the breaker half-open with no free slots.
//!
//! All transitions are guarded by a single lock per breaker. Outcome
//! recording is O(1) amortised: the window is a `VecDeque` pruned lazily
//! whenever it is consulted.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use crate::config::BreakerConfig;

/// Circuit breaker state for a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Source is healthy — calls are allowed and outcomes recorded.
    Closed,
    /// Source has failed too often — every call is fast-failed until
    /// the cooldown expires.
    Open,
    /// Cooldown has elapsed — a bounded number of probe calls test
    /// whether the source has recovered.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    /// Rolling `(timestamp, success)` outcomes, oldest first.
    window: VecDeque<(Instant, bool)>,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
    transitions: u64,
}

/// Sliding-window circuit breaker guarding one source.
///
/// Constructed once per source at startup and shared by every request;
/// its state outlives any single request.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

/// An admitted call's ticket: carries the outcome back to the breaker.
///
/// Obtained from [`CircuitBreaker::try_acquire`]. Resolve it with
/// [`record`]; if it is dropped unresolved instead — the call future
/// was aborted — any half-open probe slot it holds is released and no
/// outcome is recorded.
///
/// [`record`]: Self::record
#[derive(Debug)]
#[must_use = "the breaker expects this call's outcome via record()"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    /// Transition count at admission; half-open bookkeeping applies
    /// only while the breaker is still in that same half-open phase.
    generation: u64,
    resolved: bool,
}

impl CallPermit<'_> {
    /// Record the final outcome of the admitted logical call.
    pub fn record(mut self, success: bool) {
        self.resolved = true;
        self.breaker
            .record_resolved(self.probe, self.generation, success);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.release_unresolved(self.probe, self.generation);
        }
    }
}

impl CircuitBreaker {
    /// Create a closed breaker with the given settings.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                half_open_in_flight: 0,
                half_open_successes: 0,
                transitions: 0,
            }),
        }
    }

    /// Admit a call, or return `None`. Never blocks.
    ///
    /// - Closed: always admitted.
    /// - Open: rejected until the cooldown elapses; the first call after
    ///   cooldown moves the breaker to half-open, resets the probe
    ///   counters, and proceeds as a probe.
    /// - HalfOpen: admitted while fewer than `half_open_cap` probes are
    ///   outstanding.
    ///
    /// The returned [`CallPermit`] must be resolved with the logical
    /// call's final outcome (not each retry attempt's); dropping it
    /// unresolved releases the probe slot without recording anything.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let Ok(mut state) = self.state.lock() else {
            return None;
        };

        let probe = match state.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let cooled_down = state
                    .opened_at
                    .is_none_or(|t| t.elapsed() >= self.config.cooldown);
                if !cooled_down {
                    return None;
                }
                state.state = CircuitState::HalfOpen;
                state.transitions += 1;
                state.half_open_successes = 0;
                // This call becomes the first probe.
                state.half_open_in_flight = 1;
                true
            }
            CircuitState::HalfOpen => {
                if state.half_open_in_flight < self.config.half_open_cap {
                    state.half_open_in_flight += 1;
                    true
                } else {
                    return None;
                }
            }
        };

        Some(CallPermit {
            breaker: self,
            probe,
            generation: state.transitions,
            resolved: false,
        })
    }

    /// Fold a resolved permit's outcome into the breaker.
    ///
    /// Closed-admitted outcomes join the rolling window; once the window
    /// holds at least `min_samples` outcomes and the failure rate meets
    /// `failure_threshold`, the breaker opens. An outcome that lands
    /// after the breaker has already tripped is ignored.
    ///
    /// Probe outcomes apply only while the breaker is still in the
    /// half-open phase that admitted them: one probe failure reopens
    /// immediately with a fresh `opened_at`; `half_open_cap` probe
    /// successes close the breaker and clear the window.
    fn record_resolved(&self, probe: bool, generation: u64, success: bool) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let now = Instant::now();

        if probe {
            if state.state != CircuitState::HalfOpen || state.transitions != generation {
                // The half-open phase this probe belonged to is over.
                return;
            }
            state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
            if success {
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.half_open_cap {
                    state.state = CircuitState::Closed;
                    state.transitions += 1;
                    state.window.clear();
                    state.half_open_in_flight = 0;
                    state.half_open_successes = 0;
                    tracing::info!("circuit breaker closed after successful probes");
                }
            } else {
                state.state = CircuitState::Open;
                state.opened_at = Some(now);
                state.transitions += 1;
                state.half_open_in_flight = 0;
                state.half_open_successes = 0;
                tracing::warn!("circuit breaker reopened by failed probe");
            }
            return;
        }

        // A call admitted before a trip has no window to land in.
        if state.state != CircuitState::Closed {
            return;
        }
        state.window.push_back((now, success));
        self.prune(&mut state.window, now);

        let total = state.window.len();
        if total < self.config.min_samples {
            return;
        }
        let failures = state.window.iter().filter(|(_, ok)| !ok).count();
        let rate = failures as f64 / total as f64;
        if rate >= self.config.failure_threshold {
            state.state = CircuitState::Open;
            state.opened_at = Some(now);
            state.transitions += 1;
            tracing::warn!(failures, total, rate, "circuit breaker opened");
        }
    }

    /// Return an aborted probe's slot. An unresolved call is neither a
    /// success nor a failure; only the slot comes back.
    fn release_unresolved(&self, probe: bool, generation: u64) {
        if !probe {
            return;
        }
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.state == CircuitState::HalfOpen && state.transitions == generation {
            state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
        }
    }

    /// Current state snapshot. Does not advance the cooldown.
    pub fn state(&self) -> CircuitState {
        self.state
            .lock()
            .map_or(CircuitState::Open, |state| state.state)
    }

    /// Total state transitions since construction, for metrics.
    pub fn transition_count(&self) -> u64 {
        self.state.lock().map_or(0, |state| state.transitions)
    }

    /// Outcomes currently inside the rolling window.
    pub fn recorded_outcomes(&self) -> usize {
        match self.state.lock() {
            Ok(mut state) => {
                let now = Instant::now();
                self.prune(&mut state.window, now);
                state.window.len()
            }
            Err(_) => 0,
        }
    }

    /// Drop window entries older than the configured window length.
    fn prune(&self, window: &mut VecDeque<(Instant, bool)>, now: Instant) {
        while let Some(&(ts, _)) = window.front() {
            if now.saturating_duration_since(ts) > self.config.window {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}
