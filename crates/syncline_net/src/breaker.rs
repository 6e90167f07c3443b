//! Circuit breaker for the backend connection.

use std::fmt;
use std::time::Instant;

use parking_lot::RwLock;

use crate::config::BreakerConfig;

/// The circuit breaker's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls are refused without network I/O.
    Open,
    /// One trial call is allowed through to probe recovery.
    HalfOpen,
}

impl BreakerState {
    /// Returns `true` if calls are currently refused outright.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerState::Open)
    }

    /// Returns `true` if calls may be issued, normally or as a trial.
    #[must_use]
    pub fn allows_calls(&self) -> bool {
        !self.is_open()
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        };
        write!(f, "{}", name)
    }
}

/// Point-in-time view of the breaker for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Effective state.
    pub state: BreakerState,
    /// Consecutive connectivity failures observed.
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
}

/// A circuit breaker guarding calls to the backend.
///
/// The breaker bounds the damage of a dead backend: once it opens, at most
/// one real network attempt happens per reset timeout, no matter how many
/// logical calls the application issues.
///
/// # State machine
///
/// - `Closed` → `Open` when consecutive failures inside the rolling window
///   reach the threshold
/// - `Open` → `HalfOpen` once the reset timeout has elapsed; exactly one
///   trial call is admitted
/// - `HalfOpen` → `Closed` on trial success, `HalfOpen` → `Open` on trial
///   failure with a fresh reset timeout
///
/// All methods take an explicit `now` so tests can drive the clock.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: RwLock<Inner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker with the given configuration.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                last_failure_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Asks permission to issue a call at `now`.
    ///
    /// Returns `false` when the breaker is open, or half-open with the
    /// trial slot already claimed. A `true` answer from a half-open
    /// breaker claims the trial slot; the caller must report the outcome
    /// via [`CircuitBreaker::record_success`] or
    /// [`CircuitBreaker::record_failure`].
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut inner = self.inner.write();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                if self.reset_elapsed(&inner, now) {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Records a successful call.
    ///
    /// Closes the breaker and clears the failure count.
    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        if inner.state != BreakerState::Closed {
            tracing::info!("circuit breaker closed after successful call");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.last_failure_at = None;
        inner.trial_in_flight = false;
    }

    /// Records a connectivity failure observed at `now`.
    pub fn record_failure(&self, now: Instant) {
        let mut inner = self.inner.write();

        // Failures older than the window no longer count as consecutive
        if let Some(last) = inner.last_failure_at {
            if now.duration_since(last) > self.config.failure_window {
                inner.consecutive_failures = 0;
            }
        }
        inner.consecutive_failures += 1;
        inner.last_failure_at = Some(now);

        match inner.state {
            BreakerState::HalfOpen => {
                tracing::warn!("circuit breaker trial call failed, reopening");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
                inner.trial_in_flight = false;
            }
            BreakerState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                }
            }
            // A failure from a call issued before the breaker opened does
            // not extend the reset timeout
            BreakerState::Open => {}
        }
    }

    /// Returns the effective state at `now`.
    ///
    /// An open breaker whose reset timeout has elapsed reports
    /// [`BreakerState::HalfOpen`]; the transition itself happens on the
    /// next [`CircuitBreaker::try_acquire`].
    #[must_use]
    pub fn state(&self, now: Instant) -> BreakerState {
        let inner = self.inner.read();
        match inner.state {
            BreakerState::Open if self.reset_elapsed(&inner, now) => BreakerState::HalfOpen,
            state => state,
        }
    }

    /// Returns the consecutive connectivity failure count.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.read().consecutive_failures
    }

    /// Returns a diagnostic snapshot at `now`.
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state(now),
            consecutive_failures: self.consecutive_failures(),
        }
    }

    fn reset_elapsed(&self, inner: &Inner, now: Instant) -> bool {
        inner
            .opened_at
            .map_or(true, |at| now.duration_since(at) >= self.config.reset_timeout)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
