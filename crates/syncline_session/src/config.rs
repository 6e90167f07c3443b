//! Session manager configuration.

use chrono::Duration;

/// Configuration for the session manager.
///
/// All durations are wall-clock: session timing survives process restarts,
/// so it is measured against persisted timestamps rather than process
/// uptime.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum gap since the last recorded activity before forced logout.
    pub idle_timeout: Duration,
    /// How long before the idle timeout the warning state is entered.
    pub warning_lead: Duration,
    /// Refresh the token once it is due to expire within this window.
    pub refresh_window: Duration,
    /// Minimum gap between processed activity events.
    pub activity_throttle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::minutes(30),
            warning_lead: Duration::minutes(5),
            refresh_window: Duration::hours(24),
            activity_throttle: Duration::seconds(30),
        }
    }
}

impl SessionConfig {
    /// Sets the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the warning lead time.
    #[must_use]
    pub fn with_warning_lead(mut self, lead: Duration) -> Self {
        self.warning_lead = lead;
        self
    }

    /// Sets the token refresh window.
    #[must_use]
    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// Sets the activity throttle interval.
    #[must_use]
    pub fn with_activity_throttle(mut self, throttle: Duration) -> Self {
        self.activity_throttle = throttle;
        self
    }

    /// Idle duration at which the warning state is entered.
    ///
    /// A lead time larger than the timeout clamps to zero, meaning the
    /// warning fires immediately on the first idle check.
    #[must_use]
    pub fn warning_threshold(&self) -> Duration {
        (self.idle_timeout - self.warning_lead).max(Duration::zero())
    }
}
