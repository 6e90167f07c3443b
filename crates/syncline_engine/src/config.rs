//! Sync engine configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;
use syncline_proto::BackoffPolicy;

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a fetched collection counts as fresh.
    pub cache_ttl: Duration,
    /// Maximum number of cached collections before eviction kicks in.
    pub cache_capacity: usize,
    /// Failed attempts after which a queued action is abandoned.
    pub max_retries: u32,
    /// Per-action backoff between queued retries.
    pub backoff: BackoffPolicy,
    /// How often the scheduler should run a drain pass.
    pub drain_interval: StdDuration,
    /// Queued actions attempted concurrently within one drain pass.
    pub drain_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::minutes(5),
            cache_capacity: 32,
            max_retries: 3,
            backoff: BackoffPolicy::default(),
            drain_interval: StdDuration::from_secs(30),
            drain_concurrency: 3,
        }
    }
}

impl EngineConfig {
    /// Sets the cache TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the cache capacity.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    /// Sets the retry ceiling for queued actions.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the retry backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the drain interval.
    #[must_use]
    pub fn with_drain_interval(mut self, interval: StdDuration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Sets the drain concurrency limit.
    #[must_use]
    pub fn with_drain_concurrency(mut self, concurrency: usize) -> Self {
        self.drain_concurrency = concurrency.max(1);
        self
    }
}
