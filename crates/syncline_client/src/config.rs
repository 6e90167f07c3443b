//! Client composition configuration.

use std::time::Duration;

use syncline_engine::EngineConfig;
use syncline_net::NetConfig;
use syncline_session::SessionConfig;

/// Configuration for the assembled client.
///
/// Bundles the per-layer configurations with the tick intervals of the
/// background tasks the client schedules while a session is active.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session lifecycle configuration.
    pub session: SessionConfig,
    /// Cache and queue configuration.
    pub engine: EngineConfig,
    /// Timeout, retry, and breaker configuration.
    pub net: NetConfig,
    /// How often the idle watchdog samples the session.
    pub idle_check_interval: Duration,
    /// How often proactive token refresh is considered.
    pub refresh_check_interval: Duration,
    /// How often failed collection refreshes are re-attempted.
    pub fetch_retry_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            engine: EngineConfig::default(),
            net: NetConfig::default(),
            idle_check_interval: Duration::from_secs(30),
            refresh_check_interval: Duration::from_secs(300),
            fetch_retry_interval: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Sets the session configuration.
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the network configuration.
    #[must_use]
    pub fn with_net(mut self, net: NetConfig) -> Self {
        self.net = net;
        self
    }

    /// Sets the idle watchdog interval.
    #[must_use]
    pub fn with_idle_check_interval(mut self, interval: Duration) -> Self {
        self.idle_check_interval = interval;
        self
    }

    /// Sets the token refresh check interval.
    #[must_use]
    pub fn with_refresh_check_interval(mut self, interval: Duration) -> Self {
        self.refresh_check_interval = interval;
        self
    }

    /// Sets the collection refresh retry interval.
    #[must_use]
    pub fn with_fetch_retry_interval(mut self, interval: Duration) -> Self {
        self.fetch_retry_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::default();
        assert!(config.idle_check_interval < config.session.idle_timeout.to_std().unwrap());
        assert!(config.refresh_check_interval >= config.idle_check_interval);
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::default()
            .with_idle_check_interval(Duration::from_secs(5))
            .with_fetch_retry_interval(Duration::from_secs(10));
        assert_eq!(config.idle_check_interval, Duration::from_secs(5));
        assert_eq!(config.fetch_retry_interval, Duration::from_secs(10));
    }
}
