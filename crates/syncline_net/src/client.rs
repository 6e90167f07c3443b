//! Breaker-gated network client.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::watch;
use syncline_proto::{
    CollectionKey, Credentials, FetchResponse, MutationResponse, PendingAction, TokenGrant,
};

use crate::breaker::{BreakerSnapshot, CircuitBreaker};
use crate::config::NetConfig;
use crate::error::{NetError, NetResult};
use crate::transport::Transport;

/// Statistics about network activity.
#[derive(Debug, Clone, Default)]
pub struct NetStats {
    /// Calls that reached the transport.
    pub calls_issued: u64,
    /// Calls refused by the open breaker without I/O.
    pub fast_failures: u64,
    /// Immediate read retries performed.
    pub retries: u64,
    /// Authorization failures observed.
    pub auth_failures: u64,
    /// Validation failures observed.
    pub validation_failures: u64,
    /// Transient failures and timeouts observed.
    pub transient_failures: u64,
}

/// A network client wrapping a [`Transport`] with failure isolation.
///
/// Every call is gated by the circuit breaker and bounded by the
/// configured timeout. Idempotent reads additionally get a short run of
/// immediate retries; writes never do, their retry story is the
/// pending-action queue.
///
/// The client publishes a connectivity signal through a watch channel:
/// `false` while the breaker refuses traffic, flipping to `true` when a
/// call succeeds again. The sync engine uses the rising edge to trigger
/// an immediate drain pass.
pub struct NetClient<T: Transport> {
    transport: Arc<T>,
    config: NetConfig,
    breaker: CircuitBreaker,
    availability_tx: watch::Sender<bool>,
    stats: RwLock<NetStats>,
}

impl<T: Transport> NetClient<T> {
    /// Creates a client around a transport.
    #[must_use]
    pub fn new(transport: Arc<T>, config: NetConfig) -> Self {
        let breaker = CircuitBreaker::new(config.breaker.clone());
        let (availability_tx, _) = watch::channel(true);
        Self {
            transport,
            config,
            breaker,
            availability_tx,
            stats: RwLock::new(NetStats::default()),
        }
    }

    /// Returns a receiver for the connectivity signal.
    ///
    /// The current value is `true` when calls are being issued and `false`
    /// while the breaker refuses traffic.
    #[must_use]
    pub fn availability(&self) -> watch::Receiver<bool> {
        self.availability_tx.subscribe()
    }

    /// Returns `true` if a call issued now would be allowed to attempt
    /// network I/O.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.breaker.state(Instant::now()).allows_calls()
    }

    /// Returns a diagnostic snapshot of the breaker.
    #[must_use]
    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot(Instant::now())
    }

    /// Returns a copy of the accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> NetStats {
        self.stats.read().clone()
    }

    /// Exchanges credentials for a token.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Auth`] on bad credentials and the usual
    /// transient classes when the server is unreachable.
    pub async fn login(&self, credentials: &Credentials) -> NetResult<TokenGrant> {
        self.call_write("login", || self.transport.login(credentials))
            .await
    }

    /// Exchanges the current token for a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Auth`] when the token is no longer accepted.
    pub async fn refresh_token(&self, token: &str) -> NetResult<TokenGrant> {
        self.call_write("refresh_token", || self.transport.refresh_token(token))
            .await
    }

    /// Fetches one collection, retrying transient failures a few times.
    ///
    /// # Errors
    ///
    /// Returns the last failure once the retry budget is spent.
    pub async fn fetch_collection(
        &self,
        token: &str,
        key: &CollectionKey,
    ) -> NetResult<FetchResponse> {
        self.call_read("fetch_collection", || {
            self.transport.fetch_collection(token, key)
        })
        .await
    }

    /// Applies one mutation on the server.
    ///
    /// Writes get exactly one attempt per call; an indeterminate failure
    /// is the caller's cue to enqueue the action.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Validation`] when the server definitively
    /// rejects the mutation.
    pub async fn apply_action(
        &self,
        token: &str,
        action: &PendingAction,
    ) -> NetResult<MutationResponse> {
        self.call_write("apply_action", || {
            self.transport.apply_action(token, action)
        })
        .await
    }

    async fn call_write<R, Fut>(
        &self,
        op: &'static str,
        attempt: impl FnOnce() -> Fut,
    ) -> NetResult<R>
    where
        Fut: Future<Output = NetResult<R>>,
    {
        self.dispatch(op, attempt()).await
    }

    async fn call_read<R, Fut>(
        &self,
        op: &'static str,
        mut attempt: impl FnMut() -> Fut,
    ) -> NetResult<R>
    where
        Fut: Future<Output = NetResult<R>>,
    {
        let retry = &self.config.read_retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut last_error = None;

        for index in 0..max_attempts {
            if index > 0 {
                tokio::time::sleep(retry.delay_for_attempt(index)).await;
                self.stats.write().retries += 1;
            }

            match self.dispatch(op, attempt()).await {
                Ok(value) => return Ok(value),
                // Only real I/O failures are worth an immediate retry; a
                // refused call would be refused again
                Err(e) if e.counts_as_breaker_failure() && index + 1 < max_attempts => {
                    tracing::debug!(op, attempt = index + 1, error = %e, "read attempt failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(NetError::Timeout))
    }

    /// One gated, timed attempt.
    async fn dispatch<R>(
        &self,
        op: &'static str,
        fut: impl Future<Output = NetResult<R>>,
    ) -> NetResult<R> {
        if !self.breaker.try_acquire(Instant::now()) {
            self.stats.write().fast_failures += 1;
            tracing::debug!(op, "refusing call while circuit is open");
            return Err(NetError::CircuitOpen);
        }

        self.stats.write().calls_issued += 1;
        let outcome = match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(NetError::Timeout),
        };

        match &outcome {
            Ok(_) => self.settle(true),
            Err(e) => {
                {
                    let mut stats = self.stats.write();
                    match e {
                        NetError::Auth { .. } => stats.auth_failures += 1,
                        NetError::Validation { .. } => stats.validation_failures += 1,
                        NetError::Transient { .. } | NetError::Timeout => {
                            stats.transient_failures += 1;
                        }
                        NetError::CircuitOpen => {}
                    }
                }
                tracing::debug!(op, error = %e, "call failed");
                self.settle(!e.counts_as_breaker_failure());
            }
        }

        outcome
    }

    /// Reports a call outcome to the breaker and republishes availability.
    fn settle(&self, healthy: bool) {
        if healthy {
            self.breaker.record_success();
        } else {
            self.breaker.record_failure(Instant::now());
        }

        let available = self.breaker.state(Instant::now()).allows_calls();
        self.availability_tx.send_if_modified(|current| {
            if *current == available {
                false
            } else {
                *current = available;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerState;
    use crate::config::{BreakerConfig, RetryConfig};
    use crate::transport::MockTransport;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;
    use syncline_proto::{ActionPayload, RecordDoc, UserSummary};

    fn grant() -> TokenGrant {
        let now = Utc::now();
        TokenGrant {
            token: "tok-1".into(),
            issued_at: now,
            expires_at: now + ChronoDuration::days(7),
            user: UserSummary::new("u1", "Dana", "member"),
        }
    }

    fn fast_config() -> NetConfig {
        NetConfig::default()
            .with_timeout(Duration::from_millis(200))
            .with_read_retry(
                RetryConfig::new(3)
                    .with_initial_delay(Duration::from_millis(1))
                    .with_max_delay(Duration::from_millis(2))
                    .without_jitter(),
            )
    }

    fn action() -> PendingAction {
        PendingAction::new("posts", "p1", ActionPayload::Delete, Utc::now())
    }

    #[tokio::test]
    async fn read_retries_until_success() {
        let transport = Arc::new(MockTransport::new());
        transport.set_fetch_response(FetchResponse::new(vec![RecordDoc::new(
            "p1",
            serde_json::json!({"title": "hello"}),
        )]));
        transport.fail_times(NetError::transient("refused"), 2);

        let client = NetClient::new(Arc::clone(&transport), fast_config());
        let response = client
            .fetch_collection("tok", &CollectionKey::new("posts"))
            .await
            .unwrap();

        assert_eq!(response.items.len(), 1);
        assert_eq!(transport.calls(), 3);
        assert_eq!(client.stats().retries, 2);
    }

    #[tokio::test]
    async fn read_retry_budget_is_finite() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_always(NetError::transient("down"));

        let client = NetClient::new(Arc::clone(&transport), fast_config());
        let result = client
            .fetch_collection("tok", &CollectionKey::new("posts"))
            .await;

        assert!(matches!(result, Err(NetError::Transient { .. })));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn writes_never_retry() {
        let transport = Arc::new(MockTransport::new());
        transport.set_mutation_response(MutationResponse::empty());
        transport.fail_times(NetError::transient("refused"), 1);

        let client = NetClient::new(Arc::clone(&transport), fast_config());
        let result = client.apply_action("tok", &action()).await;

        assert!(matches!(result, Err(NetError::Transient { .. })));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn breaker_opens_and_fast_fails() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_always(NetError::transient("down"));

        let config = fast_config().with_breaker(
            BreakerConfig::default()
                .with_failure_threshold(2)
                .with_reset_timeout(Duration::from_secs(60)),
        );
        let client = NetClient::new(Arc::clone(&transport), config);

        // Two write failures trip the threshold-2 breaker
        let _ = client.apply_action("tok", &action()).await;
        let _ = client.apply_action("tok", &action()).await;
        assert_eq!(client.breaker_snapshot().state, BreakerState::Open);

        // The next call is refused without reaching the transport
        let result = client.apply_action("tok", &action()).await;
        assert_eq!(result, Err(NetError::CircuitOpen));
        assert_eq!(transport.calls(), 2);
        assert_eq!(client.stats().fast_failures, 1);
        assert!(!client.is_available());
    }

    #[tokio::test]
    async fn auth_and_validation_do_not_trip_breaker() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_always(NetError::auth("expired"));

        let client = NetClient::new(Arc::clone(&transport), fast_config());
        for _ in 0..5 {
            let result = client.apply_action("tok", &action()).await;
            assert!(matches!(result, Err(NetError::Auth { .. })));
        }

        assert_eq!(client.breaker_snapshot().state, BreakerState::Closed);
        assert_eq!(transport.calls(), 5);
        assert_eq!(client.stats().auth_failures, 5);
    }

    #[tokio::test]
    async fn availability_flips_on_breaker_transitions() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_times(NetError::transient("down"), 2);
        transport.set_mutation_response(MutationResponse::empty());

        // Zero reset timeout lets the trial through immediately
        let config = fast_config().with_breaker(
            BreakerConfig::default()
                .with_failure_threshold(2)
                .with_reset_timeout(Duration::ZERO),
        );
        let client = NetClient::new(Arc::clone(&transport), config);
        let availability = client.availability();
        assert!(*availability.borrow());

        let _ = client.apply_action("tok", &action()).await;
        let _ = client.apply_action("tok", &action()).await;
        assert!(!*availability.borrow());

        // Trial call succeeds and restores availability
        client.apply_action("tok", &action()).await.unwrap();
        assert!(*availability.borrow());
    }

    #[tokio::test]
    async fn slow_transport_times_out() {
        struct StalledTransport;

        #[async_trait]
        impl Transport for StalledTransport {
            async fn login(&self, _credentials: &Credentials) -> NetResult<TokenGrant> {
                std::future::pending().await
            }

            async fn refresh_token(&self, _token: &str) -> NetResult<TokenGrant> {
                std::future::pending().await
            }

            async fn fetch_collection(
                &self,
                _token: &str,
                _key: &CollectionKey,
            ) -> NetResult<FetchResponse> {
                std::future::pending().await
            }

            async fn apply_action(
                &self,
                _token: &str,
                _action: &PendingAction,
            ) -> NetResult<MutationResponse> {
                std::future::pending().await
            }
        }

        let config = fast_config().with_timeout(Duration::from_millis(20));
        let client = NetClient::new(Arc::new(StalledTransport), config);

        let result = client.apply_action("tok", &action()).await;
        assert_eq!(result, Err(NetError::Timeout));
        assert_eq!(client.stats().transient_failures, 1);
    }

    #[tokio::test]
    async fn login_returns_grant() {
        let transport = Arc::new(MockTransport::new());
        transport.set_grant(grant());

        let client = NetClient::new(Arc::clone(&transport), fast_config());
        let granted = client.login(&Credentials::new("dana", "pw")).await.unwrap();
        assert_eq!(granted.user.display_name, "Dana");
    }
}
