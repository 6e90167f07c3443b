//! Transport layer abstraction for backend calls.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use syncline_proto::{
    CollectionKey, Credentials, FetchResponse, MutationResponse, PendingAction, TokenGrant,
};

use crate::error::{NetError, NetResult};

/// A transport performs the actual I/O against the backend.
///
/// This trait abstracts the wire (HTTP, in-process test double, ...) and
/// returns raw outcomes: it applies no timeout, no retry, and no breaker
/// gating. [`crate::NetClient`] adds those around every call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Exchanges credentials for a token.
    async fn login(&self, credentials: &Credentials) -> NetResult<TokenGrant>;

    /// Exchanges the current token for a fresh one.
    async fn refresh_token(&self, token: &str) -> NetResult<TokenGrant>;

    /// Fetches the records of one collection.
    async fn fetch_collection(&self, token: &str, key: &CollectionKey)
        -> NetResult<FetchResponse>;

    /// Applies one mutation on the server.
    ///
    /// The action's ID doubles as an idempotency key, so re-sending an
    /// action the server already applied must be harmless.
    async fn apply_action(&self, token: &str, action: &PendingAction)
        -> NetResult<MutationResponse>;
}

/// A mock transport for testing.
///
/// Sticky responses are returned for every call; `fail_times` injects a
/// run of failures ahead of them. Calls are counted so tests can assert
/// how many real network attempts a scenario produced.
#[derive(Debug, Default)]
pub struct MockTransport {
    grant: Mutex<Option<TokenGrant>>,
    fetch: Mutex<Option<FetchResponse>>,
    mutation: Mutex<Option<MutationResponse>>,
    failure: Mutex<Option<NetError>>,
    fail_remaining: AtomicU32,
    calls: AtomicU32,
}

impl MockTransport {
    /// Creates a mock transport with no responses configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the grant returned by `login` and `refresh_token`.
    pub fn set_grant(&self, grant: TokenGrant) {
        *self.grant.lock() = Some(grant);
    }

    /// Sets the response returned by `fetch_collection`.
    pub fn set_fetch_response(&self, response: FetchResponse) {
        *self.fetch.lock() = Some(response);
    }

    /// Sets the response returned by `apply_action`.
    pub fn set_mutation_response(&self, response: MutationResponse) {
        *self.mutation.lock() = Some(response);
    }

    /// Makes the next `times` calls fail with `error` before sticky
    /// responses resume.
    pub fn fail_times(&self, error: NetError, times: u32) {
        *self.failure.lock() = Some(error);
        self.fail_remaining.store(times, Ordering::SeqCst);
    }

    /// Makes every call fail with `error` until changed.
    pub fn fail_always(&self, error: NetError) {
        self.fail_times(error, u32::MAX);
    }

    /// Returns the number of calls that reached this transport.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Option<NetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            }
            return Some(
                self.failure
                    .lock()
                    .clone()
                    .unwrap_or_else(|| NetError::transient("mock failure")),
            );
        }
        None
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn login(&self, _credentials: &Credentials) -> NetResult<TokenGrant> {
        if let Some(error) = self.next_outcome() {
            return Err(error);
        }
        self.grant
            .lock()
            .clone()
            .ok_or_else(|| NetError::transient("no mock grant set"))
    }

    async fn refresh_token(&self, _token: &str) -> NetResult<TokenGrant> {
        if let Some(error) = self.next_outcome() {
            return Err(error);
        }
        self.grant
            .lock()
            .clone()
            .ok_or_else(|| NetError::transient("no mock grant set"))
    }

    async fn fetch_collection(
        &self,
        _token: &str,
        _key: &CollectionKey,
    ) -> NetResult<FetchResponse> {
        if let Some(error) = self.next_outcome() {
            return Err(error);
        }
        self.fetch
            .lock()
            .clone()
            .ok_or_else(|| NetError::transient("no mock fetch response set"))
    }

    async fn apply_action(
        &self,
        _token: &str,
        _action: &PendingAction,
    ) -> NetResult<MutationResponse> {
        if let Some(error) = self.next_outcome() {
            return Err(error);
        }
        self.mutation
            .lock()
            .clone()
            .ok_or_else(|| NetError::transient("no mock mutation response set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use syncline_proto::UserSummary;

    fn grant() -> TokenGrant {
        let now = Utc::now();
        TokenGrant {
            token: "tok-1".into(),
            issued_at: now,
            expires_at: now + Duration::days(7),
            user: UserSummary::new("u1", "Dana", "member"),
        }
    }

    #[tokio::test]
    async fn mock_returns_sticky_grant() {
        let transport = MockTransport::new();
        transport.set_grant(grant());

        let credentials = Credentials::new("dana", "pw");
        let first = transport.login(&credentials).await.unwrap();
        let second = transport.login(&credentials).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn mock_unconfigured_endpoint_fails_transient() {
        let transport = MockTransport::new();
        let result = transport
            .fetch_collection("tok", &CollectionKey::new("posts"))
            .await;
        assert!(matches!(result, Err(NetError::Transient { .. })));
    }

    #[tokio::test]
    async fn mock_fail_times_then_recovers() {
        let transport = MockTransport::new();
        transport.set_grant(grant());
        transport.fail_times(NetError::Timeout, 2);

        let credentials = Credentials::new("dana", "pw");
        assert_eq!(
            transport.login(&credentials).await,
            Err(NetError::Timeout)
        );
        assert_eq!(
            transport.login(&credentials).await,
            Err(NetError::Timeout)
        );
        assert!(transport.login(&credentials).await.is_ok());
        assert_eq!(transport.calls(), 3);
    }
}
