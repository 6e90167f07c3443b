//! A transport whose outcomes are programmed per endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use syncline_net::{NetError, NetResult, Transport};
use syncline_proto::{
    ActionId, CollectionKey, Credentials, FetchResponse, MutationResponse, PendingAction,
    TokenGrant,
};

use crate::fixtures::token_grant;

#[derive(Debug, Default)]
struct CallCounts {
    login: AtomicU32,
    refresh: AtomicU32,
    fetch: AtomicU32,
    apply: AtomicU32,
}

/// A transport whose responses are scripted per endpoint.
///
/// Each endpoint consumes outcomes from its own queue; when the queue is
/// empty the endpoint falls back to a canned success (a valid grant, an
/// empty fetch, an empty mutation ack). Calls are counted per endpoint,
/// and every applied action ID is logged in call order so ordering
/// assertions can replay what the server saw.
#[derive(Default)]
pub struct ScriptedTransport {
    login: Mutex<VecDeque<NetResult<TokenGrant>>>,
    refresh: Mutex<VecDeque<NetResult<TokenGrant>>>,
    fetch: Mutex<VecDeque<NetResult<FetchResponse>>>,
    apply: Mutex<VecDeque<NetResult<MutationResponse>>>,
    applied: Mutex<Vec<ActionId>>,
    counts: CallCounts,
}

impl ScriptedTransport {
    /// Creates a transport with empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one login outcome.
    pub fn script_login(&self, outcome: NetResult<TokenGrant>) {
        self.login.lock().push_back(outcome);
    }

    /// Queues one refresh outcome.
    pub fn script_refresh(&self, outcome: NetResult<TokenGrant>) {
        self.refresh.lock().push_back(outcome);
    }

    /// Queues one fetch outcome.
    pub fn script_fetch(&self, outcome: NetResult<FetchResponse>) {
        self.fetch.lock().push_back(outcome);
    }

    /// Queues one mutation outcome.
    pub fn script_apply(&self, outcome: NetResult<MutationResponse>) {
        self.apply.lock().push_back(outcome);
    }

    /// Queues `times` consecutive fetch failures.
    pub fn fail_fetch_times(&self, error: &NetError, times: usize) {
        let mut queue = self.fetch.lock();
        for _ in 0..times {
            queue.push_back(Err(error.clone()));
        }
    }

    /// Queues `times` consecutive mutation failures.
    pub fn fail_apply_times(&self, error: &NetError, times: usize) {
        let mut queue = self.apply.lock();
        for _ in 0..times {
            queue.push_back(Err(error.clone()));
        }
    }

    /// Number of login calls observed.
    pub fn login_calls(&self) -> u32 {
        self.counts.login.load(Ordering::SeqCst)
    }

    /// Number of refresh calls observed.
    pub fn refresh_calls(&self) -> u32 {
        self.counts.refresh.load(Ordering::SeqCst)
    }

    /// Number of fetch calls observed.
    pub fn fetch_calls(&self) -> u32 {
        self.counts.fetch.load(Ordering::SeqCst)
    }

    /// Number of mutation calls observed.
    pub fn apply_calls(&self) -> u32 {
        self.counts.apply.load(Ordering::SeqCst)
    }

    /// Total calls across all endpoints.
    pub fn total_calls(&self) -> u32 {
        self.login_calls() + self.refresh_calls() + self.fetch_calls() + self.apply_calls()
    }

    /// Action IDs in the order their apply calls arrived.
    pub fn applied_actions(&self) -> Vec<ActionId> {
        self.applied.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn login(&self, _credentials: &Credentials) -> NetResult<TokenGrant> {
        self.counts.login.fetch_add(1, Ordering::SeqCst);
        self.login
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(token_grant("token-1", Utc::now())))
    }

    async fn refresh_token(&self, _token: &str) -> NetResult<TokenGrant> {
        self.counts.refresh.fetch_add(1, Ordering::SeqCst);
        self.refresh
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(token_grant("token-refreshed", Utc::now())))
    }

    async fn fetch_collection(
        &self,
        _token: &str,
        _key: &CollectionKey,
    ) -> NetResult<FetchResponse> {
        self.counts.fetch.fetch_add(1, Ordering::SeqCst);
        self.fetch
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(FetchResponse::new(Vec::new())))
    }

    async fn apply_action(
        &self,
        _token: &str,
        action: &PendingAction,
    ) -> NetResult<MutationResponse> {
        self.counts.apply.fetch_add(1, Ordering::SeqCst);
        self.applied.lock().push(action.id);
        self.apply
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(MutationResponse::empty()))
    }
}
