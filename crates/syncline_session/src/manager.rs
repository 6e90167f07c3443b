//! The session manager.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use syncline_net::{NetClient, NetError, Transport};
use syncline_proto::{Credentials, EventFeed, UserSummary};
use syncline_store::KvStore;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::session::{Session, SessionEvent, SessionState, SignOutReason};
use crate::snapshot;

/// Key of the durable session slot in the key/value store.
pub const SESSION_SLOT: &str = "session";

/// Statistics about session lifecycle activity.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Successful logins.
    pub logins: u64,
    /// Sessions restored from the durable slot.
    pub restores: u64,
    /// Activity events that survived throttling.
    pub activity_events: u64,
    /// Idle warnings issued.
    pub warnings_issued: u64,
    /// Sessions ended by the idle timeout.
    pub idle_timeouts: u64,
    /// Tokens exchanged in place.
    pub token_refreshes: u64,
    /// Refresh attempts that failed without ending the session.
    pub refresh_failures: u64,
    /// Sessions ended by a server authorization rejection.
    pub auth_rejections: u64,
}

struct Inner {
    state: SessionState,
    session: Option<Session>,
}

/// Owns the one authoritative [`Session`] and drives its state machine.
///
/// All time-sensitive operations take an explicit `now` so the idle and
/// refresh machinery is deterministic under test; production callers pass
/// [`Utc::now`].
///
/// The manager holds its lock only across synchronous sections. Methods
/// that perform network I/O snapshot what they need, release the lock,
/// await, then re-validate before applying the result, since the session
/// may have been replaced or cleared in the meantime.
pub struct SessionManager<T: Transport> {
    config: SessionConfig,
    net: Arc<NetClient<T>>,
    store: Arc<dyn KvStore>,
    inner: RwLock<Inner>,
    events: EventFeed<SessionEvent>,
    stats: RwLock<SessionStats>,
}

impl<T: Transport> SessionManager<T> {
    /// Creates a manager in the `Unauthenticated` state.
    pub fn new(config: SessionConfig, net: Arc<NetClient<T>>, store: Arc<dyn KvStore>) -> Self {
        Self {
            config,
            net,
            store,
            inner: RwLock::new(Inner {
                state: SessionState::Unauthenticated,
                session: None,
            }),
            events: EventFeed::new(),
            stats: RwLock::new(SessionStats::default()),
        }
    }

    /// Returns the manager's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.read().state
    }

    /// Returns `true` if a session exists whose token is still valid.
    ///
    /// This is the cheap synchronous check the UI gates requests on. An
    /// expired token answers `false` even before a poll notices.
    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        let inner = self.inner.read();
        inner.state.is_authenticated()
            && inner
                .session
                .as_ref()
                .is_some_and(|session| session.is_token_valid(now))
    }

    /// Returns a copy of the current session, if any.
    pub fn session(&self) -> Option<Session> {
        self.inner.read().session.clone()
    }

    /// Returns the current bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.inner
            .read()
            .session
            .as_ref()
            .map(|session| session.token.clone())
    }

    /// Returns the signed-in user, if any.
    pub fn current_user(&self) -> Option<UserSummary> {
        self.inner
            .read()
            .session
            .as_ref()
            .map(|session| session.user.clone())
    }

    /// Returns a copy of the accumulated statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    /// Subscribes to session lifecycle events.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Exchanges credentials for a session.
    ///
    /// Replaces any existing session on success.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unauthorized`] for rejected credentials and
    /// [`SessionError::Network`] when the server cannot be reached.
    pub async fn login(
        &self,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> SessionResult<UserSummary> {
        let grant = self.net.login(credentials).await?;
        let session = Session::from_grant(grant, now);
        let user = session.user.clone();

        {
            let mut guard = self.inner.write();
            guard.state = SessionState::Active;
            guard.session = Some(session.clone());
        }
        self.persist(&session);
        self.stats.write().logins += 1;
        tracing::info!(user = %user.id, "signed in");
        self.events.emit(SessionEvent::Activated {
            user_id: user.id.clone(),
        });
        Ok(user)
    }

    /// Ends the current session and clears the durable slot.
    ///
    /// Signing out while already signed out is a no-op.
    pub fn logout(&self) {
        let had_session = {
            let mut guard = self.inner.write();
            let had = guard.session.is_some();
            guard.state = SessionState::Unauthenticated;
            guard.session = None;
            had
        };
        self.clear_slot();
        if had_session {
            tracing::info!("signed out");
            self.events.emit(SessionEvent::SignedOut {
                reason: SignOutReason::Logout,
            });
        }
    }

    /// Restores a persisted session, if one survives the validity checks.
    ///
    /// A snapshot whose token has expired, or whose idle gap already
    /// exceeds the timeout, is discarded. A snapshot inside the warning
    /// zone restores straight into `Warning`. An unreadable slot is
    /// dropped and reported as signed out.
    ///
    /// Returns `true` if a session was restored.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] only for I/O failures reading the
    /// slot; corruption is handled internally.
    pub fn restore(&self, now: DateTime<Utc>) -> SessionResult<bool> {
        let Some(bytes) = self.store.get(SESSION_SLOT)? else {
            return Ok(false);
        };

        let session = match snapshot::open(&bytes) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unreadable session slot");
                self.clear_slot();
                return Ok(false);
            }
        };

        if !session.is_token_valid(now) {
            tracing::info!("persisted token expired, discarding session");
            self.clear_slot();
            return Ok(false);
        }
        if session.idle_for(now) >= self.config.idle_timeout {
            tracing::info!("persisted session idle past timeout, discarding");
            self.clear_slot();
            return Ok(false);
        }

        let state = if session.idle_for(now) >= self.config.warning_threshold() {
            SessionState::Warning
        } else {
            SessionState::Active
        };
        let user_id = session.user.id.clone();
        let deadline = session.last_activity_at + self.config.idle_timeout;

        {
            let mut guard = self.inner.write();
            guard.state = state;
            guard.session = Some(session);
        }
        self.stats.write().restores += 1;
        tracing::info!(user = %user_id, %state, "restored persisted session");
        self.events.emit(SessionEvent::Activated { user_id });
        if state == SessionState::Warning {
            self.events.emit(SessionEvent::IdleWarning { deadline });
        }
        Ok(true)
    }

    /// Records a user-activity signal.
    ///
    /// Events arriving within the throttle interval of the last processed
    /// one are dropped wholesale, so the durable slot is rewritten at most
    /// once per interval. A processed event resets the idle clock and
    /// clears a pending warning.
    ///
    /// Returns `true` if the event was processed.
    pub fn record_activity(&self, now: DateTime<Utc>) -> bool {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        if now - session.last_activity_at < self.config.activity_throttle {
            return false;
        }

        session.touch(now);
        let cleared_warning = inner.state == SessionState::Warning;
        inner.state = SessionState::Active;
        let user_id = session.user.id.clone();
        let updated = session.clone();
        drop(guard);

        self.persist(&updated);
        self.stats.write().activity_events += 1;
        if cleared_warning {
            tracing::debug!(user = %user_id, "activity cleared idle warning");
            self.events.emit(SessionEvent::Activated { user_id });
        }
        true
    }

    /// Advances the idle state machine.
    ///
    /// Crossing the warning threshold emits [`SessionEvent::IdleWarning`]
    /// once per idle stretch; crossing the timeout ends the session,
    /// clears the durable slot, and emits a `SignedOut` event.
    pub fn poll_idle(&self, now: DateTime<Utc>) -> SessionState {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let Some(session) = inner.session.as_ref() else {
            return SessionState::Unauthenticated;
        };

        let idle = session.idle_for(now);
        if idle >= self.config.idle_timeout {
            inner.state = SessionState::Unauthenticated;
            inner.session = None;
            drop(guard);

            self.clear_slot();
            self.stats.write().idle_timeouts += 1;
            tracing::info!("session expired after idle timeout");
            self.events.emit(SessionEvent::SignedOut {
                reason: SignOutReason::IdleTimeout,
            });
            return SessionState::Unauthenticated;
        }

        if idle >= self.config.warning_threshold() && inner.state == SessionState::Active {
            let deadline = session.last_activity_at + self.config.idle_timeout;
            inner.state = SessionState::Warning;
            drop(guard);

            self.stats.write().warnings_issued += 1;
            tracing::debug!(%deadline, "session idle warning issued");
            self.events.emit(SessionEvent::IdleWarning { deadline });
            return SessionState::Warning;
        }

        inner.state
    }

    /// Refreshes the token if it is due to expire within the refresh
    /// window.
    ///
    /// A transient failure keeps the still-valid token and reports
    /// `Ok(false)`; the next scheduled check tries again. An authorization
    /// failure ends the session.
    ///
    /// Returns `true` if the token was exchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unauthorized`] when the server rejects the
    /// token; the session is already cleared when this surfaces.
    pub async fn poll_refresh(&self, now: DateTime<Utc>) -> SessionResult<bool> {
        let token = {
            let inner = self.inner.read();
            let Some(session) = inner.session.as_ref() else {
                return Ok(false);
            };
            if !session.token_expires_within(now, self.config.refresh_window) {
                return Ok(false);
            }
            session.token.clone()
        };

        match self.net.refresh_token(&token).await {
            Ok(grant) => {
                let applied = {
                    let mut guard = self.inner.write();
                    match guard.session.as_mut() {
                        // The session may have been replaced or cleared
                        // while the call was out
                        Some(session) if session.token == token => {
                            session.apply_grant(grant);
                            Some(session.clone())
                        }
                        _ => None,
                    }
                };
                match applied {
                    Some(session) => {
                        self.persist(&session);
                        self.stats.write().token_refreshes += 1;
                        tracing::info!(expires_at = %session.token_expires_at, "token refreshed");
                        self.events.emit(SessionEvent::TokenRefreshed {
                            expires_at: session.token_expires_at,
                        });
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            Err(NetError::Auth { message }) => {
                self.sign_out_rejected(&token);
                Err(SessionError::Unauthorized { message })
            }
            Err(e) => {
                self.stats.write().refresh_failures += 1;
                tracing::warn!(error = %e, "token refresh failed, keeping current token");
                Ok(false)
            }
        }
    }

    /// Ends the session after a server authorization rejection.
    ///
    /// Call this when any authorized call answers 401/403. Takes effect
    /// immediately, regardless of idle state or breaker state. Idempotent
    /// when already signed out.
    pub fn handle_auth_rejection(&self) {
        let ended = {
            let mut guard = self.inner.write();
            if guard.session.is_none() {
                false
            } else {
                guard.state = SessionState::Unauthenticated;
                guard.session = None;
                true
            }
        };
        if ended {
            self.clear_slot();
            self.stats.write().auth_rejections += 1;
            tracing::warn!("authorization failure, session terminated");
            self.events.emit(SessionEvent::SignedOut {
                reason: SignOutReason::AuthRejected,
            });
        }
    }

    /// Ends the session only if `rejected_token` is still the current one.
    fn sign_out_rejected(&self, rejected_token: &str) {
        let current = self
            .inner
            .read()
            .session
            .as_ref()
            .map(|session| session.token.clone());
        if current.as_deref() == Some(rejected_token) {
            self.handle_auth_rejection();
        }
    }

    /// Mirrors the session into the durable slot, best effort.
    ///
    /// The in-memory session stays authoritative, so a write failure is
    /// logged and absorbed.
    fn persist(&self, session: &Session) {
        match snapshot::seal(session) {
            Ok(bytes) => {
                if let Err(e) = self.store.put(SESSION_SLOT, &bytes) {
                    tracing::warn!(error = %e, "failed to persist session slot");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode session slot"),
        }
    }

    fn clear_slot(&self) {
        if let Err(e) = self.store.remove(SESSION_SLOT) {
            tracing::warn!(error = %e, "failed to clear session slot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use syncline_net::{MockTransport, NetConfig};
    use syncline_proto::TokenGrant;
    use syncline_store::MemoryKvStore;

    fn grant(now: DateTime<Utc>, token: &str) -> TokenGrant {
        TokenGrant {
            token: token.into(),
            issued_at: now,
            expires_at: now + Duration::days(7),
            user: UserSummary::new("u1", "Dana", "member"),
        }
    }

    fn setup() -> (
        Arc<MockTransport>,
        Arc<MemoryKvStore>,
        SessionManager<MockTransport>,
    ) {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(MemoryKvStore::new());
        let net = Arc::new(NetClient::new(Arc::clone(&transport), NetConfig::default()));
        let manager = SessionManager::new(
            SessionConfig::default(),
            net,
            Arc::clone(&store) as Arc<dyn KvStore>,
        );
        (transport, store, manager)
    }

    #[tokio::test]
    async fn login_activates_and_persists() {
        let (transport, store, manager) = setup();
        let now = Utc::now();
        transport.set_grant(grant(now, "tok-a"));
        let events = manager.subscribe();

        let user = manager
            .login(&Credentials::new("dana", "pw"), now)
            .await
            .unwrap();

        assert_eq!(user.id, "u1");
        assert_eq!(manager.state(), SessionState::Active);
        assert!(manager.is_authenticated(now));
        assert!(store.get(SESSION_SLOT).unwrap().is_some());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Activated {
                user_id: "u1".into()
            }
        );
    }

    #[tokio::test]
    async fn login_failure_leaves_signed_out() {
        let (transport, store, manager) = setup();
        transport.fail_always(NetError::auth("bad password"));

        let result = manager.login(&Credentials::new("dana", "nope"), Utc::now()).await;

        assert!(matches!(result, Err(SessionError::Unauthorized { .. })));
        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert!(store.get(SESSION_SLOT).unwrap().is_none());
    }

    #[tokio::test]
    async fn idle_warning_then_activity_resets_timer() {
        let (transport, _store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();
        let events = manager.subscribe();

        // 26 minutes idle with a 25-minute warning threshold
        let warned = manager.poll_idle(t0 + Duration::minutes(26));
        assert_eq!(warned, SessionState::Warning);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::IdleWarning {
                deadline: t0 + Duration::minutes(30)
            }
        );

        // "Stay signed in" click
        let acted_at = t0 + Duration::minutes(26) + Duration::seconds(5);
        assert!(manager.record_activity(acted_at));
        assert_eq!(manager.state(), SessionState::Active);

        // Timer restarts from the click, not from login
        assert_eq!(
            manager.poll_idle(acted_at + Duration::minutes(24)),
            SessionState::Active
        );
        assert_eq!(
            manager.poll_idle(acted_at + Duration::minutes(25)),
            SessionState::Warning
        );
    }

    #[tokio::test]
    async fn idle_timeout_signs_out_and_clears_slot() {
        let (transport, store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();
        let events = manager.subscribe();

        let state = manager.poll_idle(t0 + Duration::minutes(31));

        assert_eq!(state, SessionState::Unauthenticated);
        assert!(!manager.is_authenticated(t0 + Duration::minutes(31)));
        assert!(store.get(SESSION_SLOT).unwrap().is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SignedOut {
                reason: SignOutReason::IdleTimeout
            }
        );
        assert_eq!(manager.stats().idle_timeouts, 1);
    }

    #[tokio::test]
    async fn warning_fires_once_per_idle_stretch() {
        let (transport, _store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();

        manager.poll_idle(t0 + Duration::minutes(26));
        manager.poll_idle(t0 + Duration::minutes(27));
        manager.poll_idle(t0 + Duration::minutes(28));

        assert_eq!(manager.stats().warnings_issued, 1);
    }

    #[tokio::test]
    async fn activity_is_throttled() {
        let (transport, _store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();

        assert!(!manager.record_activity(t0 + Duration::seconds(10)));
        assert!(!manager.record_activity(t0 + Duration::seconds(29)));
        assert!(manager.record_activity(t0 + Duration::seconds(31)));
        assert_eq!(manager.stats().activity_events, 1);
    }

    #[tokio::test]
    async fn restore_roundtrip() {
        let (transport, store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();

        // A second manager sharing the store, as after a reload
        let net = Arc::new(NetClient::new(
            Arc::new(MockTransport::new()),
            NetConfig::default(),
        ));
        let reloaded = SessionManager::new(
            SessionConfig::default(),
            net,
            Arc::clone(&store) as Arc<dyn KvStore>,
        );

        assert!(reloaded.restore(t0 + Duration::minutes(1)).unwrap());
        assert_eq!(reloaded.state(), SessionState::Active);
        assert_eq!(reloaded.current_user().unwrap().id, "u1");
        assert_eq!(reloaded.token().as_deref(), Some("tok-a"));
    }

    #[tokio::test]
    async fn restore_into_warning_zone() {
        let (transport, store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();

        let net = Arc::new(NetClient::new(
            Arc::new(MockTransport::new()),
            NetConfig::default(),
        ));
        let reloaded = SessionManager::new(
            SessionConfig::default(),
            net,
            Arc::clone(&store) as Arc<dyn KvStore>,
        );
        let events = reloaded.subscribe();

        assert!(reloaded.restore(t0 + Duration::minutes(27)).unwrap());
        assert_eq!(reloaded.state(), SessionState::Warning);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::Activated { .. }
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::IdleWarning { .. }
        ));
    }

    #[tokio::test]
    async fn restore_discards_idle_expired_session() {
        let (transport, store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();

        let net = Arc::new(NetClient::new(
            Arc::new(MockTransport::new()),
            NetConfig::default(),
        ));
        let reloaded = SessionManager::new(
            SessionConfig::default(),
            net,
            Arc::clone(&store) as Arc<dyn KvStore>,
        );

        assert!(!reloaded.restore(t0 + Duration::minutes(40)).unwrap());
        assert_eq!(reloaded.state(), SessionState::Unauthenticated);
        assert!(store.get(SESSION_SLOT).unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_discards_corrupted_slot() {
        let (_transport, store, manager) = setup();
        store.put(SESSION_SLOT, b"not a snapshot").unwrap();

        assert!(!manager.restore(Utc::now()).unwrap());
        assert!(store.get(SESSION_SLOT).unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_skips_distant_expiry() {
        let (transport, _store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();
        let calls_after_login = transport.calls();

        // 7-day token, 24-hour window: nothing to do yet
        assert!(!manager.poll_refresh(t0 + Duration::hours(1)).await.unwrap());
        assert_eq!(transport.calls(), calls_after_login);
    }

    #[tokio::test]
    async fn refresh_exchanges_token_in_place() {
        let (transport, _store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();
        let events = manager.subscribe();

        // Inside the 24-hour refresh window of the 7-day token
        let check_at = t0 + Duration::days(6) + Duration::hours(12);
        transport.set_grant(grant(check_at, "tok-b"));

        assert!(manager.poll_refresh(check_at).await.unwrap());
        let session = manager.session().unwrap();
        assert_eq!(session.token, "tok-b");
        // Refresh is not activity
        assert_eq!(session.last_activity_at, t0);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::TokenRefreshed { .. }
        ));
        assert_eq!(manager.stats().token_refreshes, 1);
    }

    #[tokio::test]
    async fn refresh_transient_failure_keeps_session() {
        let (transport, _store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();

        transport.fail_times(NetError::transient("connection refused"), 1);
        let check_at = t0 + Duration::days(6) + Duration::hours(12);

        assert!(!manager.poll_refresh(check_at).await.unwrap());
        assert_eq!(manager.state(), SessionState::Active);
        assert_eq!(manager.token().as_deref(), Some("tok-a"));
        assert_eq!(manager.stats().refresh_failures, 1);
    }

    #[tokio::test]
    async fn refresh_auth_failure_signs_out() {
        let (transport, store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();
        let events = manager.subscribe();

        transport.fail_always(NetError::auth("token revoked"));
        let check_at = t0 + Duration::days(6) + Duration::hours(12);

        let result = manager.poll_refresh(check_at).await;
        assert!(matches!(result, Err(SessionError::Unauthorized { .. })));
        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert!(store.get(SESSION_SLOT).unwrap().is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SignedOut {
                reason: SignOutReason::AuthRejected
            }
        );
    }

    #[tokio::test]
    async fn auth_rejection_hook_ends_session() {
        let (transport, store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();

        manager.handle_auth_rejection();

        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert!(store.get(SESSION_SLOT).unwrap().is_none());
        assert_eq!(manager.stats().auth_rejections, 1);

        // Idempotent when already signed out
        manager.handle_auth_rejection();
        assert_eq!(manager.stats().auth_rejections, 1);
    }

    #[tokio::test]
    async fn logout_clears_everything() {
        let (transport, store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();
        let events = manager.subscribe();

        manager.logout();

        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert!(manager.session().is_none());
        assert!(store.get(SESSION_SLOT).unwrap().is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SignedOut {
                reason: SignOutReason::Logout
            }
        );
    }

    #[tokio::test]
    async fn expired_token_fails_cheap_check() {
        let (transport, _store, manager) = setup();
        let t0 = Utc::now();
        transport.set_grant(grant(t0, "tok-a"));
        manager.login(&Credentials::new("dana", "pw"), t0).await.unwrap();

        assert!(manager.is_authenticated(t0 + Duration::days(6)));
        assert!(!manager.is_authenticated(t0 + Duration::days(8)));
    }
}
