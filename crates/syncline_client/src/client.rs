//! The assembled client facade.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use syncline_engine::{
    CollectionSnapshot, DrainReport, EngineEvent, EngineStats, MutateOutcome, SyncEngine,
};
use syncline_net::{NetClient, NetStats, Transport};
use syncline_proto::{
    ActionId, ActionPayload, CollectionKey, Credentials, PendingAction, QueueCounts, UserSummary,
};
use syncline_session::{
    SessionEvent, SessionManager, SessionState, SessionStats,
};
use syncline_store::{KvStore, RecordStore};
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::scheduler::TaskScheduler;
use crate::tasks;

/// The shared innards of the client, held by the facade and by every
/// background task.
pub(crate) struct ClientCore<T: Transport> {
    pub(crate) config: ClientConfig,
    pub(crate) net: Arc<NetClient<T>>,
    pub(crate) session: Arc<SessionManager<T>>,
    pub(crate) engine: Arc<SyncEngine<T>>,
}

impl<T: Transport> ClientCore<T> {
    /// Engine teardown shared by every forced sign-out path.
    pub(crate) async fn clear_engine_after_sign_out(&self) {
        if let Err(e) = self.engine.clear().await {
            tracing::warn!(error = %e, "failed to clear engine state after sign-out");
        }
    }
}

/// The UI-facing client: session lifecycle, cached reads, optimistic
/// writes, and the background machinery that keeps both converging with
/// the server.
///
/// One instance composes a [`SessionManager`], a [`SyncEngine`], and a
/// shared [`NetClient`] over a caller-provided [`Transport`]. While a
/// session is active, four named background tasks run under the
/// [`TaskScheduler`]: the idle watchdog, the proactive token refresh, the
/// queue drain loop, and the collection refresh loop. All four are torn
/// down on logout and terminate themselves when the session ends for any
/// other reason.
pub struct SynclineClient<T: Transport> {
    core: Arc<ClientCore<T>>,
    scheduler: Mutex<TaskScheduler>,
}

impl<T: Transport + 'static> SynclineClient<T> {
    /// Assembles a client over the given transport and stores.
    pub fn new(
        config: ClientConfig,
        transport: Arc<T>,
        kv: Arc<dyn KvStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let net = Arc::new(NetClient::new(transport, config.net.clone()));
        let session = Arc::new(SessionManager::new(
            config.session.clone(),
            Arc::clone(&net),
            kv,
        ));
        let engine = Arc::new(SyncEngine::new(
            config.engine.clone(),
            Arc::clone(&net),
            records,
        ));
        Self {
            core: Arc::new(ClientCore {
                config,
                net,
                session,
                engine,
            }),
            scheduler: Mutex::new(TaskScheduler::new()),
        }
    }

    // --- session lifecycle ---

    /// Exchanges credentials for a session and starts the background
    /// tasks.
    ///
    /// Any engine state left over from an earlier session is dropped
    /// first; a new session starts with an empty cache and queue.
    ///
    /// # Errors
    ///
    /// Returns the session layer's error when the server rejects the
    /// credentials or cannot be reached.
    pub async fn login(&self, credentials: &Credentials) -> ClientResult<UserSummary> {
        self.core.engine.clear().await.map_err(ClientError::Engine)?;
        let user = self.core.session.login(credentials, Utc::now()).await?;
        self.start_tasks();
        Ok(user)
    }

    /// Restores a persisted session after a process restart.
    ///
    /// On success the engine reloads its durable cache and queue and the
    /// background tasks start, so a drain of actions queued before the
    /// restart begins on the first tick. When nothing restorable is found
    /// the orphaned engine mirror is dropped as well.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the durable stores cannot be read. A
    /// corrupted or expired session slot is not an error; it reports as
    /// `Ok(false)`.
    pub async fn restore(&self) -> ClientResult<bool> {
        let restored = self.core.session.restore(Utc::now())?;
        if restored {
            self.core.engine.load().await.map_err(ClientError::Engine)?;
            self.start_tasks();
        } else {
            self.core.engine.clear().await.map_err(ClientError::Engine)?;
        }
        Ok(restored)
    }

    /// Ends the session and drops all local state.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the engine mirror cannot be cleared;
    /// the session itself is already gone by then.
    pub async fn logout(&self) -> ClientResult<()> {
        self.scheduler.lock().shutdown();
        self.core.session.logout();
        self.core.engine.clear().await.map_err(ClientError::Engine)?;
        Ok(())
    }

    /// Cheap synchronous authentication check.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.core.session.is_authenticated(Utc::now())
    }

    /// Returns the current session state.
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.core.session.state()
    }

    /// Returns the signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserSummary> {
        self.core.session.current_user()
    }

    /// Records a user activity event.
    ///
    /// Returns `true` when the event was processed (not throttled away).
    pub fn record_activity(&self) -> bool {
        self.core.session.record_activity(Utc::now())
    }

    /// Forces a token refresh check outside the periodic schedule.
    ///
    /// # Errors
    ///
    /// Returns the terminal session error when the server rejects the
    /// current token; the session is already ended when that happens.
    pub async fn refresh_session_now(&self) -> ClientResult<bool> {
        match self.core.session.poll_refresh(Utc::now()).await {
            Err(e) if e.is_terminal() => {
                self.finish_forced_sign_out().await;
                Err(e.into())
            }
            result => result.map_err(ClientError::Session),
        }
    }

    /// Event feed for session transitions (warning prompts, sign-outs).
    pub fn subscribe_session(&self) -> Receiver<SessionEvent> {
        self.core.session.subscribe()
    }

    // --- reads and writes ---

    /// Synchronous cache read.
    ///
    /// Never blocks on the network; a missing or stale collection is
    /// refreshed in the background and reported as stale meanwhile.
    pub fn get_collection(&self, key: &CollectionKey) -> CollectionSnapshot {
        self.core.engine.get_collection(key, Utc::now())
    }

    /// Applies a mutation with immediate optimistic feedback.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without touching the
    /// network when no session is active; an engine rejection or auth
    /// failure propagates after the cache has been rolled back.
    pub async fn mutate(
        &self,
        resource: impl Into<String>,
        target_id: impl Into<String>,
        payload: ActionPayload,
    ) -> ClientResult<MutateOutcome> {
        let token = self
            .core
            .session
            .token()
            .ok_or(ClientError::NotAuthenticated)?;
        match self
            .core
            .engine
            .mutate(&token, resource, target_id, payload, Utc::now())
            .await
        {
            Err(e) if e.is_auth() => {
                self.finish_rejected_sign_out().await;
                Err(ClientError::Engine(e))
            }
            result => result.map_err(ClientError::Engine),
        }
    }

    /// Event feed for engine activity, including abandoned actions.
    pub fn subscribe_engine(&self) -> Receiver<EngineEvent> {
        self.core.engine.subscribe()
    }

    // --- queue management ---

    /// Forces a drain pass outside the periodic schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] when signed out, or the
    /// engine's auth error when the pass ended the session.
    pub async fn drain_now(&self) -> ClientResult<DrainReport> {
        let token = self
            .core
            .session
            .token()
            .ok_or(ClientError::NotAuthenticated)?;
        match self.core.engine.drain_once(&token, Utc::now()).await {
            Err(e) if e.is_auth() => {
                self.finish_rejected_sign_out().await;
                Err(ClientError::Engine(e))
            }
            result => result.map_err(ClientError::Engine),
        }
    }

    /// Returns per-status queue counts.
    #[must_use]
    pub fn queue_counts(&self) -> QueueCounts {
        self.core.engine.queue_counts()
    }

    /// Returns the abandoned actions awaiting manual resolution.
    #[must_use]
    pub fn abandoned_actions(&self) -> Vec<PendingAction> {
        self.core.engine.abandoned_actions()
    }

    /// Removes one queued or abandoned action.
    ///
    /// # Errors
    ///
    /// Returns the engine's unknown-action error for a stale ID.
    pub async fn discard_action(&self, id: ActionId) -> ClientResult<PendingAction> {
        self.core
            .engine
            .discard_action(id)
            .await
            .map_err(ClientError::Engine)
    }

    // --- observability ---

    /// Returns `true` while the breaker admits calls.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.core.net.is_available()
    }

    /// Watch channel mirroring backend availability.
    pub fn availability(&self) -> watch::Receiver<bool> {
        self.core.net.availability()
    }

    /// Session-layer statistics.
    #[must_use]
    pub fn session_stats(&self) -> SessionStats {
        self.core.session.stats()
    }

    /// Engine-layer statistics.
    #[must_use]
    pub fn engine_stats(&self) -> EngineStats {
        self.core.engine.stats()
    }

    /// Network-layer statistics.
    #[must_use]
    pub fn net_stats(&self) -> NetStats {
        self.core.net.stats()
    }

    /// Names of the background tasks currently running.
    #[must_use]
    pub fn active_tasks(&self) -> Vec<&'static str> {
        self.scheduler.lock().active_tasks()
    }

    // --- internals ---

    fn start_tasks(&self) {
        let mut scheduler = self.scheduler.lock();
        scheduler.shutdown();
        scheduler.spawn("idle-watch", tasks::idle_watch(Arc::clone(&self.core)));
        scheduler.spawn("token-refresh", tasks::token_refresh(Arc::clone(&self.core)));
        scheduler.spawn("queue-drain", tasks::queue_drain(Arc::clone(&self.core)));
        scheduler.spawn(
            "collection-fetch",
            tasks::collection_fetch(Arc::clone(&self.core)),
        );
    }

    /// Teardown after the session layer already handled a rejection.
    async fn finish_rejected_sign_out(&self) {
        self.core.session.handle_auth_rejection();
        self.scheduler.lock().shutdown();
        self.core.clear_engine_after_sign_out().await;
    }

    /// Teardown after a session-layer call ended the session itself.
    async fn finish_forced_sign_out(&self) {
        self.scheduler.lock().shutdown();
        self.core.clear_engine_after_sign_out().await;
    }
}
