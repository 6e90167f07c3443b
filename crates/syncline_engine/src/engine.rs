//! The offline cache and sync engine.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use syncline_net::{NetClient, NetError, Transport};
use syncline_proto::{
    ActionId, ActionPayload, ActionQueue, ActionStatus, CollectionKey, EventFeed, PendingAction,
    QueueCounts, RecordDoc,
};
use syncline_store::RecordStore;

use crate::cache::{CacheArena, CachedCollection, Freshness};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::persist;

/// Events emitted by the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A queued action was confirmed by the server.
    ActionDelivered {
        /// The delivered action's ID.
        action_id: ActionId,
        /// Resource the action mutated.
        resource: String,
        /// Record the action mutated.
        target_id: String,
    },
    /// A queued action exhausted its retries. The UI should reconcile the
    /// optimistic effect carried in the action.
    ActionAbandoned {
        /// The abandoned action, including its payload.
        action: PendingAction,
    },
    /// A collection was replaced with fresh server content.
    CollectionRefreshed {
        /// The refreshed collection's key.
        key: CollectionKey,
        /// Number of records fetched.
        items: usize,
    },
}

/// What a synchronous cache read returns.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    /// Cached records, possibly carrying optimistic effects.
    pub items: Vec<RecordDoc>,
    /// Whether the items are within the staleness bound.
    pub freshness: Freshness,
}

/// How a mutation resolved from the caller's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum MutateOutcome {
    /// The server confirmed the mutation in the synchronous attempt.
    Applied {
        /// The authoritative record, when the server returned one.
        record: Option<RecordDoc>,
    },
    /// The mutation was accepted locally and queued for delivery.
    Queued {
        /// ID of the queued action.
        action_id: ActionId,
    },
}

impl MutateOutcome {
    /// Returns `true` when the mutation went into the queue.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions attempted this pass.
    pub attempted: usize,
    /// Actions confirmed by the server.
    pub delivered: usize,
    /// Actions that failed and will retry after backoff.
    pub failed: usize,
    /// Actions that hit the retry ceiling this pass.
    pub abandoned: usize,
    /// Set when the pass was skipped because the breaker was open.
    pub skipped_while_open: bool,
}

/// Statistics about engine activity.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Reads answered from a cached collection.
    pub cache_hits: u64,
    /// Reads with nothing cached under the key.
    pub cache_misses: u64,
    /// Collections fetched from the server.
    pub fetches: u64,
    /// Cached collections evicted to make room.
    pub evictions: u64,
    /// Mutations applied optimistically.
    pub optimistic_applies: u64,
    /// Mutations confirmed in their synchronous attempt.
    pub confirmed_writes: u64,
    /// Mutations definitively rejected and rolled back.
    pub rejected_writes: u64,
    /// Mutations queued for later delivery.
    pub actions_queued: u64,
    /// Queued actions delivered.
    pub actions_delivered: u64,
    /// Queued actions abandoned at the retry ceiling.
    pub actions_abandoned: u64,
    /// Drain passes started.
    pub drain_passes: u64,
    /// Drain passes skipped because the breaker refused traffic.
    pub drain_skips: u64,
}

struct EngineState {
    cache: CacheArena,
    queue: ActionQueue,
    refresh_wanted: BTreeSet<CollectionKey>,
}

enum AttemptOutcome {
    Delivered,
    Failed,
    Abandoned,
    Released,
}

/// The offline cache and sync engine.
///
/// Reads are synchronous against the in-memory cache; writes apply
/// optimistically before their network attempt, falling back to the
/// durable queue when the outcome is indeterminate. The engine owns the
/// cache and queue exclusively and mirrors both into the record store so
/// a restart resumes where the last process stopped.
///
/// Like the session manager, the engine is passive: the composition layer
/// drives [`SyncEngine::drain_once`] and [`SyncEngine::flush_refreshes`]
/// on its schedule.
pub struct SyncEngine<T: Transport> {
    config: EngineConfig,
    net: Arc<NetClient<T>>,
    records: Arc<dyn RecordStore>,
    state: RwLock<EngineState>,
    events: EventFeed<EngineEvent>,
    stats: RwLock<EngineStats>,
    drain_gate: tokio::sync::Mutex<()>,
    refresh_signal: tokio::sync::Notify,
}

impl<T: Transport> SyncEngine<T> {
    /// Creates an engine with empty state.
    pub fn new(config: EngineConfig, net: Arc<NetClient<T>>, records: Arc<dyn RecordStore>) -> Self {
        let cache = CacheArena::new(config.cache_capacity);
        Self {
            config,
            net,
            records,
            state: RwLock::new(EngineState {
                cache,
                queue: ActionQueue::new(),
                refresh_wanted: BTreeSet::new(),
            }),
            events: EventFeed::new(),
            stats: RwLock::new(EngineStats::default()),
            drain_gate: tokio::sync::Mutex::new(()),
            refresh_signal: tokio::sync::Notify::new(),
        }
    }

    /// Returns the engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rebuilds in-memory state from the durable mirror.
    ///
    /// Actions that were in flight when the last process died come back
    /// as pending. Undecodable mirror entries are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the mirror cannot be read.
    pub async fn load(&self) -> EngineResult<()> {
        let actions = persist::load_queue(self.records.as_ref()).await?;
        let collections = persist::load_cache(self.records.as_ref()).await?;
        let action_count = actions.len();
        let collection_count = collections.len();

        {
            let mut state = self.state.write();
            state.queue = ActionQueue::from_actions(actions);
            state.cache = CacheArena::new(self.config.cache_capacity);
            for collection in collections {
                state.cache.insert(collection);
            }
            state.refresh_wanted.clear();
        }
        tracing::info!(
            actions = action_count,
            collections = collection_count,
            "engine state loaded from mirror"
        );
        Ok(())
    }

    /// Synchronous cache read.
    ///
    /// Always answers immediately. A missing or stale collection is
    /// recorded as wanting a refresh, which the scheduler picks up via
    /// [`SyncEngine::take_due_refreshes`]; the read itself never blocks
    /// on the network.
    pub fn get_collection(&self, key: &CollectionKey, now: DateTime<Utc>) -> CollectionSnapshot {
        let mut state = self.state.write();
        let (snapshot, hit) = match state.cache.get(key) {
            Some(collection) => (
                CollectionSnapshot {
                    items: collection.items.clone(),
                    freshness: collection.freshness(now),
                },
                true,
            ),
            None => (
                CollectionSnapshot {
                    items: Vec::new(),
                    freshness: Freshness::Stale,
                },
                false,
            ),
        };
        if !snapshot.freshness.is_fresh() {
            state.refresh_wanted.insert(key.clone());
            self.refresh_signal.notify_one();
        }
        drop(state);

        let mut stats = self.stats.write();
        if hit {
            stats.cache_hits += 1;
        } else {
            stats.cache_misses += 1;
        }
        snapshot
    }

    /// Signal fired when a read leaves a collection wanting a refresh.
    ///
    /// A permit is stored when nobody is waiting, so a waiter that
    /// arrives after the read still wakes.
    pub fn refresh_signal(&self) -> &tokio::sync::Notify {
        &self.refresh_signal
    }

    /// Drains the set of collections wanting a refresh.
    #[must_use]
    pub fn take_due_refreshes(&self) -> Vec<CollectionKey> {
        let mut state = self.state.write();
        let wanted = std::mem::take(&mut state.refresh_wanted);
        wanted.into_iter().collect()
    }

    /// Fetches one collection and replaces the cached copy wholesale.
    ///
    /// Returns the number of records fetched.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unauthorized`] on token rejection and
    /// [`EngineError::Network`] when the server is unreachable; the stale
    /// copy stays served either way.
    pub async fn refresh_collection(
        &self,
        token: &str,
        key: &CollectionKey,
        now: DateTime<Utc>,
    ) -> EngineResult<usize> {
        let response = self.net.fetch_collection(token, key).await?;

        let collection =
            CachedCollection::new(key.clone(), response.items, now, self.config.cache_ttl);
        let count = collection.len();
        let mirrored = collection.clone();

        let evicted = {
            let mut state = self.state.write();
            let evicted = state.cache.insert(collection);
            state.refresh_wanted.remove(key);
            evicted
        };
        if let Some(evicted) = evicted {
            self.stats.write().evictions += 1;
            tracing::debug!(key = %evicted, "evicted least-recently-fetched collection");
            if let Err(e) =
                persist::remove_collection(self.records.as_ref(), &evicted.storage_key()).await
            {
                tracing::warn!(key = %evicted, error = %e, "failed to unmirror evicted collection");
            }
        }
        self.mirror_collection(&mirrored).await;

        self.stats.write().fetches += 1;
        tracing::debug!(key = %key, items = count, "collection refreshed");
        self.events.emit(EngineEvent::CollectionRefreshed {
            key: key.clone(),
            items: count,
        });
        Ok(count)
    }

    /// Refreshes every collection currently wanting one.
    ///
    /// A transient failure re-queues the key for the next round; an
    /// authorization failure aborts immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unauthorized`] when the token is rejected.
    pub async fn flush_refreshes(&self, token: &str, now: DateTime<Utc>) -> EngineResult<usize> {
        let keys = self.take_due_refreshes();
        let mut refreshed = 0;
        for key in keys {
            match self.refresh_collection(token, &key, now).await {
                Ok(_) => refreshed += 1,
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "background refresh failed, will retry");
                    self.state.write().refresh_wanted.insert(key);
                }
            }
        }
        Ok(refreshed)
    }

    /// Applies a mutation optimistically and attempts to deliver it.
    ///
    /// The optimistic effect lands in the cache before the first
    /// suspension point, so a read issued immediately after this call
    /// already observes it. Three resolutions:
    ///
    /// - server confirms: the cached record is reconciled with the
    ///   authoritative response
    /// - server rejects the mutation: the optimistic effect is rolled
    ///   back and the rejection surfaces as an error
    /// - outcome indeterminate: the action is queued durably and the
    ///   optimistic effect stays in place
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Rejected`] for validation failures and
    /// [`EngineError::Unauthorized`] for token rejections; both roll the
    /// cache back first.
    pub async fn mutate(
        &self,
        token: &str,
        resource: impl Into<String>,
        target_id: impl Into<String>,
        payload: ActionPayload,
        now: DateTime<Utc>,
    ) -> EngineResult<MutateOutcome> {
        let action = PendingAction::new(resource, target_id, payload, now);

        let (backups, changed) = {
            let mut state = self.state.write();
            let backups = state.cache.snapshot_resource(&action.resource);
            let changed = state.cache.apply_optimistic(&action);
            (backups, changed)
        };
        self.stats.write().optimistic_applies += 1;

        match self.net.apply_action(token, &action).await {
            Ok(response) => {
                let reconciled = match &response.record {
                    Some(doc) => {
                        let mut state = self.state.write();
                        state
                            .cache
                            .reconcile_record(&action.resource, &action.target_id, doc)
                    }
                    None => Vec::new(),
                };
                let mut keys = changed;
                keys.extend(reconciled);
                keys.sort();
                keys.dedup();
                self.mirror_collections_by_key(&keys).await;

                self.stats.write().confirmed_writes += 1;
                tracing::debug!(
                    resource = %action.resource,
                    target = %action.target_id,
                    "mutation confirmed synchronously"
                );
                Ok(MutateOutcome::Applied {
                    record: response.record,
                })
            }
            Err(NetError::Validation { message }) => {
                self.roll_back(backups, &changed).await;
                self.stats.write().rejected_writes += 1;
                tracing::debug!(
                    resource = %action.resource,
                    target = %action.target_id,
                    %message,
                    "mutation rejected, optimistic update rolled back"
                );
                Err(EngineError::Rejected { message })
            }
            Err(NetError::Auth { message }) => {
                self.roll_back(backups, &changed).await;
                Err(EngineError::Unauthorized { message })
            }
            Err(e) => {
                {
                    let mut state = self.state.write();
                    state.queue.enqueue(action.clone());
                }
                self.mirror_action(&action).await;
                self.mirror_collections_by_key(&changed).await;

                self.stats.write().actions_queued += 1;
                tracing::debug!(
                    action = %action.id,
                    resource = %action.resource,
                    error = %e,
                    "mutation queued for later delivery"
                );
                Ok(MutateOutcome::Queued {
                    action_id: action.id,
                })
            }
        }
    }

    /// Runs one drain pass over the pending-action queue.
    ///
    /// Passes are serialized; a trigger arriving mid-pass waits for the
    /// current pass to finish. A pass skips entirely while the breaker is
    /// open. Eligible actions run with bounded concurrency, at most one
    /// per `(resource, target)` so per-record ordering holds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unauthorized`] when the server rejects the
    /// token mid-pass; attempted actions are released back to pending
    /// without consuming a retry, and the caller must end the session.
    pub async fn drain_once(&self, token: &str, now: DateTime<Utc>) -> EngineResult<DrainReport> {
        let _pass = self.drain_gate.lock().await;
        self.stats.write().drain_passes += 1;

        let mut report = DrainReport::default();
        if !self.net.is_available() {
            report.skipped_while_open = true;
            self.stats.write().drain_skips += 1;
            tracing::debug!("skipping drain pass while circuit is open");
            return Ok(report);
        }

        let eligible: Vec<PendingAction> = {
            let mut state = self.state.write();
            let ids = state.queue.eligible(now, &self.config.backoff);
            ids.into_iter()
                .filter_map(|id| {
                    if state.queue.mark_in_flight(id, now) {
                        state.queue.get(id).cloned()
                    } else {
                        None
                    }
                })
                .collect()
        };
        report.attempted = eligible.len();
        if eligible.is_empty() {
            return Ok(report);
        }
        tracing::debug!(eligible = report.attempted, "drain pass starting");

        let auth_failed = AtomicBool::new(false);
        let breaker_opened = AtomicBool::new(false);
        let outcomes: Vec<AttemptOutcome> = stream::iter(eligible)
            .map(|action| self.attempt(token, action, &auth_failed, &breaker_opened))
            .buffer_unordered(self.config.drain_concurrency)
            .collect()
            .await;

        for outcome in &outcomes {
            match outcome {
                AttemptOutcome::Delivered => report.delivered += 1,
                AttemptOutcome::Failed => report.failed += 1,
                AttemptOutcome::Abandoned => report.abandoned += 1,
                AttemptOutcome::Released => {}
            }
        }

        if auth_failed.load(Ordering::SeqCst) {
            self.state.write().queue.release_in_flight();
            tracing::warn!("drain pass aborted by authorization failure");
            return Err(EngineError::Unauthorized {
                message: "token rejected during queue drain".into(),
            });
        }
        Ok(report)
    }

    /// One queued-action attempt within a drain pass.
    async fn attempt(
        &self,
        token: &str,
        action: PendingAction,
        auth_failed: &AtomicBool,
        breaker_opened: &AtomicBool,
    ) -> AttemptOutcome {
        // A pass-level stop may have been signalled while this attempt
        // waited for a concurrency slot
        if auth_failed.load(Ordering::SeqCst) || breaker_opened.load(Ordering::SeqCst) {
            self.state.write().queue.release(action.id);
            return AttemptOutcome::Released;
        }

        match self.net.apply_action(token, &action).await {
            Ok(_response) => {
                let invalidated = {
                    let mut state = self.state.write();
                    state.queue.complete(action.id);
                    state.cache.invalidate_resource(&action.resource)
                };
                self.unmirror_action(action.id).await;
                self.mirror_collections_by_key(&invalidated).await;

                self.stats.write().actions_delivered += 1;
                tracing::info!(
                    action = %action.id,
                    resource = %action.resource,
                    target = %action.target_id,
                    "queued action delivered"
                );
                self.events.emit(EngineEvent::ActionDelivered {
                    action_id: action.id,
                    resource: action.resource.clone(),
                    target_id: action.target_id.clone(),
                });
                AttemptOutcome::Delivered
            }
            Err(NetError::Auth { .. }) => {
                auth_failed.store(true, Ordering::SeqCst);
                self.state.write().queue.release(action.id);
                AttemptOutcome::Released
            }
            Err(NetError::CircuitOpen) => {
                // Refused before any I/O, so no retry is consumed
                breaker_opened.store(true, Ordering::SeqCst);
                self.state.write().queue.release(action.id);
                AttemptOutcome::Released
            }
            Err(e) => {
                // Validation and transient failures both consume a retry:
                // a queued action has no caller left to surface a
                // definitive rejection to
                let (status, updated) = {
                    let mut state = self.state.write();
                    let status = state.queue.record_failure(action.id, self.config.max_retries);
                    let updated = state.queue.get(action.id).cloned();
                    (status, updated)
                };
                if let Some(updated) = &updated {
                    self.mirror_action(updated).await;
                }

                if status == Some(ActionStatus::Abandoned) {
                    let invalidated = {
                        let mut state = self.state.write();
                        state.cache.invalidate_resource(&action.resource)
                    };
                    self.mirror_collections_by_key(&invalidated).await;

                    self.stats.write().actions_abandoned += 1;
                    tracing::warn!(
                        action = %action.id,
                        resource = %action.resource,
                        target = %action.target_id,
                        error = %e,
                        "action abandoned at retry ceiling"
                    );
                    if let Some(updated) = updated {
                        self.events.emit(EngineEvent::ActionAbandoned { action: updated });
                    }
                    AttemptOutcome::Abandoned
                } else {
                    tracing::debug!(action = %action.id, error = %e, "queued action attempt failed");
                    AttemptOutcome::Failed
                }
            }
        }
    }

    /// Removes an action from the queue regardless of status.
    ///
    /// This is the manual-resolution path for abandoned actions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownAction`] when no such action exists.
    pub async fn discard_action(&self, id: ActionId) -> EngineResult<PendingAction> {
        let removed = self.state.write().queue.discard(id);
        match removed {
            Some(action) => {
                self.unmirror_action(id).await;
                tracing::debug!(action = %id, "action discarded");
                Ok(action)
            }
            None => Err(EngineError::UnknownAction(id)),
        }
    }

    /// Returns the abandoned actions awaiting manual resolution.
    #[must_use]
    pub fn abandoned_actions(&self) -> Vec<PendingAction> {
        self.state
            .read()
            .queue
            .abandoned()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns per-status queue counts.
    #[must_use]
    pub fn queue_counts(&self) -> QueueCounts {
        self.state.read().queue.counts()
    }

    /// Returns all queued actions in queue order.
    #[must_use]
    pub fn queued_actions(&self) -> Vec<PendingAction> {
        self.state.read().queue.iter().cloned().collect()
    }

    /// Returns the cached collection keys, sorted.
    #[must_use]
    pub fn cached_keys(&self) -> Vec<CollectionKey> {
        self.state.read().cache.keys()
    }

    /// Drops all cache and queue state, in memory and in the mirror.
    ///
    /// Called on logout; a signed-out client keeps nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the mirror cannot be
    /// cleared; in-memory state is already gone by then.
    pub async fn clear(&self) -> EngineResult<()> {
        {
            let mut state = self.state.write();
            state.cache.clear();
            state.queue.clear();
            state.refresh_wanted.clear();
        }
        persist::clear_all(self.records.as_ref()).await?;
        tracing::info!("engine state cleared");
        Ok(())
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Returns a copy of the accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    async fn roll_back(&self, backups: Vec<CachedCollection>, changed: &[CollectionKey]) {
        {
            let mut state = self.state.write();
            state.cache.restore(backups);
        }
        self.mirror_collections_by_key(changed).await;
    }

    async fn mirror_collection(&self, collection: &CachedCollection) {
        if let Err(e) = persist::save_collection(self.records.as_ref(), collection).await {
            tracing::warn!(key = %collection.key, error = %e, "failed to mirror cached collection");
        }
    }

    async fn mirror_collections_by_key(&self, keys: &[CollectionKey]) {
        let collections: Vec<CachedCollection> = {
            let state = self.state.read();
            keys.iter()
                .filter_map(|key| state.cache.get(key).cloned())
                .collect()
        };
        for collection in &collections {
            self.mirror_collection(collection).await;
        }
    }

    async fn mirror_action(&self, action: &PendingAction) {
        if let Err(e) = persist::save_action(self.records.as_ref(), action).await {
            tracing::warn!(action = %action.id, error = %e, "failed to mirror queued action");
        }
    }

    async fn unmirror_action(&self, id: ActionId) {
        if let Err(e) = persist::remove_action(self.records.as_ref(), id).await {
            tracing::warn!(action = %id, error = %e, "failed to unmirror action");
        }
    }
}
