//! Durable mirroring of engine state.
//!
//! The record store holds two namespaces: one for cached collections and
//! one for the pending-action queue. The in-memory engine state is always
//! authoritative; these functions keep the mirror current and rebuild the
//! state after a restart. An entry that no longer decodes is dropped from
//! the mirror, since everything here is reconstructable from the server.

use syncline_proto::{ActionId, PendingAction};
use syncline_store::{decode, encode, RecordStore, StoreResult};

use crate::cache::CachedCollection;

/// Record-store namespace holding cached collections.
pub const CACHE_NAMESPACE: &str = "cache";
/// Record-store namespace holding the pending-action queue.
pub const QUEUE_NAMESPACE: &str = "queue";

pub(crate) async fn save_action(
    store: &dyn RecordStore,
    action: &PendingAction,
) -> StoreResult<()> {
    let bytes = encode(action)?;
    store
        .put(QUEUE_NAMESPACE, &action.id.to_string(), &bytes)
        .await
}

pub(crate) async fn remove_action(store: &dyn RecordStore, id: ActionId) -> StoreResult<()> {
    store.delete(QUEUE_NAMESPACE, &id.to_string()).await
}

pub(crate) async fn load_queue(store: &dyn RecordStore) -> StoreResult<Vec<PendingAction>> {
    let mut actions = Vec::new();
    for (key, bytes) in store.list(QUEUE_NAMESPACE).await? {
        match decode::<PendingAction>(&key, &bytes) {
            Ok(action) => actions.push(action),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "dropping undecodable queued action");
                store.delete(QUEUE_NAMESPACE, &key).await?;
            }
        }
    }
    Ok(actions)
}

pub(crate) async fn save_collection(
    store: &dyn RecordStore,
    collection: &CachedCollection,
) -> StoreResult<()> {
    let bytes = encode(collection)?;
    store
        .put(CACHE_NAMESPACE, &collection.key.storage_key(), &bytes)
        .await
}

pub(crate) async fn remove_collection(
    store: &dyn RecordStore,
    storage_key: &str,
) -> StoreResult<()> {
    store.delete(CACHE_NAMESPACE, storage_key).await
}

pub(crate) async fn load_cache(store: &dyn RecordStore) -> StoreResult<Vec<CachedCollection>> {
    let mut collections = Vec::new();
    for (key, bytes) in store.list(CACHE_NAMESPACE).await? {
        match decode::<CachedCollection>(&key, &bytes) {
            Ok(collection) => collections.push(collection),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "dropping undecodable cached collection");
                store.delete(CACHE_NAMESPACE, &key).await?;
            }
        }
    }
    Ok(collections)
}

pub(crate) async fn clear_all(store: &dyn RecordStore) -> StoreResult<()> {
    store.clear(CACHE_NAMESPACE).await?;
    store.clear(QUEUE_NAMESPACE).await
}
