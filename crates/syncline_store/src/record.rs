//! Asynchronous structured record store trait.

use crate::error::StoreResult;
use async_trait::async_trait;

/// A namespaced asynchronous record store.
///
/// Record stores hold the larger structured state a client keeps locally:
/// cached collections and the pending-action queue, each in its own
/// namespace. Access is asynchronous; callers must not assume atomicity
/// across two calls. Payloads are **opaque bytes**; callers own
/// serialization.
///
/// # Invariants
///
/// - `(namespace, key)` pairs are independent: writing one never affects
///   another
/// - `list` returns every record in the namespace; ordering is by key and
///   stable across calls
/// - `delete` of a missing record is not an error
/// - A namespace that was never written to behaves as empty
///
/// # Implementors
///
/// - [`crate::MemoryRecordStore`] for tests and ephemeral clients
/// - [`crate::FileRecordStore`] for persistent storage
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads the record stored under `key` in `namespace`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or key is invalid for this backend
    /// or an I/O error occurs.
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` in `namespace`, replacing any previous
    /// record.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or key is invalid for this backend
    /// or an I/O error occurs.
    async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Deletes the record stored under `key` in `namespace`.
    ///
    /// Deleting a missing record succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or key is invalid for this backend
    /// or an I/O error occurs.
    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()>;

    /// Lists all `(key, value)` records in `namespace`, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is invalid for this backend or an
    /// I/O error occurs. Individual records that fail to decode are dropped
    /// by the backend, not surfaced as errors.
    async fn list(&self, namespace: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Removes every record in `namespace`.
    ///
    /// Clearing a namespace that was never written succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is invalid for this backend or an
    /// I/O error occurs.
    async fn clear(&self, namespace: &str) -> StoreResult<()>;
}
