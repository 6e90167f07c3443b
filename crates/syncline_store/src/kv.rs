//! Synchronous key/value store trait.

use crate::error::StoreResult;

/// A small synchronous key/value store.
///
/// Kv stores hold tiny slots that must be readable without suspension: the
/// serialized session snapshot and similar bookkeeping values. Payloads are
/// **opaque bytes**; callers own serialization.
///
/// # Invariants
///
/// - `get` returns exactly the bytes last passed to `put` for that key
/// - `put` fully replaces any previous value
/// - `remove` of a missing key is not an error
/// - Implementations must be `Send + Sync`; syncline shares them behind an
///   `Arc`
///
/// # Implementors
///
/// - [`crate::MemoryKvStore`] for tests and ephemeral clients
/// - [`crate::FileKvStore`] for persistent storage
pub trait KvStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid for this backend or an I/O
    /// error occurs.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid for this backend or an I/O
    /// error occurs.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Removes the value stored under `key`.
    ///
    /// Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid for this backend or an I/O
    /// error occurs.
    fn remove(&self, key: &str) -> StoreResult<()>;
}
