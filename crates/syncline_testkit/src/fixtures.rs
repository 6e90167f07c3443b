//! Test fixtures and harness helpers.
//!
//! Provides canned protocol values and a pre-wired harness so tests can
//! build a working client stack in one line.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use syncline_engine::{CachedCollection, EngineConfig, SyncEngine};
use syncline_net::{NetClient, NetConfig, RetryConfig};
use syncline_proto::{
    ActionPayload, CollectionKey, Credentials, PendingAction, RecordDoc, TokenGrant, UserSummary,
};
use syncline_session::{SessionConfig, SessionManager};
use syncline_store::{
    FileKvStore, FileRecordStore, KvStore, MemoryKvStore, MemoryRecordStore, RecordStore,
};
use tempfile::TempDir;

use crate::transport::ScriptedTransport;

/// The account every fixture signs in as.
pub fn test_user() -> UserSummary {
    UserSummary::new("user-1", "Test User", "member")
}

/// Credentials matching [`test_user`].
pub fn test_credentials() -> Credentials {
    Credentials::new("test@example.com", "hunter2")
}

/// A token grant issued at `now`, valid for seven days.
pub fn token_grant(token: impl Into<String>, now: DateTime<Utc>) -> TokenGrant {
    TokenGrant {
        token: token.into(),
        issued_at: now,
        expires_at: now + Duration::days(7),
        user: test_user(),
    }
}

/// A record document with an `id`, `title`, and unset `liked` flag.
pub fn record(id: &str) -> RecordDoc {
    RecordDoc::new(id, json!({"id": id, "title": format!("item {id}"), "liked": false}))
}

/// A batch of records `p0..pN` for one collection fetch.
pub fn records(count: usize) -> Vec<RecordDoc> {
    (0..count).map(|i| record(&format!("p{i}"))).collect()
}

/// A pending toggle action against `resource`/`target`.
pub fn toggle_action(resource: &str, target: &str, now: DateTime<Utc>) -> PendingAction {
    PendingAction::new(
        resource,
        target,
        ActionPayload::Toggle {
            flag: "liked".into(),
            enabled: true,
        },
        now,
    )
}

/// A cached collection over [`records`] fetched at `now`.
pub fn cached_collection(
    key: CollectionKey,
    count: usize,
    now: DateTime<Utc>,
    ttl: Duration,
) -> CachedCollection {
    CachedCollection::new(key, records(count), now, ttl)
}

/// A session configuration with throttling disabled and second-scale
/// windows, for deterministic clock-stepped tests.
pub fn fast_session_config() -> SessionConfig {
    SessionConfig::default()
        .with_idle_timeout(Duration::seconds(1800))
        .with_warning_lead(Duration::seconds(300))
        .with_activity_throttle(Duration::zero())
}

/// A network configuration without read retries, so call counts in
/// assertions stay predictable.
pub fn no_retry_net_config() -> NetConfig {
    NetConfig::default().with_read_retry(RetryConfig::no_retry())
}

/// A fully wired client stack over in-memory stores and a scripted
/// transport.
pub struct TestHarness {
    /// The scripted transport behind the network client.
    pub transport: Arc<ScriptedTransport>,
    /// The shared network client.
    pub net: Arc<NetClient<ScriptedTransport>>,
    /// KV store backing the session slot.
    pub kv: Arc<MemoryKvStore>,
    /// Record store backing the cache and queue mirrors.
    pub records: Arc<MemoryRecordStore>,
    /// The session manager under test.
    pub session: SessionManager<ScriptedTransport>,
    /// The sync engine under test.
    pub engine: SyncEngine<ScriptedTransport>,
}

impl TestHarness {
    /// Builds a harness with the given configurations.
    pub fn new(
        session_config: SessionConfig,
        engine_config: EngineConfig,
        net_config: NetConfig,
    ) -> Self {
        let transport = Arc::new(ScriptedTransport::new());
        let net = Arc::new(NetClient::new(Arc::clone(&transport), net_config));
        let kv = Arc::new(MemoryKvStore::new());
        let records = Arc::new(MemoryRecordStore::new());
        let session = SessionManager::new(
            session_config,
            Arc::clone(&net),
            Arc::clone(&kv) as Arc<dyn KvStore>,
        );
        let engine = SyncEngine::new(
            engine_config,
            Arc::clone(&net),
            Arc::clone(&records) as Arc<dyn RecordStore>,
        );
        Self {
            transport,
            net,
            kv,
            records,
            session,
            engine,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new(
            fast_session_config(),
            EngineConfig::default(),
            no_retry_net_config(),
        )
    }
}

/// File-backed stores rooted in a temporary directory.
///
/// For tests that exercise durability: dropping the store handles and
/// calling [`TempStores::reopen`] over the same directory simulates a
/// process restart without losing the data.
pub struct TempStores {
    /// KV store backing the session slot.
    pub kv: Arc<FileKvStore>,
    /// Record store backing the cache and queue mirrors.
    pub records: Arc<FileRecordStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempStores {
    /// Creates both stores in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let kv = Arc::new(FileKvStore::open(temp_dir.path()).expect("Failed to open kv store"));
        let records = Arc::new(
            FileRecordStore::open(temp_dir.path()).expect("Failed to open record store"),
        );
        Self {
            kv,
            records,
            _temp_dir: temp_dir,
        }
    }

    /// The directory both stores read and write.
    pub fn root(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Opens fresh store handles over the same directory, as a new
    /// process would.
    pub fn reopen(&self) -> (Arc<FileKvStore>, Arc<FileRecordStore>) {
        (
            Arc::new(FileKvStore::open(self.root()).expect("Failed to reopen kv store")),
            Arc::new(FileRecordStore::open(self.root()).expect("Failed to reopen record store")),
        )
    }
}

impl Default for TempStores {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_is_valid_for_a_week() {
        let now = Utc::now();
        let grant = token_grant("tok", now);
        assert!(!grant.is_expired(now + Duration::days(6)));
        assert!(grant.is_expired(now + Duration::days(8)));
    }

    #[test]
    fn records_are_distinct() {
        let batch = records(3);
        assert_eq!(batch.len(), 3);
        assert_ne!(batch[0].id, batch[2].id);
    }

    #[tokio::test]
    async fn temp_stores_survive_reopen() {
        let stores = TempStores::new();
        stores.kv.put("session", b"snapshot").unwrap();
        stores.records.put("queue", "a-1", b"x").await.unwrap();

        let (kv, records) = stores.reopen();
        assert_eq!(kv.get("session").unwrap(), Some(b"snapshot".to_vec()));
        assert_eq!(records.list("queue").await.unwrap().len(), 1);
    }
}
