//! File-backed stores for persistent client state.
//!
//! # Layout
//!
//! A [`FileKvStore`] maps each key to `<root>/<key>.slot`. A
//! [`FileRecordStore`] maps each record to
//! `<root>/<namespace>/<sha256(key)>.rec`, where the file holds a CBOR
//! envelope carrying the original key alongside the payload so listing can
//! recover it. Hashed names keep arbitrary record keys (resource/view pairs,
//! action ids) out of the filesystem namespace.
//!
//! All writes go through a temporary file followed by a rename, so readers
//! see either the previous payload or the new one, never a torn write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::kv::KvStore;
use crate::record::RecordStore;

const SLOT_SUFFIX: &str = ".slot";
const RECORD_SUFFIX: &str = ".rec";
const TEMP_SUFFIX: &str = ".tmp";

/// On-disk shape of one record file.
#[derive(Debug, Serialize, Deserialize)]
struct RecordEnvelope {
    key: String,
    value: Vec<u8>,
}

/// Rejects names that cannot be mapped to a single file inside the store
/// root. Keys and namespaces must be non-empty, must not start with a dot,
/// and may contain only ASCII alphanumerics, `_`, `-`, and `.`.
fn check_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_key(name))
    }
}

fn record_file_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut name: String = digest.iter().map(|byte| format!("{:02x}", byte)).collect();
    name.push_str(RECORD_SUFFIX);
    name
}

/// A file-backed key-value store.
///
/// Each key lives in its own file under the store root. Data survives
/// process restarts.
///
/// # Thread Safety
///
/// This store is thread-safe. Writes are serialized internally; reads go
/// straight to the filesystem and observe either the old or the new payload
/// thanks to the rename-based write path.
///
/// # Example
///
/// ```no_run
/// use syncline_store::{KvStore, FileKvStore};
/// use std::path::Path;
///
/// let store = FileKvStore::open(Path::new("/var/lib/app/state")).unwrap();
/// store.put("session", b"snapshot").unwrap();
/// ```
#[derive(Debug)]
pub struct FileKvStore {
    root: PathBuf,
    write_gate: Mutex<()>,
}

impl FileKvStore {
    /// Opens a key-value store rooted at `root`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            write_gate: Mutex::new(()),
        })
    }

    /// Returns the directory this store reads and writes.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, key: &str) -> StoreResult<PathBuf> {
        check_name(key)?;
        Ok(self.root.join(format!("{}{}", key, SLOT_SUFFIX)))
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.slot_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let path = self.slot_path(key)?;
        let temp_path = self.root.join(format!("{}{}{}", key, SLOT_SUFFIX, TEMP_SUFFIX));

        let _gate = self.write_gate.lock();

        // Write to temp file, sync, then rename over the slot
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(value)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.slot_path(key)?;
        let _gate = self.write_gate.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A file-backed namespaced record store.
///
/// Each namespace is a directory under the store root; each record is one
/// file inside it. Data survives process restarts.
///
/// # Corruption
///
/// A record file that fails to decode is skipped by [`RecordStore::list`]
/// with a warning, so one damaged file costs one record, not the namespace.
/// [`RecordStore::get`] on a damaged file reports [`StoreError::Corrupted`].
#[derive(Debug)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    /// Opens a record store rooted at `root`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the directory this store reads and writes.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> StoreResult<PathBuf> {
        check_name(namespace)?;
        Ok(self.root.join(namespace))
    }

    fn record_path(&self, namespace: &str, key: &str) -> StoreResult<PathBuf> {
        Ok(self.namespace_dir(namespace)?.join(record_file_name(key)))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.record_path(namespace, key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let envelope: RecordEnvelope = codec::decode(key, &bytes)?;
        Ok(Some(envelope.value))
    }

    async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        let dir = self.namespace_dir(namespace)?;
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = record_file_name(key);
        let path = dir.join(&file_name);
        let temp_path = dir.join(format!("{}{}", file_name, TEMP_SUFFIX));

        let envelope = RecordEnvelope {
            key: key.to_string(),
            value: value.to_vec(),
        };
        let bytes = codec::encode(&envelope)?;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()> {
        let path = self.record_path(namespace, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, namespace: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let dir = self.namespace_dir(namespace)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(RECORD_SUFFIX));
            if !is_record {
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match codec::decode::<RecordEnvelope>(&path.to_string_lossy(), &bytes) {
                Ok(envelope) => records.push((envelope.key, envelope.value)),
                Err(e) => {
                    tracing::warn!(
                        namespace = namespace,
                        file = %path.display(),
                        error = %e,
                        "dropping undecodable record"
                    );
                }
            }
        }

        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }

    async fn clear(&self, namespace: &str) -> StoreResult<()> {
        let dir = self.namespace_dir(namespace)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
