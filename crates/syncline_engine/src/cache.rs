//! The collection cache.
//!
//! Cached collections live in an explicit arena keyed by
//! [`CollectionKey`], with a hard capacity and least-recently-fetched
//! eviction. Replacement on fetch is wholesale: the server's answer
//! replaces the prior items, no row-level merging.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use syncline_proto::{ActionPayload, CollectionKey, PendingAction, RecordDoc};

/// Whether cached data is within its staleness bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Inside the TTL and not invalidated.
    Fresh,
    /// Past the TTL, invalidated, or absent. Usable, but a refresh is due.
    Stale,
}

impl Freshness {
    /// Returns `true` for [`Freshness::Fresh`].
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

/// One named set of server-fetched records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCollection {
    /// The collection's key.
    pub key: CollectionKey,
    /// Records in server order, duplicates by ID removed.
    pub items: Vec<RecordDoc>,
    /// When this collection was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Freshness lifetime in whole seconds.
    pub ttl_seconds: i64,
    /// Set when a confirmed mutation made the contents suspect.
    #[serde(default)]
    pub invalidated: bool,
}

impl CachedCollection {
    /// Builds a collection from a fetch result.
    ///
    /// Items sharing an ID keep the first occurrence.
    #[must_use]
    pub fn new(
        key: CollectionKey,
        mut items: Vec<RecordDoc>,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.id.clone()));
        Self {
            key,
            items,
            fetched_at,
            ttl_seconds: ttl.num_seconds(),
            invalidated: false,
        }
    }

    /// The freshness lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_seconds)
    }

    /// Reports freshness at `now`.
    #[must_use]
    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        if !self.invalidated && now - self.fetched_at < self.ttl() {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    /// Marks the contents suspect without discarding them.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Returns the record with the given ID, if present.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<&RecordDoc> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Applies a mutation's expected effect to the cached items.
    ///
    /// Creates insert at the front, the usual position for a fresh record
    /// in a newest-first listing. Returns `true` if anything changed.
    pub fn apply_action(&mut self, action: &PendingAction) -> bool {
        match &action.payload {
            ActionPayload::Create { body } => {
                if self.record(&action.target_id).is_some() {
                    return false;
                }
                self.items
                    .insert(0, RecordDoc::new(action.target_id.clone(), body.clone()));
                true
            }
            ActionPayload::Update { body } => match self.record_mut(&action.target_id) {
                Some(item) => {
                    item.merge(body);
                    true
                }
                None => false,
            },
            ActionPayload::Delete => {
                let before = self.items.len();
                self.items.retain(|item| item.id != action.target_id);
                self.items.len() != before
            }
            ActionPayload::Toggle { flag, enabled } => self
                .record_mut(&action.target_id)
                .is_some_and(|item| item.set_flag(flag, *enabled)),
        }
    }

    /// Replaces the record at `target_id` with the server's authoritative
    /// version.
    ///
    /// Returns `false` when the collection does not hold that record.
    pub fn reconcile(&mut self, target_id: &str, doc: &RecordDoc) -> bool {
        match self.record_mut(target_id) {
            Some(item) => {
                *item = doc.clone();
                true
            }
            None => false,
        }
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn record_mut(&mut self, id: &str) -> Option<&mut RecordDoc> {
        self.items.iter_mut().find(|item| item.id == id)
    }
}

/// Bounded arena of cached collections.
#[derive(Debug)]
pub struct CacheArena {
    capacity: usize,
    entries: HashMap<CollectionKey, CachedCollection>,
}

impl CacheArena {
    /// Creates an arena holding at most `capacity` collections.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// Inserts or replaces a collection.
    ///
    /// When the arena is full and the key is new, the collection with the
    /// oldest `fetched_at` is evicted first; its key is returned.
    pub fn insert(&mut self, collection: CachedCollection) -> Option<CollectionKey> {
        let mut evicted = None;
        if !self.entries.contains_key(&collection.key) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .values()
                .min_by(|a, b| {
                    a.fetched_at
                        .cmp(&b.fetched_at)
                        .then_with(|| a.key.cmp(&b.key))
                })
                .map(|c| c.key.clone());
            if let Some(key) = oldest {
                self.entries.remove(&key);
                evicted = Some(key);
            }
        }
        self.entries.insert(collection.key.clone(), collection);
        evicted
    }

    /// Returns the collection under `key`, if cached.
    #[must_use]
    pub fn get(&self, key: &CollectionKey) -> Option<&CachedCollection> {
        self.entries.get(key)
    }

    /// Removes the collection under `key`.
    pub fn remove(&mut self, key: &CollectionKey) -> Option<CachedCollection> {
        self.entries.remove(key)
    }

    /// Clones every collection whose key matches `resource`.
    ///
    /// This is the rollback snapshot taken before an optimistic apply.
    #[must_use]
    pub fn snapshot_resource(&self, resource: &str) -> Vec<CachedCollection> {
        self.entries
            .values()
            .filter(|c| c.key.matches_resource(resource))
            .cloned()
            .collect()
    }

    /// Puts previously snapshotted collections back.
    pub fn restore(&mut self, collections: Vec<CachedCollection>) {
        for collection in collections {
            self.entries.insert(collection.key.clone(), collection);
        }
    }

    /// Applies a mutation's expected effect to every matching collection.
    ///
    /// Returns the keys that changed.
    pub fn apply_optimistic(&mut self, action: &PendingAction) -> Vec<CollectionKey> {
        let mut changed = Vec::new();
        for collection in self.entries.values_mut() {
            if collection.key.matches_resource(&action.resource) && collection.apply_action(action)
            {
                changed.push(collection.key.clone());
            }
        }
        changed.sort();
        changed
    }

    /// Replaces the optimistic record with the server's version in every
    /// matching collection.
    pub fn reconcile_record(
        &mut self,
        resource: &str,
        target_id: &str,
        doc: &RecordDoc,
    ) -> Vec<CollectionKey> {
        let mut changed = Vec::new();
        for collection in self.entries.values_mut() {
            if collection.key.matches_resource(resource) && collection.reconcile(target_id, doc) {
                changed.push(collection.key.clone());
            }
        }
        changed.sort();
        changed
    }

    /// Marks every collection matching `resource` stale.
    ///
    /// Returns the keys that were invalidated.
    pub fn invalidate_resource(&mut self, resource: &str) -> Vec<CollectionKey> {
        let mut changed = Vec::new();
        for collection in self.entries.values_mut() {
            if collection.key.matches_resource(resource) && !collection.invalidated {
                collection.invalidate();
                changed.push(collection.key.clone());
            }
        }
        changed.sort();
        changed
    }

    /// Returns all cached keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<CollectionKey> {
        let mut keys: Vec<_> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of cached collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached collection.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
