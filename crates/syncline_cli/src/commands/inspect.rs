//! Inspect command implementation.

use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use syncline_engine::{CachedCollection, Freshness, CACHE_NAMESPACE, QUEUE_NAMESPACE};
use syncline_proto::{ActionStatus, PendingAction};
use syncline_session::{snapshot, SESSION_SLOT};
use syncline_store::{decode, FileKvStore, FileRecordStore, KvStore, RecordStore};

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Session slot status (absent, present, or corrupted).
    pub session_slot: String,
    /// Session slot summary, when the slot decodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSummary>,
    /// Pending-action queue summary.
    pub queue: QueueSummary,
    /// Cached-collection summary.
    pub cache: CacheSummary,
}

/// Summary of the persisted session slot.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    /// Display name of the signed-in user.
    pub user: String,
    /// Server-side user ID.
    pub user_id: String,
    /// Whether the stored token has passed its expiry.
    pub token_expired: bool,
    /// Last recorded user activity.
    pub last_activity_at: String,
}

/// Counts over the queue namespace.
#[derive(Debug, Default, Serialize)]
pub struct QueueSummary {
    /// Actions stored in the namespace.
    pub total: usize,
    /// Actions waiting for their first or next attempt.
    pub pending: usize,
    /// Actions persisted mid-attempt.
    pub in_flight: usize,
    /// Actions waiting out a backoff delay.
    pub failed: usize,
    /// Actions past their retry ceiling.
    pub abandoned: usize,
    /// Entries that did not decode.
    pub undecodable: usize,
}

/// Counts over the cache namespace.
#[derive(Debug, Default, Serialize)]
pub struct CacheSummary {
    /// Cached collections stored in the namespace.
    pub collections: usize,
    /// Records across all collections.
    pub records: usize,
    /// Collections still within their freshness lifetime.
    pub fresh: usize,
    /// Collections past their lifetime or invalidated.
    pub stale: usize,
    /// Entries that did not decode.
    pub undecodable: usize,
}

/// Runs the inspect command.
pub async fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store directory at {:?}", path).into());
    }

    let kv = FileKvStore::open(path)?;
    let records = FileRecordStore::open(path)?;
    let now = Utc::now();

    let (session_slot, session) = match kv.get(SESSION_SLOT)? {
        None => ("absent".to_string(), None),
        Some(bytes) => match snapshot::open(&bytes) {
            Ok(session) => (
                "present".to_string(),
                Some(SessionSummary {
                    user: session.user.display_name.clone(),
                    user_id: session.user.id.clone(),
                    token_expired: !session.is_token_valid(now),
                    last_activity_at: session.last_activity_at.to_rfc3339(),
                }),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "session slot did not decode");
                ("corrupted".to_string(), None)
            }
        },
    };

    let mut queue = QueueSummary::default();
    for (key, bytes) in records.list(QUEUE_NAMESPACE).await? {
        match decode::<PendingAction>(&key, &bytes) {
            Ok(action) => {
                queue.total += 1;
                match action.status {
                    ActionStatus::Pending => queue.pending += 1,
                    ActionStatus::InFlight => queue.in_flight += 1,
                    ActionStatus::Failed => queue.failed += 1,
                    ActionStatus::Abandoned => queue.abandoned += 1,
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "queue entry did not decode");
                queue.undecodable += 1;
            }
        }
    }

    let mut cache = CacheSummary::default();
    for (key, bytes) in records.list(CACHE_NAMESPACE).await? {
        match decode::<CachedCollection>(&key, &bytes) {
            Ok(collection) => {
                cache.collections += 1;
                cache.records += collection.items.len();
                match collection.freshness(now) {
                    Freshness::Fresh => cache.fresh += 1,
                    Freshness::Stale => cache.stale += 1,
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache entry did not decode");
                cache.undecodable += 1;
            }
        }
    }

    let result = InspectResult {
        path: path.display().to_string(),
        session_slot,
        session,
        queue,
        cache,
    };

    // Output
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Syncline Store Inspection");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!();

    match &result.session {
        Some(session) => {
            println!("Session:");
            println!("  User:          {} ({})", session.user, session.user_id);
            println!(
                "  Token:         {}",
                if session.token_expired {
                    "expired"
                } else {
                    "valid"
                }
            );
            println!("  Last activity: {}", session.last_activity_at);
        }
        None => {
            println!("Session: {}", result.session_slot);
        }
    }

    println!();
    println!("Queue:");
    println!("  Total:     {}", result.queue.total);
    println!("  Pending:   {}", result.queue.pending);
    println!("  In flight: {}", result.queue.in_flight);
    println!("  Failed:    {}", result.queue.failed);
    println!("  Abandoned: {}", result.queue.abandoned);
    if result.queue.undecodable > 0 {
        println!("  Undecodable: {}", result.queue.undecodable);
    }

    println!();
    println!("Cache:");
    println!("  Collections: {}", result.cache.collections);
    println!("  Records:     {}", result.cache.records);
    println!("  Fresh:       {}", result.cache.fresh);
    println!("  Stale:       {}", result.cache.stale);
    if result.cache.undecodable > 0 {
        println!("  Undecodable: {}", result.cache.undecodable);
    }
}
