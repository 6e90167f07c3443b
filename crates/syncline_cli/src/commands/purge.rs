//! Purge command implementation.

use std::path::Path;
use syncline_engine::{CACHE_NAMESPACE, QUEUE_NAMESPACE};
use syncline_store::{FileRecordStore, RecordStore};

/// Runs the purge command.
pub async fn run(
    path: &Path,
    purge_cache: bool,
    purge_queue: bool,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store directory at {:?}", path).into());
    }

    println!("Purging store at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let records = FileRecordStore::open(path)?;

    let verb = if dry_run { "would be removed" } else { "removed" };

    if purge_cache {
        let count = records.list(CACHE_NAMESPACE).await?.len();
        if !dry_run {
            records.clear(CACHE_NAMESPACE).await?;
        }
        println!("  Cache: {} entries {}", count, verb);
    }

    if purge_queue {
        let count = records.list(QUEUE_NAMESPACE).await?.len();
        if !dry_run {
            records.clear(QUEUE_NAMESPACE).await?;
        }
        println!("  Queue: {} entries {}", count, verb);
    }

    println!();
    if dry_run {
        println!("Dry run complete");
    } else {
        println!("✓ Purge complete");
    }

    Ok(())
}
