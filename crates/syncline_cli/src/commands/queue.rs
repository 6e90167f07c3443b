//! Queue command implementation.

use serde::Serialize;
use std::path::Path;
use syncline_engine::QUEUE_NAMESPACE;
use syncline_proto::PendingAction;
use syncline_store::{decode, FileRecordStore, RecordStore};

/// One queued action, flattened for output.
#[derive(Debug, Serialize)]
pub struct ActionRow {
    /// Action ID, also the server-side dedup key.
    pub id: String,
    /// Logical resource the mutation belongs to.
    pub resource: String,
    /// Record the mutation applies to.
    pub target_id: String,
    /// Mutation kind.
    pub kind: String,
    /// Delivery status.
    pub status: String,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Enqueue time.
    pub created_at: String,
    /// Most recent attempt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<String>,
}

impl ActionRow {
    fn new(action: &PendingAction) -> Self {
        Self {
            id: action.id.to_string(),
            resource: action.resource.clone(),
            target_id: action.target_id.clone(),
            kind: action.kind().to_string(),
            status: action.status.to_string(),
            retry_count: action.retry_count,
            created_at: action.created_at.to_rfc3339(),
            last_attempt_at: action.last_attempt_at.map(|at| at.to_rfc3339()),
        }
    }
}

/// Runs the queue command.
pub async fn run(
    path: &Path,
    only_abandoned: bool,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store directory at {:?}", path).into());
    }

    let records = FileRecordStore::open(path)?;

    let mut actions = Vec::new();
    for (key, bytes) in records.list(QUEUE_NAMESPACE).await? {
        match decode::<PendingAction>(&key, &bytes) {
            Ok(action) => actions.push(action),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "queue entry did not decode");
            }
        }
    }

    if only_abandoned {
        actions.retain(|action| action.status.is_abandoned());
    }

    // Listing follows delivery order, oldest first
    actions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let total = actions.len();
    if let Some(limit) = limit {
        actions.truncate(limit);
    }

    let rows: Vec<ActionRow> = actions.iter().map(ActionRow::new).collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            print_text_output(&rows, total);
        }
    }

    Ok(())
}

fn print_text_output(rows: &[ActionRow], total: usize) {
    println!("Queued Actions ({} shown, {} total)", rows.len(), total);
    println!("==============");
    println!();

    for row in rows {
        print!(
            "[{}] {:9} {:7} {}/{}",
            row.created_at, row.status, row.kind, row.resource, row.target_id
        );
        if row.retry_count > 0 {
            print!(" retries={}", row.retry_count);
        }
        if let Some(ref at) = row.last_attempt_at {
            print!(" last_attempt={}", at);
        }
        println!();
        println!("  id={}", row.id);
    }
}
