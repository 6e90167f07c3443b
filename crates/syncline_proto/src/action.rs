//! Pending mutations and their lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a pending action.
///
/// Action IDs are 128-bit UUIDs that are:
/// - Generated locally at enqueue time
/// - Immutable once assigned
/// - The idempotency key the server is assumed to deduplicate on
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(Uuid);

impl ActionId {
    /// Creates a new random action ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an action ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Converts to a UUID.
    #[must_use]
    pub const fn to_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses an action ID from its string form.
    ///
    /// Returns `None` if the string is not a valid UUID.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionId({})", self.0)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ActionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ActionId> for Uuid {
    fn from(id: ActionId) -> Self {
        id.0
    }
}

/// Kind of mutation an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A new record is created.
    Create,
    /// An existing record's fields change.
    Update,
    /// An existing record is removed.
    Delete,
    /// A boolean field on an existing record flips.
    Toggle,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::Toggle => "toggle",
        };
        write!(f, "{}", name)
    }
}

/// The mutation payload, one variant per action kind.
///
/// Keeping the payload a closed set of variants lets the drain logic
/// dispatch exhaustively instead of inspecting an untyped blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    /// Create a record with the given body. The target ID is the locally
    /// assigned ID the optimistic record carries until the server answers.
    Create {
        /// Full body of the new record.
        body: Value,
    },
    /// Patch fields of an existing record. Top-level fields of `body`
    /// overwrite the cached record's fields of the same name.
    Update {
        /// Partial body carrying the changed fields.
        body: Value,
    },
    /// Remove an existing record.
    Delete,
    /// Set a boolean field of an existing record.
    Toggle {
        /// Name of the boolean field.
        flag: String,
        /// Value to set it to.
        enabled: bool,
    },
}

impl ActionPayload {
    /// Returns the action kind this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Create { .. } => ActionKind::Create,
            ActionPayload::Update { .. } => ActionKind::Update,
            ActionPayload::Delete => ActionKind::Delete,
            ActionPayload::Toggle { .. } => ActionKind::Toggle,
        }
    }
}

/// Delivery status of a pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Waiting for its first attempt, or released back after an aborted
    /// pass. Eligible immediately.
    Pending,
    /// A network attempt is currently running.
    InFlight,
    /// The last attempt failed. Eligible again once its backoff delay has
    /// passed.
    Failed,
    /// The retry ceiling was exhausted. Never retried automatically; kept
    /// until the caller resolves it.
    Abandoned,
}

impl ActionStatus {
    /// Returns `true` if a retry may still happen automatically.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionStatus::Pending | ActionStatus::Failed)
    }

    /// Returns `true` if the action is terminal.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        matches!(self, ActionStatus::Abandoned)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionStatus::Pending => "pending",
            ActionStatus::InFlight => "in-flight",
            ActionStatus::Failed => "failed",
            ActionStatus::Abandoned => "abandoned",
        };
        write!(f, "{}", name)
    }
}

/// One user-initiated mutation that has not been confirmed by the server.
///
/// # Fields
///
/// - `id`: locally generated identity, also the server-side dedup key
/// - `resource`: logical resource the mutation belongs to (e.g. `posts`)
/// - `target_id`: record the mutation applies to; for creates, the locally
///   assigned record ID
/// - `payload`: the typed mutation body
/// - `created_at`: enqueue time; drain order within a target
/// - `retry_count`: failed attempts so far
/// - `last_attempt_at`: start of the most recent attempt
/// - `status`: current delivery status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Locally generated unique ID.
    pub id: ActionId,
    /// Logical resource name.
    pub resource: String,
    /// Record the mutation targets.
    pub target_id: String,
    /// Typed mutation payload.
    pub payload: ActionPayload,
    /// When the action was enqueued.
    pub created_at: DateTime<Utc>,
    /// Number of failed attempts.
    pub retry_count: u32,
    /// When the most recent attempt started.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Current delivery status.
    pub status: ActionStatus,
}

impl PendingAction {
    /// Creates a new pending action with a fresh ID and zero attempts.
    #[must_use]
    pub fn new(
        resource: impl Into<String>,
        target_id: impl Into<String>,
        payload: ActionPayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActionId::new(),
            resource: resource.into(),
            target_id: target_id.into(),
            payload,
            created_at,
            retry_count: 0,
            last_attempt_at: None,
            status: ActionStatus::Pending,
        }
    }

    /// Returns the action kind.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    /// Marks the start of a network attempt.
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) {
        self.status = ActionStatus::InFlight;
        self.last_attempt_at = Some(now);
    }

    /// Records a failed attempt.
    ///
    /// The retry counter increases by one; once it reaches `max_retries`
    /// the action becomes [`ActionStatus::Abandoned`]. Returns the new
    /// status.
    pub fn record_failure(&mut self, max_retries: u32) -> ActionStatus {
        self.retry_count += 1;
        self.status = if self.retry_count >= max_retries {
            ActionStatus::Abandoned
        } else {
            ActionStatus::Failed
        };
        self.status
    }

    /// Releases an in-flight action without counting an attempt.
    ///
    /// Used when a drain pass aborts before the server could judge the
    /// action, e.g. the session died mid-pass.
    pub fn release(&mut self) {
        if self.status == ActionStatus::InFlight {
            self.status = ActionStatus::Pending;
        }
    }
}
