//! Request and response types exchanged with the backend.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::RecordDoc;

/// Login credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates a credentials pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Minimal description of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// Server-side user ID.
    pub id: String,
    /// Name to show in the UI.
    pub display_name: String,
    /// Role name as the server reports it.
    pub role: String,
}

impl UserSummary {
    /// Creates a user summary.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role: role.into(),
        }
    }
}

/// A bearer token issued by login or refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Opaque bearer credential.
    pub token: String,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the token stops being valid.
    pub expires_at: DateTime<Utc>,
    /// The user the token belongs to.
    pub user: UserSummary,
}

impl TokenGrant {
    /// Returns `true` if the token is no longer valid at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Returns `true` if the token expires within `window` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expires_at <= now + window
    }
}

/// Server response to a collection fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// Records in server order.
    pub items: Vec<RecordDoc>,
}

impl FetchResponse {
    /// Creates a fetch response.
    #[must_use]
    pub fn new(items: Vec<RecordDoc>) -> Self {
        Self { items }
    }
}

/// Server response to an applied mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    /// The authoritative record after the mutation, when one exists.
    ///
    /// `None` for deletes and for endpoints that return no body.
    pub record: Option<RecordDoc>,
}

impl MutationResponse {
    /// Creates a response carrying the authoritative record.
    #[must_use]
    pub fn with_record(record: RecordDoc) -> Self {
        Self {
            record: Some(record),
        }
    }

    /// Creates an empty response.
    #[must_use]
    pub fn empty() -> Self {
        Self { record: None }
    }
}
