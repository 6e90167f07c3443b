//! The session record and its state machine vocabulary.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use syncline_proto::{TokenGrant, UserSummary};

/// One signed-in user's authoritative session record.
///
/// Owned exclusively by the [`crate::SessionManager`]; the durable slot is
/// a mirror, never the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token presented on authorized calls.
    pub token: String,
    /// When the current token was issued.
    pub token_issued_at: DateTime<Utc>,
    /// When the current token stops being accepted.
    pub token_expires_at: DateTime<Utc>,
    /// The signed-in user.
    pub user: UserSummary,
    /// Last processed user-activity timestamp.
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Builds a session from a fresh token grant.
    #[must_use]
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            token: grant.token,
            token_issued_at: grant.issued_at,
            token_expires_at: grant.expires_at,
            user: grant.user,
            last_activity_at: now,
        }
    }

    /// Replaces the token fields from a refresh grant.
    ///
    /// Deliberately leaves `last_activity_at` alone: refreshing a token is
    /// not user activity and must not reset the idle timer.
    pub fn apply_grant(&mut self, grant: TokenGrant) {
        self.token = grant.token;
        self.token_issued_at = grant.issued_at;
        self.token_expires_at = grant.expires_at;
        self.user = grant.user;
    }

    /// Records a processed activity event.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    /// Returns `true` while the token may authorize requests.
    #[must_use]
    pub fn is_token_valid(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at > now
    }

    /// Returns `true` if the token expires within `window` of `now`.
    #[must_use]
    pub fn token_expires_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.token_expires_at <= now + window
    }

    /// Time since the last processed activity, clamped at zero.
    #[must_use]
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity_at).max(Duration::zero())
    }
}

/// The session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No valid session. The initial and terminal state.
    Unauthenticated,
    /// Signed in with recent activity.
    Active,
    /// Signed in but idle long enough that expiry is imminent.
    Warning,
}

impl SessionState {
    /// Returns `true` for states holding a live session.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Active => "active",
            Self::Warning => "warning",
        };
        write!(f, "{}", name)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user signed out.
    Logout,
    /// The idle timeout elapsed with no activity.
    IdleTimeout,
    /// The server rejected the token.
    AuthRejected,
}

impl std::fmt::Display for SignOutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Logout => "logout",
            Self::IdleTimeout => "idle timeout",
            Self::AuthRejected => "authorization rejected",
        };
        write!(f, "{}", name)
    }
}

/// Events emitted by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session entered `Active`, on sign-in, restore, or activity
    /// clearing a warning.
    Activated {
        /// Id of the signed-in user.
        user_id: String,
    },
    /// The idle warning threshold was crossed. The UI should prompt the
    /// user to stay signed in before `deadline`.
    IdleWarning {
        /// When the session will expire without further activity.
        deadline: DateTime<Utc>,
    },
    /// The session ended.
    SignedOut {
        /// What ended it.
        reason: SignOutReason,
    },
    /// The token was exchanged in place; the session stays active.
    TokenRefreshed {
        /// Expiry of the replacement token.
        expires_at: DateTime<Utc>,
    },
}
