//! Session lifecycle for syncline.
//!
//! This crate owns the one authoritative [`Session`] per signed-in user
//! and everything that governs its lifetime: the idle-timeout state
//! machine with its pre-expiry warning, throttled activity tracking,
//! proactive token refresh, and the durable snapshot that lets a restart
//! resume a session without re-authenticating.
//!
//! The [`SessionManager`] is deliberately passive: it never spawns tasks
//! or owns timers. The composition layer drives it by calling
//! [`SessionManager::poll_idle`] and [`SessionManager::poll_refresh`] on
//! its schedule, which keeps every transition deterministic under test.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod session;
pub mod snapshot;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use manager::{SessionManager, SessionStats, SESSION_SLOT};
pub use session::{Session, SessionEvent, SessionState, SignOutReason};
