//! # Syncline Client
//!
//! The composition layer of syncline: one [`SynclineClient`] assembles
//! the session manager, the offline sync engine, and the shared network
//! client into the surface a UI talks to.
//!
//! This crate provides:
//! - The UI-facing facade (login/logout/restore, cached reads,
//!   optimistic writes, event subscriptions)
//! - A [`TaskScheduler`] owning named, cancelable background tasks
//! - The four task loops: idle watchdog, proactive token refresh, queue
//!   drain, and collection refresh
//!
//! ## Lifecycle
//!
//! Background tasks exist only while a session does. `login` and a
//! successful `restore` start them; `logout` aborts them; a forced
//! sign-out (idle timeout or token rejection) makes each loop terminate
//! itself at its next tick.
//!
//! ## Key invariants
//!
//! - Reads never block on the network
//! - A terminal auth failure anywhere ends the session and drops all
//!   cache and queue state
//! - No timer or loop survives across login cycles

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod scheduler;
mod tasks;

pub use client::SynclineClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use scheduler::TaskScheduler;
