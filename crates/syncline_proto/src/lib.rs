//! # Syncline Proto
//!
//! Shared vocabulary types for syncline.
//!
//! This crate provides:
//! - `PendingAction` and the durable action queue
//! - `CollectionKey` and `RecordDoc` for cached server content
//! - Wire-level request/response types exchanged with the backend
//! - `EventFeed` for distributing component events to subscribers
//!
//! This is a pure types crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod collection;
mod feed;
mod messages;
mod queue;

pub use action::{ActionId, ActionKind, ActionPayload, ActionStatus, PendingAction};
pub use collection::{CollectionKey, KeyParseError, RecordDoc};
pub use feed::EventFeed;
pub use messages::{Credentials, FetchResponse, MutationResponse, TokenGrant, UserSummary};
pub use queue::{ActionQueue, BackoffPolicy, QueueCounts};
