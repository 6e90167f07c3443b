//! # Syncline Store
//!
//! Client-local storage for syncline.
//!
//! This crate provides the persistent store adapter: thin abstractions over
//! the two kinds of storage a syncline client keeps on the device, with no
//! business logic of its own.
//!
//! - [`KvStore`]: a small synchronous key/value store for tiny slots that
//!   must be readable without suspension (the session snapshot, bookkeeping
//!   markers).
//! - [`RecordStore`]: a larger asynchronous structured store organised into
//!   namespaces of records (cached collections, the pending-action queue).
//!
//! Both traits ship a memory backend for tests and ephemeral use and a file
//! backend for real persistence.
//!
//! ## Corruption policy
//!
//! Durable client state is always reconstructable from the server, so a
//! payload that fails to decode is never fatal: backends surface it as
//! [`StoreError::Corrupted`] and the file record store drops undecodable
//! records during listing rather than refusing to load.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod file;
mod kv;
mod memory;
mod record;

pub use codec::{decode, encode};
pub use error::{StoreError, StoreResult};
pub use file::{FileKvStore, FileRecordStore};
pub use kv::KvStore;
pub use memory::{MemoryKvStore, MemoryRecordStore};
pub use record::RecordStore;
