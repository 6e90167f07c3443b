//! Offline cache and pending-action sync engine for syncline.
//!
//! The engine keeps a bounded in-memory cache of server collections and a
//! durable queue of mutations awaiting delivery. Reads are answered
//! synchronously from the cache, with staleness reported rather than
//! blocked on; mutations apply optimistically and either confirm against
//! the server, roll back on definitive rejection, or persist in the queue
//! until a drain pass delivers them.
//!
//! Both halves are mirrored into a [`syncline_store::RecordStore`] so a
//! process restart picks up exactly where the previous one stopped. The
//! engine never spawns tasks of its own; the composition layer decides
//! when refreshes and drain passes run.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod engine;
mod error;
mod persist;

pub use cache::{CacheArena, CachedCollection, Freshness};
pub use config::EngineConfig;
pub use engine::{
    CollectionSnapshot, DrainReport, EngineEvent, EngineStats, MutateOutcome, SyncEngine,
};
pub use error::{EngineError, EngineResult};
pub use persist::{CACHE_NAMESPACE, QUEUE_NAMESPACE};
