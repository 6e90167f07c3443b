//! # Syncline Testkit
//!
//! Test utilities for Syncline.
//!
//! This crate provides:
//! - Test fixtures and a pre-wired harness over the in-memory stores
//! - A scripted transport with per-endpoint outcome queues and call logs
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use syncline_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_harness() {
//!     let harness = TestHarness::default();
//!     harness.transport.script_fetch(Err(NetError::transient("down")));
//!     // ... drive the session or engine
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::transport::*;
}

pub use fixtures::*;
pub use generators::*;
pub use transport::*;
