//! Network layer for syncline.
//!
//! This crate owns everything between the sync engine and the wire: the
//! [`Transport`] trait the server is reached through, the [`NetClient`]
//! that wraps every call with a timeout and a circuit breaker, and the
//! error taxonomy the rest of the system keys its retry decisions off.
//!
//! The layering rule is that a [`Transport`] implementation performs one
//! bare call and classifies its outcome as a [`NetError`]; the client
//! decides whether that call was allowed to happen at all and whether it
//! is worth repeating.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod breaker;
mod client;
mod config;
mod error;
mod transport;

pub use breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use client::{NetClient, NetStats};
pub use config::{BreakerConfig, NetConfig, RetryConfig};
pub use error::{NetError, NetResult};
pub use transport::{MockTransport, Transport};
