//! CLI command implementations.

pub mod inspect;
pub mod purge;
pub mod queue;
pub mod session;
