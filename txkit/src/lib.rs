//! Request-scoped transactions, uniform response envelopes and column
//! transforms for actix-web services backed by diesel-async.
//!
//! - [`domain`]: envelope, error model, unit of work, transforms.
//! - [`inbound::http`]: actix middleware and extractors.
//! - [`outbound::persistence`]: PostgreSQL pool and transaction handles.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use pagination;
