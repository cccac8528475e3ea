//! PostgreSQL adapters built on diesel-async and bb8.
//!
//! - [`DbPool`] owns the connections.
//! - [`DieselResourceManager`] implements the transaction ports over it.
//! - [`columns`] maps the domain transforms onto diesel column types.
//!
//! ```ignore
//! let pool = DbPool::connect(&PoolConfig::new("postgres://localhost/app")).await?;
//! let unit = UnitOfWork::new(DieselResourceManager::new(pool));
//! ```

pub mod columns;
mod diesel_error_mapping;
mod pool;
mod transaction;

pub use pool::{DbPool, PgPooledConnection, PoolConfig, PoolError};
pub use transaction::{DieselResourceManager, DieselTransactionHandle, SharedConnection};
