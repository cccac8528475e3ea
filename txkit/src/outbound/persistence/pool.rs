//! Connection pool feeding the transaction handles.
//!
//! Wraps `bb8` over `diesel-async`. Transaction handles need a checkout that
//! outlives any borrow of the pool, so [`DbPool::checkout`] hands out owned
//! connections.

use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use tracing::debug;

/// Pooled connection detached from the pool's lifetime.
pub type PgPooledConnection = PooledConnection<'static, AsyncPgConnection>;

/// Pool construction and checkout failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// No connection became available in time.
    #[error("failed to get connection from pool: {message}")]
    Checkout {
        /// Backend detail.
        message: String,
    },

    /// The pool could not be built.
    #[error("failed to build connection pool: {message}")]
    Build {
        /// Backend detail.
        message: String,
    },
}

impl PoolError {
    /// Checkout failure.
    pub fn checkout(message: impl Into<String>) -> Self {
        Self::Checkout {
            message: message.into(),
        }
    }

    /// Build failure.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }
}

/// Pool sizing and checkout limits.
///
/// Defaults: ten connections, two kept idle, thirty second checkout timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    database_url: String,
    max_size: u32,
    min_idle: Option<u32>,
    connection_timeout: Duration,
}

impl PoolConfig {
    /// Configuration for `database_url` with default limits.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: 10,
            min_idle: Some(2),
            connection_timeout: Duration::from_secs(30),
        }
    }

    /// Cap on open connections.
    pub const fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Connections kept open while idle.
    pub const fn with_min_idle(mut self, min_idle: Option<u32>) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// How long a checkout may wait.
    pub const fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Target database.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Cap on open connections.
    pub const fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Connections kept open while idle.
    pub const fn min_idle(&self) -> Option<u32> {
        self.min_idle
    }

    /// How long a checkout may wait.
    pub const fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    fn manager(&self) -> AsyncDieselConnectionManager<AsyncPgConnection> {
        AsyncDieselConnectionManager::<AsyncPgConnection>::new(self.database_url.as_str())
    }
}

/// Shared PostgreSQL pool.
#[derive(Clone)]
pub struct DbPool {
    inner: Pool<AsyncPgConnection>,
}

impl DbPool {
    /// Build the pool and open its idle connections.
    ///
    /// # Errors
    ///
    /// [`PoolError::Build`] when the initial connections cannot be opened.
    pub async fn connect(config: &PoolConfig) -> Result<Self, PoolError> {
        let inner = Pool::builder()
            .max_size(config.max_size)
            .min_idle(config.min_idle)
            .connection_timeout(config.connection_timeout)
            .build(config.manager())
            .await
            .map_err(|err| PoolError::build(err.to_string()))?;
        debug!(max_size = config.max_size, "connection pool ready");
        Ok(Self { inner })
    }

    /// Build the pool without connecting; connections open on first checkout.
    pub fn lazy(config: &PoolConfig) -> Self {
        let inner = Pool::builder()
            .max_size(config.max_size)
            .min_idle(config.min_idle)
            .connection_timeout(config.connection_timeout)
            .build_unchecked(config.manager());
        Self { inner }
    }

    /// Check out an owned connection.
    ///
    /// # Errors
    ///
    /// [`PoolError::Checkout`] when no connection frees up within the
    /// configured timeout.
    pub async fn checkout(&self) -> Result<PgPooledConnection, PoolError> {
        self.inner
            .get_owned()
            .await
            .map_err(|err| PoolError::checkout(err.to_string()))
    }

    /// Open and idle connection counts.
    pub fn usage(&self) -> (u32, u32) {
        let state = self.inner.state();
        (state.connections, state.idle_connections)
    }
}
