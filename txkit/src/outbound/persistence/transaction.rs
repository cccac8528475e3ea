//! Transaction handles backed by pooled diesel-async connections.
//!
//! The request handler and the handle share one checked-out connection
//! through [`SharedConnection`]. Releasing takes the connection back out and
//! returns it to the pool; any clone still alive at that point is reported as
//! a leak.

use std::sync::Arc;

use async_trait::async_trait;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, TransactionManager};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::debug;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::pool::{DbPool, PgPooledConnection};
use crate::domain::ports::{ResourceManager, TransactionError, TransactionHandle};

/// Request-scoped access to the transaction's connection.
///
/// # Examples
/// ```no_run
/// use diesel_async::RunQueryDsl;
/// use txkit::domain::ports::TransactionError;
/// use txkit::outbound::persistence::SharedConnection;
///
/// async fn ping(shared: &SharedConnection) -> Result<usize, TransactionError> {
///     let mut conn = shared.lock().await?;
///     diesel::sql_query("SELECT 1")
///         .execute(&mut *conn)
///         .await
///         .map_err(|err| TransactionError::connect(err.to_string()))
/// }
/// ```
#[derive(Clone, Default)]
pub struct SharedConnection {
    slot: Arc<Mutex<Option<PgPooledConnection>>>,
}

impl SharedConnection {
    /// Exclusive access to the connection for one statement batch.
    ///
    /// # Errors
    ///
    /// [`TransactionError::Connect`] when the connection was never acquired
    /// or has already been released.
    pub async fn lock(&self) -> Result<MappedMutexGuard<'_, AsyncPgConnection>, TransactionError> {
        MutexGuard::try_map(self.slot.lock().await, |slot| slot.as_deref_mut())
            .map_err(|_| TransactionError::connect("connection is not held by this request"))
    }

    /// Whether a connection is currently held.
    pub async fn is_held(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    fn outstanding_clones(&self) -> usize {
        Arc::strong_count(&self.slot).saturating_sub(1)
    }
}

/// Hands out one [`DieselTransactionHandle`] per request.
#[derive(Clone)]
pub struct DieselResourceManager {
    pool: DbPool,
}

impl DieselResourceManager {
    /// Manager drawing connections from `pool`.
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ResourceManager for DieselResourceManager {
    type Handle = DieselTransactionHandle;

    fn create_handle(&self) -> Self::Handle {
        DieselTransactionHandle {
            pool: self.pool.clone(),
            connection: SharedConnection::default(),
        }
    }
}

/// Single-request transaction over a pooled PostgreSQL connection.
pub struct DieselTransactionHandle {
    pool: DbPool,
    connection: SharedConnection,
}

#[async_trait]
impl TransactionHandle for DieselTransactionHandle {
    type Context = SharedConnection;

    fn context(&self) -> SharedConnection {
        self.connection.clone()
    }

    async fn connect(&mut self) -> Result<(), TransactionError> {
        let conn = self.pool.checkout().await.map_err(map_pool_error)?;
        *self.connection.slot.lock().await = Some(conn);
        debug!("connection checked out");
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<(), TransactionError> {
        let mut conn = self.connection.lock().await?;
        AnsiTransactionManager::begin_transaction(&mut *conn)
            .await
            .map_err(|err| map_diesel_error(err, TransactionError::begin))
    }

    async fn commit(&mut self) -> Result<(), TransactionError> {
        let mut conn = self.connection.lock().await?;
        AnsiTransactionManager::commit_transaction(&mut *conn)
            .await
            .map_err(|err| map_diesel_error(err, TransactionError::commit))
    }

    async fn rollback(&mut self) -> Result<(), TransactionError> {
        let mut conn = self.connection.lock().await?;
        AnsiTransactionManager::rollback_transaction(&mut *conn)
            .await
            .map_err(|err| map_diesel_error(err, TransactionError::rollback))
    }

    async fn release(&mut self) -> Result<(), TransactionError> {
        let returned = self.connection.slot.lock().await.take();
        drop(returned);
        match self.connection.outstanding_clones() {
            0 => Ok(()),
            leaked => Err(TransactionError::release(format!(
                "{leaked} connection handle(s) still referenced by the request"
            ))),
        }
    }
}
