//! Request-scoped unit of work.
//!
//! One [`ActiveTransaction`] exists per request. It is opened by
//! [`UnitOfWork::begin`], exposes a [`TransactionContext`] for the handler,
//! and is closed by [`ActiveTransaction::finish`], which commits or rolls back
//! depending on the handler outcome and always releases the connection.
//!
//! ```text
//! create -> connect -> begin -> handler -> commit | rollback -> release
//! ```

mod tracked;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::domain::ports::{
    ResourceManager, TransactionContext, TransactionError, TransactionHandle, TransactionState,
};
use tracked::TrackedHandle;

/// Factory for request-scoped transactions.
///
/// # Examples
/// ```no_run
/// # use txkit::domain::UnitOfWork;
/// # use txkit::domain::ports::{ResourceManager, TransactionContext, TransactionError};
/// # async fn demo<M: ResourceManager>(manager: M) -> Result<u32, TransactionError> {
/// let unit = UnitOfWork::new(manager);
/// unit.run(|_ctx| async { Ok::<_, TransactionError>(42) }).await
/// # }
/// ```
pub struct UnitOfWork<M> {
    manager: Arc<M>,
    timeout: Option<Duration>,
}

impl<M> Clone for UnitOfWork<M> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            timeout: self.timeout,
        }
    }
}

type ContextOf<M> = <<M as ResourceManager>::Handle as TransactionHandle>::Context;

impl<M: ResourceManager> UnitOfWork<M> {
    /// Unit of work over an owned resource manager.
    pub fn new(manager: M) -> Self {
        Self::from_shared(Arc::new(manager))
    }

    /// Unit of work over a shared resource manager.
    pub const fn from_shared(manager: Arc<M>) -> Self {
        Self {
            manager,
            timeout: None,
        }
    }

    /// Bound every handler run by this unit of work.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Configured handler timeout.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Acquire a connection and open a transaction.
    ///
    /// When either step fails the handle is released before the error is
    /// returned.
    pub async fn begin(&self) -> Result<ActiveTransaction<M::Handle>, TransactionError> {
        let mut handle = TrackedHandle::new(self.manager.create_handle());
        let opened = match handle.connect().await {
            Ok(()) => handle.begin().await,
            Err(err) => Err(err),
        };
        if let Err(err) = opened {
            warn!(error = %err, kind = err.label(), "failed to open transaction");
            if let Err(release_err) = handle.release().await {
                error!(error = %release_err, "release after failed begin also failed");
            }
            return Err(err);
        }
        debug!("transaction opened");
        let context = handle.context();
        Ok(ActiveTransaction {
            context,
            guard: HandleGuard {
                handle: Some(handle),
            },
        })
    }

    /// Drive `future` under the configured timeout.
    ///
    /// An elapsed timeout becomes [`TransactionError::TimedOut`]; without a
    /// timeout the future runs to completion.
    pub async fn bounded<F, T, E>(&self, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<TransactionError>,
    {
        let Some(limit) = self.timeout else {
            return future.await;
        };
        match tokio::time::timeout(limit, future).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let after_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                warn!(after_ms, "handler exceeded its time budget");
                Err(E::from(TransactionError::timed_out(after_ms)))
            }
        }
    }

    /// Run `handler` inside a fresh transaction.
    ///
    /// The handler's success commits, its failure (or a timeout) rolls back;
    /// the connection is released either way.
    pub async fn run<F, Fut, T, E>(&self, handler: F) -> Result<T, E>
    where
        F: FnOnce(TransactionContext<ContextOf<M>>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TransactionError>,
    {
        let transaction = self.begin().await?;
        let outcome = self.bounded(handler(transaction.context())).await;
        transaction.finish(outcome).await
    }
}

/// Open transaction bound to one request.
///
/// Dropping it, or the future returned by [`finish`](Self::finish), before
/// the connection is released schedules a rollback and release on the
/// current tokio runtime.
pub struct ActiveTransaction<H: TransactionHandle> {
    context: H::Context,
    guard: HandleGuard<H>,
}

impl<H: TransactionHandle> ActiveTransaction<H> {
    /// Context handed to the request handler.
    pub fn context(&self) -> TransactionContext<H::Context> {
        TransactionContext::new(self.context.clone())
    }

    /// Current lifecycle position.
    pub fn state(&self) -> TransactionState {
        self.guard.state()
    }

    /// Commit or roll back according to `outcome`, then release.
    ///
    /// - `Ok` commits; a failed commit is followed by a rollback attempt and
    ///   the commit error is returned.
    /// - `Err` rolls back; a rollback failure is logged and the handler
    ///   error is returned unchanged.
    /// - A release failure is returned only when everything before it
    ///   succeeded.
    ///
    /// The transaction's own context is dropped first, so only clones the
    /// request kept are still alive when the handle is released.
    pub async fn finish<T, E>(self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<TransactionError>,
    {
        let Self { context, guard } = self;
        drop(context);
        guard.settle(outcome).await
    }
}

/// Owns the handle until it is released.
///
/// The handle stays in place while commit, rollback and release are awaited,
/// so a cancelled settlement still reaches the drop path.
struct HandleGuard<H: TransactionHandle> {
    handle: Option<TrackedHandle<H>>,
}

impl<H: TransactionHandle> HandleGuard<H> {
    fn state(&self) -> TransactionState {
        self.handle
            .as_ref()
            .map_or(TransactionState::Released, TrackedHandle::state)
    }

    async fn settle<T, E>(mut self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<TransactionError>,
    {
        let Some(handle) = self.handle.as_mut() else {
            return outcome;
        };
        let settled = match outcome {
            Ok(value) => match handle.commit().await {
                Ok(()) => {
                    debug!("transaction committed");
                    Ok(value)
                }
                Err(err) => {
                    warn!(error = %err, "commit failed, rolling back");
                    if let Err(rollback_err) = handle.rollback().await {
                        error!(error = %rollback_err, "rollback after failed commit failed");
                    }
                    Err(E::from(err))
                }
            },
            Err(err) => {
                match handle.rollback().await {
                    Ok(()) => debug!("transaction rolled back"),
                    Err(rollback_err) => {
                        error!(error = %rollback_err, "rollback failed");
                    }
                }
                Err(err)
            }
        };
        let released = handle.release().await;
        self.handle = None;
        match released {
            Ok(()) => settled,
            Err(release_err) if settled.is_ok() => Err(E::from(release_err)),
            Err(release_err) => {
                error!(error = %release_err, "release failed after failed request");
                settled
            }
        }
    }
}

impl<H: TransactionHandle> Drop for HandleGuard<H> {
    fn drop(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        if handle.state() == TransactionState::Released {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(state = %handle.state(), "transaction abandoned, rolling back");
                runtime.spawn(async move {
                    if handle.state() == TransactionState::Active {
                        if let Err(err) = handle.rollback().await {
                            error!(error = %err, "rollback of abandoned transaction failed");
                        }
                    }
                    if let Err(err) = handle.release().await {
                        error!(error = %err, "release of abandoned transaction failed");
                    }
                });
            }
            Err(_) => {
                error!(
                    state = %handle.state(),
                    "transaction abandoned outside a runtime, connection leaked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests;
