//! Port for transactional resources scoped to a single request.
//!
//! A [`ResourceManager`] hands out one [`TransactionHandle`] per request. The
//! handle moves through connect, begin, commit or rollback, and release; the
//! unit of work drives it and enforces the ordering.
use std::fmt;
use std::ops::Deref;

use async_trait::async_trait;

use super::define_port_error;

/// Lifecycle position of a transaction handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Created but not yet connected.
    Idle,
    /// Holding a connection, no transaction open.
    Connected,
    /// Transaction open.
    Active,
    /// Transaction committed.
    Committed,
    /// Transaction rolled back.
    RolledBack,
    /// Connection returned to its pool.
    Released,
}

impl TransactionState {
    /// Whether commit or rollback has already happened.
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Released)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::Released => "released",
        };
        f.write_str(label)
    }
}

define_port_error! {
    /// Errors raised while driving a transaction handle.
    pub enum TransactionError {
        /// No connection could be acquired.
        Connect { message: String } => "failed to acquire connection: {message}",
        /// The transaction could not be opened.
        Begin { message: String } => "failed to begin transaction: {message}",
        /// Commit was rejected by the backend.
        Commit { message: String } => "failed to commit transaction: {message}",
        /// Rollback was rejected by the backend.
        Rollback { message: String } => "failed to roll back transaction: {message}",
        /// The connection could not be returned.
        Release { message: String } => "failed to release connection: {message}",
        /// The request exceeded its time budget.
        TimedOut { after_ms: u64 } => "request timed out after {after_ms} ms",
        /// An operation was attempted out of order.
        InvalidState { operation: &'static str, state: TransactionState } =>
            "cannot {operation} a transaction that is {state}",
    }
}

/// Connection plus transaction for one request.
///
/// Implementations only talk to the backend; ordering and state tracking are
/// the caller's concern.
#[async_trait]
pub trait TransactionHandle: Send + 'static {
    /// Value handed to request handlers so their data access joins the
    /// transaction.
    type Context: Clone + Send + Sync + 'static;

    /// Context for the underlying connection.
    fn context(&self) -> Self::Context;

    /// Acquire a connection.
    async fn connect(&mut self) -> Result<(), TransactionError>;

    /// Open a transaction on the acquired connection.
    async fn begin_transaction(&mut self) -> Result<(), TransactionError>;

    /// Make the transaction's writes durable.
    async fn commit(&mut self) -> Result<(), TransactionError>;

    /// Discard the transaction's writes.
    async fn rollback(&mut self) -> Result<(), TransactionError>;

    /// Return the connection to its source.
    async fn release(&mut self) -> Result<(), TransactionError>;
}

/// Factory for per-request transaction handles.
pub trait ResourceManager: Send + Sync + 'static {
    /// Handle type produced for each request.
    type Handle: TransactionHandle;

    /// Create a fresh, unconnected handle.
    fn create_handle(&self) -> Self::Handle;
}

/// Request-scoped access to the active transaction.
///
/// # Examples
/// ```
/// use txkit::domain::ports::TransactionContext;
///
/// let ctx = TransactionContext::new(7_u32);
/// assert_eq!(*ctx, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext<C>(C);

impl<C> TransactionContext<C> {
    /// Wrap a handle context.
    pub const fn new(context: C) -> Self {
        Self(context)
    }

    /// Unwrap the handle context.
    pub fn into_inner(self) -> C {
        self.0
    }
}

impl<C> Deref for TransactionContext<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
