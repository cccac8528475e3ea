//! Diesel and pool failures expressed as transaction errors.

use tracing::debug;

use super::pool::PoolError;
use crate::domain::ports::TransactionError;

/// Pool checkout or build failure as a connect error.
pub(crate) fn map_pool_error(error: PoolError) -> TransactionError {
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    TransactionError::connect(message)
}

/// Diesel failure during a lifecycle step.
///
/// `step` builds the variant for the operation that failed; the backend
/// detail is logged at debug level and summarised in the message.
pub(crate) fn map_diesel_error<S>(error: diesel::result::Error, step: S) -> TransactionError
where
    S: FnOnce(String) -> TransactionError,
{
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "transaction statement failed");
        }
        other => debug!(error = %other, "transaction statement failed"),
    }

    let summary = match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            "database connection closed"
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            "serialization failure"
        }
        DieselError::DatabaseError(_, _) => "database error",
        DieselError::AlreadyInTransaction => "connection already inside a transaction",
        DieselError::NotInTransaction => "no transaction open on connection",
        DieselError::BrokenTransactionManager => "transaction manager is broken",
        _ => "database error",
    };
    step(summary.to_owned())
}
