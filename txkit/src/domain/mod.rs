//! Transport- and storage-agnostic core.
//!
//! Purpose: define the response envelope, the application error model, the
//! unit-of-work discipline, and the column value transforms. Nothing in here
//! depends on actix or diesel; inbound and outbound adapters translate these
//! types at the edge.
//!
//! Public surface:
//! - [`AppError`] / [`ErrorKind`]: business-rule failures with resolved codes.
//! - [`Envelope`] and the `envelope_for_*` constructors: the wire contract.
//! - [`Failure`] / [`HttpException`]: the boundary error taxonomy.
//! - [`UnitOfWork`] / [`ActiveTransaction`]: per-request transaction lifecycle.
//! - [`transforms`]: boolean flag, JSON text, and generated id transforms.

pub mod envelope;
pub mod error;
pub mod failure;
pub mod ports;
pub mod transforms;
pub mod unit_of_work;

pub use self::envelope::{
    DEFAULT_ERROR_MESSAGE, EXCEPTION_FALLBACK_MESSAGE, Envelope, EnvelopeParts, ResponseStatus,
    SUCCESS_MESSAGE, build_envelope, envelope_for_error, envelope_for_exception,
    envelope_for_success,
};
pub use self::error::{AppError, ErrorKind, ErrorSpec, INTERNAL_ERROR_CODE};
pub use self::failure::{Failure, HttpException};
pub use self::unit_of_work::{ActiveTransaction, UnitOfWork};
