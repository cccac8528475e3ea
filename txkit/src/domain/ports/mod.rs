//! Domain ports for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod transaction;

pub use transaction::{
    ResourceManager, TransactionContext, TransactionError, TransactionHandle, TransactionState,
};
