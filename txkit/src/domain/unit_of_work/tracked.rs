//! State tracking around a raw transaction handle.

use crate::domain::ports::{TransactionError, TransactionHandle, TransactionState};

/// Handle wrapper that refuses out-of-order lifecycle calls.
///
/// Commit and rollback both require [`TransactionState::Active`], so at most
/// one of them ever reaches the backend. Release runs at most once and marks
/// the handle released even when the backend reports a failure.
pub(crate) struct TrackedHandle<H> {
    handle: H,
    state: TransactionState,
}

impl<H: TransactionHandle> TrackedHandle<H> {
    pub(crate) const fn new(handle: H) -> Self {
        Self {
            handle,
            state: TransactionState::Idle,
        }
    }

    pub(crate) const fn state(&self) -> TransactionState {
        self.state
    }

    pub(crate) fn context(&self) -> H::Context {
        self.handle.context()
    }

    fn require(
        &self,
        operation: &'static str,
        expected: TransactionState,
    ) -> Result<(), TransactionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TransactionError::invalid_state(operation, self.state))
        }
    }

    pub(crate) async fn connect(&mut self) -> Result<(), TransactionError> {
        self.require("connect", TransactionState::Idle)?;
        self.handle.connect().await?;
        self.state = TransactionState::Connected;
        Ok(())
    }

    pub(crate) async fn begin(&mut self) -> Result<(), TransactionError> {
        self.require("begin", TransactionState::Connected)?;
        self.handle.begin_transaction().await?;
        self.state = TransactionState::Active;
        Ok(())
    }

    pub(crate) async fn commit(&mut self) -> Result<(), TransactionError> {
        self.require("commit", TransactionState::Active)?;
        self.handle.commit().await?;
        self.state = TransactionState::Committed;
        Ok(())
    }

    pub(crate) async fn rollback(&mut self) -> Result<(), TransactionError> {
        self.require("roll back", TransactionState::Active)?;
        self.handle.rollback().await?;
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    pub(crate) async fn release(&mut self) -> Result<(), TransactionError> {
        if self.state == TransactionState::Released {
            return Err(TransactionError::invalid_state("release", self.state));
        }
        let result = self.handle.release().await;
        self.state = TransactionState::Released;
        result
    }
}
