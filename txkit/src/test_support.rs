//! Recording transaction doubles shared by unit and integration tests.
//!
//! Compiled for this crate's own tests and, through the `test-support`
//! feature, for the suites under `tests/`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{ResourceManager, TransactionError, TransactionHandle};

#[derive(Default)]
struct Journal {
    steps: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    stalling: Mutex<HashSet<String>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared log of lifecycle calls with per-step failure injection.
///
/// # Examples
/// ```
/// use txkit::test_support::Recorder;
///
/// let recorder = Recorder::default();
/// recorder.note("handler");
/// assert_eq!(recorder.steps(), ["handler"]);
/// ```
#[derive(Clone, Default)]
pub struct Recorder(Arc<Journal>);

impl Recorder {
    /// Make `step` fail with an injected error.
    pub fn fail_on(&self, step: &str) {
        locked(&self.0.failing).insert(step.to_owned());
    }

    /// Make `step` never complete.
    pub fn stall_on(&self, step: &str) {
        locked(&self.0.stalling).insert(step.to_owned());
    }

    /// Steps seen so far, oldest first.
    pub fn steps(&self) -> Vec<String> {
        locked(&self.0.steps).clone()
    }

    /// How often `step` was seen.
    pub fn count(&self, step: &str) -> usize {
        self.steps().iter().filter(|seen| *seen == step).count()
    }

    /// Record a step that cannot fail.
    pub fn note(&self, step: &str) {
        locked(&self.0.steps).push(step.to_owned());
    }

    async fn step(&self, step: &str) -> Result<(), TransactionError> {
        self.note(step);
        if locked(&self.0.stalling).contains(step) {
            std::future::pending::<()>().await;
        }
        if !locked(&self.0.failing).contains(step) {
            return Ok(());
        }
        Err(match step {
            "connect" => TransactionError::connect("injected"),
            "begin" => TransactionError::begin("injected"),
            "commit" => TransactionError::commit("injected"),
            "rollback" => TransactionError::rollback("injected"),
            _ => TransactionError::release("injected"),
        })
    }
}

/// Handle that records every lifecycle call.
pub struct RecordingHandle(pub Recorder);

#[async_trait]
impl TransactionHandle for RecordingHandle {
    type Context = Recorder;

    fn context(&self) -> Recorder {
        self.0.clone()
    }

    async fn connect(&mut self) -> Result<(), TransactionError> {
        self.0.step("connect").await
    }

    async fn begin_transaction(&mut self) -> Result<(), TransactionError> {
        self.0.step("begin").await
    }

    async fn commit(&mut self) -> Result<(), TransactionError> {
        self.0.step("commit").await
    }

    async fn rollback(&mut self) -> Result<(), TransactionError> {
        self.0.step("rollback").await
    }

    async fn release(&mut self) -> Result<(), TransactionError> {
        self.0.step("release").await
    }
}

/// Manager handing out [`RecordingHandle`]s over one shared [`Recorder`].
pub struct RecordingManager(pub Recorder);

impl ResourceManager for RecordingManager {
    type Handle = RecordingHandle;

    fn create_handle(&self) -> RecordingHandle {
        RecordingHandle(self.0.clone())
    }
}
