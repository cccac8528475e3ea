//! Behavioural tests for the request-scoped unit of work.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tokio::runtime::Runtime;
use txkit::domain::UnitOfWork;
use txkit::domain::ports::TransactionError;
use txkit::test_support::{Recorder, RecordingManager};


#[derive(Debug, PartialEq, Eq, thiserror::Error)]
enum HandlerError {
    #[error("handler rejected the request")]
    Rejected,
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

struct TestContext {
    runtime: Runtime,
    recorder: Recorder,
    timeout: Option<Duration>,
    outcome: Option<Result<&'static str, HandlerError>>,
}

type SharedContext = Arc<Mutex<TestContext>>;

#[fixture]
fn world() -> SharedContext {
    Arc::new(Mutex::new(TestContext {
        runtime: Runtime::new().expect("tokio runtime should initialize"),
        recorder: Recorder::default(),
        timeout: None,
        outcome: None,
    }))
}

fn run_handler<F, Fut>(world: &SharedContext, handler: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<&'static str, HandlerError>>,
{
    let (handle, recorder, timeout) = {
        let ctx = world.lock().expect("context lock");
        (ctx.runtime.handle().clone(), ctx.recorder.clone(), ctx.timeout)
    };
    let mut unit = UnitOfWork::new(RecordingManager(recorder));
    if let Some(limit) = timeout {
        unit = unit.with_timeout(limit);
    }
    let outcome = handle.block_on(unit.run(|_| handler()));
    world.lock().expect("context lock").outcome = Some(outcome);
}

#[given("a recording resource manager")]
fn a_recording_resource_manager(world: SharedContext) {
    assert!(world.lock().expect("context lock").recorder.steps().is_empty());
}

#[given("rollback is rigged to fail")]
fn rollback_is_rigged_to_fail(world: SharedContext) {
    world.lock().expect("context lock").recorder.fail_on("rollback");
}

#[given("a unit of work limited to 20 milliseconds")]
fn a_unit_of_work_limited_to_20_milliseconds(world: SharedContext) {
    world.lock().expect("context lock").timeout = Some(Duration::from_millis(20));
}

#[when("a handler succeeds inside the unit of work")]
fn a_handler_succeeds(world: SharedContext) {
    run_handler(&world, || async { Ok("created") });
}

#[when("a handler fails inside the unit of work")]
fn a_handler_fails(world: SharedContext) {
    run_handler(&world, || async { Err(HandlerError::Rejected) });
}

#[when("a handler outlives the limit")]
fn a_handler_outlives_the_limit(world: SharedContext) {
    run_handler(&world, || async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("too late")
    });
}

fn assert_lifecycle(world: &SharedContext, expected: &[&str]) {
    let steps = world.lock().expect("context lock").recorder.steps();
    assert_eq!(steps, expected);
}

#[then("the lifecycle is connect, begin, commit, release")]
fn the_lifecycle_commits(world: SharedContext) {
    assert_lifecycle(&world, &["connect", "begin", "commit", "release"]);
}

#[then("the lifecycle is connect, begin, rollback, release")]
fn the_lifecycle_rolls_back(world: SharedContext) {
    assert_lifecycle(&world, &["connect", "begin", "rollback", "release"]);
}

#[then("the handler result is returned")]
fn the_handler_result_is_returned(world: SharedContext) {
    let ctx = world.lock().expect("context lock");
    assert_eq!(ctx.outcome, Some(Ok("created")));
}

#[then("the handler error is returned unchanged")]
fn the_handler_error_is_returned_unchanged(world: SharedContext) {
    let ctx = world.lock().expect("context lock");
    assert_eq!(ctx.outcome, Some(Err(HandlerError::Rejected)));
}

#[then("the connection is released once")]
fn the_connection_is_released_once(world: SharedContext) {
    let ctx = world.lock().expect("context lock");
    assert_eq!(ctx.recorder.count("release"), 1);
}

#[then("a timeout error is returned")]
fn a_timeout_error_is_returned(world: SharedContext) {
    let ctx = world.lock().expect("context lock");
    assert_eq!(
        ctx.outcome,
        Some(Err(HandlerError::Transaction(TransactionError::timed_out(
            20_u64
        ))))
    );
}

#[scenario(
    path = "tests/features/unit_of_work.feature",
    name = "A successful handler commits its transaction"
)]
fn a_successful_handler_commits_its_transaction(world: SharedContext) {
    drop(world);
}

#[scenario(
    path = "tests/features/unit_of_work.feature",
    name = "A failing handler rolls back and keeps its error"
)]
fn a_failing_handler_rolls_back_and_keeps_its_error(world: SharedContext) {
    drop(world);
}

#[scenario(
    path = "tests/features/unit_of_work.feature",
    name = "A rollback failure never masks the handler error"
)]
fn a_rollback_failure_never_masks_the_handler_error(world: SharedContext) {
    drop(world);
}

#[scenario(
    path = "tests/features/unit_of_work.feature",
    name = "A handler that overruns its budget is rolled back"
)]
fn a_handler_that_overruns_its_budget_is_rolled_back(world: SharedContext) {
    drop(world);
}
