//! Lifecycle ordering of the unit of work.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::test_support::{Recorder, RecordingHandle, RecordingManager};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
enum HandlerError {
    #[error("handler refused")]
    Refused,
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

#[fixture]
fn recorder() -> Recorder {
    Recorder::default()
}

fn unit(recorder: &Recorder) -> UnitOfWork<RecordingManager> {
    UnitOfWork::new(RecordingManager(recorder.clone()))
}

#[rstest]
#[tokio::test]
async fn success_commits_then_releases(recorder: Recorder) {
    let result: Result<u32, HandlerError> = unit(&recorder).run(|_| async { Ok(7) }).await;

    assert_eq!(result, Ok(7));
    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "commit", "release"]
    );
}

#[rstest]
#[tokio::test]
async fn failure_rolls_back_and_keeps_handler_error(recorder: Recorder) {
    let result: Result<u32, HandlerError> = unit(&recorder)
        .run(|_| async { Err(HandlerError::Refused) })
        .await;

    assert_eq!(result, Err(HandlerError::Refused));
    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "rollback", "release"]
    );
}

#[rstest]
#[tokio::test]
async fn rollback_failure_does_not_replace_handler_error(recorder: Recorder) {
    recorder.fail_on("rollback");
    recorder.fail_on("release");

    let result: Result<(), HandlerError> = unit(&recorder)
        .run(|_| async { Err(HandlerError::Refused) })
        .await;

    assert_eq!(result, Err(HandlerError::Refused));
    assert_eq!(recorder.count("release"), 1);
}

#[rstest]
#[tokio::test]
async fn commit_failure_rolls_back_and_surfaces(recorder: Recorder) {
    recorder.fail_on("commit");

    let result: Result<(), HandlerError> = unit(&recorder).run(|_| async { Ok(()) }).await;

    assert_eq!(
        result,
        Err(HandlerError::Transaction(TransactionError::commit(
            "injected"
        )))
    );
    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "commit", "rollback", "release"]
    );
}

#[rstest]
#[tokio::test]
async fn release_failure_surfaces_after_success(recorder: Recorder) {
    recorder.fail_on("release");

    let result: Result<(), HandlerError> = unit(&recorder).run(|_| async { Ok(()) }).await;

    assert_eq!(
        result,
        Err(HandlerError::Transaction(TransactionError::release(
            "injected"
        )))
    );
}

#[rstest]
#[case("connect", vec!["connect", "release"])]
#[case("begin", vec!["connect", "begin", "release"])]
#[tokio::test]
async fn open_failure_releases_without_running_handler(
    recorder: Recorder,
    #[case] failing: &str,
    #[case] expected: Vec<&str>,
) {
    recorder.fail_on(failing);
    let ran = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&ran);

    let result: Result<(), HandlerError> = unit(&recorder)
        .run(|_| async move {
            *flag.lock().expect("lock") = true;
            Ok(())
        })
        .await;

    assert!(result.is_err());
    assert!(!*ran.lock().expect("lock"));
    assert_eq!(recorder.steps(), expected);
}

#[rstest]
#[tokio::test]
async fn handler_sees_the_transaction_context(recorder: Recorder) {
    let result: Result<usize, HandlerError> = unit(&recorder)
        .run(|ctx| async move { Ok(ctx.count("begin")) })
        .await;

    assert_eq!(result, Ok(1));
}

#[rstest]
#[tokio::test]
async fn timeout_rolls_back(recorder: Recorder) {
    let result: Result<(), HandlerError> = unit(&recorder)
        .with_timeout(Duration::from_millis(20))
        .run(|_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

    assert_eq!(
        result,
        Err(HandlerError::Transaction(TransactionError::timed_out(20_u64)))
    );
    assert_eq!(recorder.count("rollback"), 1);
    assert_eq!(recorder.count("commit"), 0);
    assert_eq!(recorder.count("release"), 1);
}

#[rstest]
#[tokio::test]
async fn abandoned_transaction_is_rolled_back(recorder: Recorder) {
    let transaction = unit(&recorder).begin().await.expect("begin");
    assert_eq!(transaction.state(), TransactionState::Active);

    drop(transaction);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "rollback", "release"]
    );
}

#[rstest]
#[tokio::test]
async fn lifecycle_calls_out_of_order_are_refused(recorder: Recorder) {
    let mut handle = TrackedHandle::new(RecordingHandle(recorder.clone()));

    let err = handle.commit().await.expect_err("commit before begin");
    assert_eq!(
        err,
        TransactionError::invalid_state("commit", TransactionState::Idle)
    );

    handle.connect().await.expect("connect");
    handle.begin().await.expect("begin");
    handle.rollback().await.expect("rollback");
    assert!(handle.commit().await.is_err());
    handle.release().await.expect("release");
    assert!(handle.release().await.is_err());
    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "rollback", "release"]
    );
}

#[rstest]
#[tokio::test]
async fn cancelled_settlement_still_releases(recorder: Recorder) {
    recorder.stall_on("commit");
    let transaction = unit(&recorder).begin().await.expect("begin");

    let settling = transaction.finish(Ok::<(), HandlerError>(()));
    let cancelled = tokio::time::timeout(Duration::from_millis(10), settling).await;
    assert!(cancelled.is_err());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "commit", "rollback", "release"]
    );
}

#[rstest]
#[tokio::test]
async fn settled_transaction_is_not_touched_on_drop(recorder: Recorder) {
    let result: Result<(), HandlerError> = unit(&recorder).run(|_| async { Ok(()) }).await;
    assert_eq!(result, Ok(()));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(recorder.count("release"), 1);
    assert_eq!(recorder.count("rollback"), 0);
}
