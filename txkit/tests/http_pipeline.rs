//! End-to-end behaviour of the middleware stack around recording doubles.

use std::time::Duration;

use actix_web::body::to_bytes;
use actix_web::http::StatusCode;
use actix_web::web::Bytes;
use actix_web::{App, HttpRequest, HttpResponse, test, web};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use txkit::domain::ports::TransactionContext;
use txkit::domain::{AppError, ErrorKind, UnitOfWork};
use txkit::inbound::http::{
    ApiResult, EnvelopeResponses, ExceptionFilter, Transactional, mark_raw_response, not_found,
};
use txkit::test_support::{Recorder, RecordingManager};


async fn create(ctx: TransactionContext<Recorder>) -> ApiResult<web::Json<Value>> {
    ctx.note("handler");
    Ok(web::Json(json!({"id": 1})))
}

async fn missing(ctx: TransactionContext<Recorder>) -> Result<HttpResponse, AppError> {
    ctx.note("handler");
    Err(AppError::with_message(ErrorKind::NoExistsData, "post 7 missing"))
}

async fn slow(ctx: TransactionContext<Recorder>) -> HttpResponse {
    ctx.note("handler");
    tokio::time::sleep(Duration::from_secs(5)).await;
    HttpResponse::Ok().finish()
}

async fn export(req: HttpRequest) -> HttpResponse {
    mark_raw_response(&req);
    HttpResponse::Ok().content_type("text/csv").body("id\n1\n")
}

async fn greeting() -> HttpResponse {
    HttpResponse::Ok().body("hello")
}

#[fixture]
fn recorder() -> Recorder {
    Recorder::default()
}

async fn taken(ctx: TransactionContext<Recorder>) -> HttpResponse {
    ctx.note("handler");
    HttpResponse::Conflict().json(json!({"reason": "taken"}))
}

async fn send(
    recorder: &Recorder,
    timeout: Option<Duration>,
    req: test::TestRequest,
) -> (StatusCode, Bytes) {
    let mut unit = UnitOfWork::new(RecordingManager(recorder.clone()));
    if let Some(limit) = timeout {
        unit = unit.with_timeout(limit);
    }
    let app = test::init_service(
        App::new()
            .route("/posts", web::post().to(create))
            .route("/posts/7", web::get().to(missing))
            .route("/slow", web::get().to(slow))
            .route("/export", web::get().to(export))
            .route("/greeting", web::get().to(greeting))
            .route("/taken", web::post().to(taken))
            .default_service(web::to(not_found))
            .wrap(Transactional::new(unit))
            .wrap(EnvelopeResponses)
            .wrap(ExceptionFilter),
    )
    .await;
    match test::try_call_service(&app, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            (status, test::read_body(res).await)
        }
        Err(err) => {
            let res = err.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.expect("error body");
            (status, body)
        }
    }
}

fn json_body(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).expect("envelope should be JSON")
}

#[rstest]
#[actix_web::test]
async fn success_is_enveloped_and_committed(recorder: Recorder) {
    let (status, body) = send(&recorder, None, test::TestRequest::post().uri("/posts")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({
            "status": "SUCCESS",
            "statusCode": 200,
            "message": "The API call completed successfully.",
            "data": {"id": 1}
        })
    );
    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "handler", "commit", "release"]
    );
}

#[rstest]
#[actix_web::test]
async fn application_error_is_enveloped_and_rolled_back(recorder: Recorder) {
    let (status, body) = send(&recorder, None, test::TestRequest::get().uri("/posts/7")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(&body),
        json!({"status": "ERROR", "statusCode": 404, "message": "post 7 missing"})
    );
    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "handler", "rollback", "release"]
    );
}

#[rstest]
#[actix_web::test]
async fn timed_out_handler_is_rolled_back(recorder: Recorder) {
    let (status, body) = send(
        &recorder,
        Some(Duration::from_millis(50)),
        test::TestRequest::get().uri("/slow"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(&body);
    assert_eq!(body["message"], "request timed out after 50 ms");
    assert_eq!(body["data"], json!({}));
    assert_eq!(recorder.count("commit"), 0);
    assert_eq!(recorder.count("rollback"), 1);
    assert_eq!(recorder.count("release"), 1);
}

#[rstest]
#[actix_web::test]
async fn commit_failure_becomes_internal_error(recorder: Recorder) {
    recorder.fail_on("commit");

    let (status, body) = send(&recorder, None, test::TestRequest::post().uri("/posts")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["status"], "ERROR");
    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "handler", "commit", "rollback", "release"]
    );
}

#[rstest]
#[case("connect", vec!["connect", "release"])]
#[case("begin", vec!["connect", "begin", "release"])]
#[actix_web::test]
async fn failure_to_open_skips_the_handler(
    recorder: Recorder,
    #[case] failing: &str,
    #[case] expected: Vec<&str>,
) {
    recorder.fail_on(failing);

    let (status, _) = send(&recorder, None, test::TestRequest::post().uri("/posts")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(recorder.steps(), expected);
}

#[rstest]
#[actix_web::test]
async fn raw_responses_are_untouched_but_committed(recorder: Recorder) {
    let (status, body) = send(&recorder, None, test::TestRequest::get().uri("/export")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "id\n1\n");
    assert_eq!(recorder.count("commit"), 1);
}

#[rstest]
#[actix_web::test]
async fn text_payloads_become_string_data(recorder: Recorder) {
    let (_, body) = send(&recorder, None, test::TestRequest::get().uri("/greeting")).await;

    assert_eq!(json_body(&body)["data"], "hello");
}

#[rstest]
#[actix_web::test]
async fn unknown_routes_render_not_found_envelope(recorder: Recorder) {
    let (status, body) = send(&recorder, None, test::TestRequest::get().uri("/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = json_body(&body);
    assert_eq!(body["message"], "Cannot GET /nope");
    assert_eq!(
        body["data"],
        json!({"statusCode": 404, "message": "Cannot GET /nope"})
    );
    assert_eq!(recorder.count("rollback"), 1);
}

#[rstest]
#[actix_web::test]
async fn bare_error_responses_are_enveloped_and_rolled_back(recorder: Recorder) {
    let (status, body) = send(&recorder, None, test::TestRequest::post().uri("/taken")).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json_body(&body),
        json!({
            "status": "ERROR",
            "statusCode": 409,
            "message": "Conflict",
            "data": {"reason": "taken"}
        })
    );
    assert_eq!(
        recorder.steps(),
        vec!["connect", "begin", "handler", "rollback", "release"]
    );
}
