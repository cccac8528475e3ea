//! Last-chance rendering of failed requests as error envelopes.
//!
//! Wrap this outermost. `Err` results from inner services, responses that
//! carry an attached error (handler and extractor failures) and bare 4xx/5xx
//! responses are all turned into [`envelope_for_exception`] bodies after one
//! structured log record. Only requests marked with
//! [`RawResponse`](super::RawResponse) keep a bare error body.

use std::task::{Context, Poll};

use actix_web::body::{EitherBody, MessageBody, to_bytes};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, HttpRequest, HttpResponse};
use chrono::{SecondsFormat, Utc};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde_json::json;
use tracing::error;

use super::envelope::{RawResponse, decode_payload};
use super::error::envelope_response;
use crate::domain::{
    AppError, EXCEPTION_FALLBACK_MESSAGE, Failure, HttpException, envelope_for_exception,
};

/// Exception normalisation middleware.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use txkit::inbound::http::ExceptionFilter;
///
/// let _app = App::new().wrap(ExceptionFilter);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionFilter;

impl<S, B> Transform<S, ServiceRequest> for ExceptionFilter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ExceptionFilterMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ExceptionFilterMiddleware { service }))
    }
}

/// Service wrapper produced by [`ExceptionFilter`].
pub struct ExceptionFilterMiddleware<S> {
    service: S,
}

/// Request line captured before routing; the router needs sole ownership
/// of the request while it matches.
struct RequestLine {
    method: String,
    path: String,
}

impl<S, B> Service<ServiceRequest> for ExceptionFilterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let line = RequestLine {
            method: req.method().to_string(),
            path: req.path().to_owned(),
        };
        let fut = self.service.call(req);
        Box::pin(async move {
            let res = match fut.await {
                Ok(res) => res,
                Err(err) => {
                    let failure = classify(&err);
                    report(&line, &failure);
                    return Err(failure.into());
                }
            };
            if let Some(failure) = res.response().error().map(classify) {
                report(&line, &failure);
                let (request, _) = res.into_parts();
                return Ok(render(request, &failure).map_into_right_body());
            }
            if !is_bare_failure(&res) {
                return Ok(res.map_into_left_body());
            }
            let (request, response) = res.into_parts();
            let failure = bare_failure(response).await;
            report(&line, &failure);
            Ok(render(request, &failure).map_into_right_body())
        })
    }
}

/// Sort an actix error into the failure taxonomy.
///
/// Domain errors are recovered by downcast. Anything else keeps its status:
/// client errors become HTTP exceptions, server errors become unexpected.
pub fn classify(err: &Error) -> Failure {
    if let Some(app) = err.as_error::<AppError>() {
        return Failure::App(app.clone());
    }
    if let Some(failure) = err.as_error::<Failure>() {
        return failure.clone();
    }
    let status = err.as_response_error().status_code();
    let message = err.to_string();
    if status.is_server_error() {
        return Failure::internal(message);
    }
    let body = json!({
        "statusCode": status.as_u16(),
        "message": message,
        "error": status.canonical_reason().unwrap_or("Error"),
    });
    Failure::Http(HttpException::new(status.as_u16(), message).with_response(body))
}

fn is_bare_failure<B>(res: &ServiceResponse<B>) -> bool {
    let status = res.status();
    (status.is_client_error() || status.is_server_error())
        && !res.request().extensions().contains::<RawResponse>()
}

/// HTTP exception for an error response built without an attached error.
///
/// The body, decoded like a success payload, becomes the exception's
/// response; an empty or unreadable body keeps the default one.
async fn bare_failure<B: MessageBody>(response: HttpResponse<B>) -> Failure {
    let (head, body) = response.into_parts();
    let status = head.status();
    let message = status
        .canonical_reason()
        .unwrap_or(EXCEPTION_FALLBACK_MESSAGE);
    let exception = HttpException::new(status.as_u16(), message);
    let payload = match to_bytes(body).await {
        Ok(bytes) => decode_payload(head.headers(), &bytes),
        Err(_) => None,
    };
    Failure::Http(match payload {
        Some(response) => exception.with_response(response),
        None => exception,
    })
}

fn report(line: &RequestLine, failure: &Failure) {
    error!(
        timestamp = %Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        method = %line.method,
        path = %line.path,
        exception = %failure.diagnostic(),
        "request failed"
    );
}

fn render(request: HttpRequest, failure: &Failure) -> ServiceResponse {
    ServiceResponse::new(request, envelope_response(&envelope_for_exception(failure)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::inbound::http::mark_raw_response;
    use actix_web::dev::ServiceResponse;
    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};
    use rstest::rstest;
    use serde_json::Value;

    async fn fail_with_app_error() -> Result<HttpResponse, AppError> {
        Err(AppError::with_message(ErrorKind::NoExistsData, "post 7 missing"))
    }

    async fn fail_with_bad_request() -> Result<HttpResponse, Error> {
        Err(actix_web::error::ErrorBadRequest("page must be a number"))
    }

    async fn fail_with_server_error() -> Result<HttpResponse, Error> {
        Err(actix_web::error::ErrorInternalServerError("disk on fire"))
    }

    #[rstest]
    #[case("/app", StatusCode::NOT_FOUND, "post 7 missing")]
    #[case("/bad", StatusCode::BAD_REQUEST, "page must be a number")]
    #[case("/boom", StatusCode::INTERNAL_SERVER_ERROR, "disk on fire")]
    #[actix_web::test]
    async fn failures_render_envelopes(
        #[case] path: &str,
        #[case] status: StatusCode,
        #[case] message: &str,
    ) {
        let app = test::init_service(
            App::new()
                .wrap(ExceptionFilter)
                .route("/app", web::get().to(fail_with_app_error))
                .route("/bad", web::get().to(fail_with_bad_request))
                .route("/boom", web::get().to(fail_with_server_error)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri(path).to_request()).await;
        assert_eq!(res.status(), status);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["status"], "ERROR");
        assert_eq!(body["statusCode"], status.as_u16());
        assert_eq!(body["message"], message);
    }

    #[rstest]
    #[actix_web::test]
    async fn client_errors_carry_their_response_body() {
        let app = test::init_service(
            App::new()
                .wrap(ExceptionFilter)
                .route("/bad", web::get().to(fail_with_bad_request)),
        )
        .await;

        let res =
            test::call_service(&app, test::TestRequest::get().uri("/bad").to_request()).await;
        let body: Value = test::read_body_json(res).await;
        assert_eq!(
            body["data"],
            json!({
                "statusCode": 400,
                "message": "page must be a number",
                "error": "Bad Request"
            })
        );
    }

    #[rstest]
    #[actix_web::test]
    async fn successful_responses_pass_through() {
        let app = test::init_service(
            App::new()
                .wrap(ExceptionFilter)
                .route("/ok", web::get().to(|| async { HttpResponse::Ok().body("fine") })),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/ok").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(test::read_body(res).await, "fine");
    }

    async fn conflict() -> HttpResponse {
        HttpResponse::Conflict().json(json!({"reason": "taken"}))
    }

    async fn raw_conflict(req: HttpRequest) -> HttpResponse {
        mark_raw_response(&req);
        HttpResponse::Conflict().body("taken")
    }

    #[rstest]
    #[actix_web::test]
    async fn bare_error_responses_are_enveloped() {
        let app = test::init_service(
            App::new()
                .wrap(ExceptionFilter)
                .route("/conflict", web::post().to(conflict)),
        )
        .await;

        let res =
            test::call_service(&app, test::TestRequest::post().uri("/conflict").to_request())
                .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(
            body,
            json!({
                "status": "ERROR",
                "statusCode": 409,
                "message": "Conflict",
                "data": {"reason": "taken"}
            })
        );
    }

    #[rstest]
    #[actix_web::test]
    async fn raw_marker_keeps_bare_error_bodies() {
        let app = test::init_service(
            App::new()
                .wrap(ExceptionFilter)
                .route("/conflict", web::post().to(raw_conflict)),
        )
        .await;

        let res =
            test::call_service(&app, test::TestRequest::post().uri("/conflict").to_request())
                .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(test::read_body(res).await, "taken");
    }

    #[rstest]
    #[actix_web::test]
    async fn service_errors_are_classified_for_rendering() {
        let app = test::init_service(
            App::new()
                .route("/ok", web::get().to(|| async { HttpResponse::Ok().finish() }))
                .wrap_fn(|_, _| async {
                    Err::<ServiceResponse, Error>(actix_web::error::ErrorTooManyRequests(
                        "slow down",
                    ))
                })
                .wrap(ExceptionFilter),
        )
        .await;

        let err = test::try_call_service(&app, test::TestRequest::get().uri("/ok").to_request())
            .await
            .expect_err("inner middleware fails");
        let failure = err.as_error::<Failure>().expect("classified failure");
        assert_eq!(failure.diagnostic(), "http 429: slow down");

        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let bytes = to_bytes(response.into_body()).await.expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["statusCode"], 429);
        assert_eq!(body["message"], "slow down");
    }
}
