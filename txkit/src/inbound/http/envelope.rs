//! Success envelope wrapping for handler payloads.

use std::task::{Context, Poll};

use actix_web::body::{EitherBody, MessageBody, to_bytes};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use actix_web::{Error, HttpMessage, HttpRequest, HttpResponse};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde_json::Value;
use tracing::{debug, error};

use crate::domain::{Failure, envelope_for_success};

/// Request marker leaving the response exactly as the handler built it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawResponse;

/// Opt the current request out of envelope wrapping.
///
/// # Examples
/// ```
/// use actix_web::{HttpRequest, HttpResponse};
/// use txkit::inbound::http::mark_raw_response;
///
/// async fn download(req: HttpRequest) -> HttpResponse {
///     mark_raw_response(&req);
///     HttpResponse::Ok().body("raw bytes")
/// }
/// ```
pub fn mark_raw_response(req: &HttpRequest) {
    req.extensions_mut().insert(RawResponse);
}

/// Wraps successful response bodies in the success envelope.
///
/// Status and headers other than the content headers are preserved. Error
/// responses, `204 No Content`, redirects and opted-out requests pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeResponses;

impl<S, B> Transform<S, ServiceRequest> for EnvelopeResponses
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = EnvelopeResponsesMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(EnvelopeResponsesMiddleware { service }))
    }
}

/// Service wrapper produced by [`EnvelopeResponses`].
pub struct EnvelopeResponsesMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for EnvelopeResponsesMiddleware<S>
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
        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            if !should_wrap(&res) {
                return Ok(res.map_into_left_body());
            }
            let (request, response) = res.into_parts();
            let (head, body) = response.into_parts();
            let bytes = match to_bytes(body).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    let err: Box<dyn std::error::Error> = err.into();
                    error!(error = %err, "failed to buffer response body");
                    return Err(Failure::internal("failed to read response body").into());
                }
            };
            let data = decode_payload(head.headers(), &bytes);
            debug!(status = head.status().as_u16(), payload = ?data, "wrapping response");
            let mut wrapped = HttpResponse::build(head.status()).json(envelope_for_success(data));
            carry_headers(head.headers(), wrapped.headers_mut());
            Ok(ServiceResponse::new(request, wrapped).map_into_right_body())
        })
    }
}

fn should_wrap<B>(res: &ServiceResponse<B>) -> bool {
    let status = res.status();
    status.is_success()
        && status != StatusCode::NO_CONTENT
        && res.response().error().is_none()
        && !res.request().extensions().contains::<RawResponse>()
}

/// Envelope payload for a buffered body.
///
/// Empty bodies carry no data. JSON bodies are embedded as values; anything
/// else, including malformed JSON, becomes a string.
pub(super) fn decode_payload(headers: &HeaderMap, bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    let declared_json = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|mime| mime.starts_with("application/json") || mime.contains("+json"));
    if declared_json {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return Some(value);
        }
    }
    Some(Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn carry_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if name == CONTENT_TYPE || name == CONTENT_LENGTH {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}
