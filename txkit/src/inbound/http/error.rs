//! Envelope rendering for domain failures.
//!
//! Keeps the domain HTTP-agnostic: this is the only place where resolved
//! error codes become actix status codes.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};

use crate::domain::{AppError, Envelope, Failure, envelope_for_error, envelope_for_exception};

/// Convenient result alias for handlers.
pub type ApiResult<T> = Result<T, Failure>;

/// Status for an envelope's `statusCode`; codes actix cannot represent fall
/// back to 500.
pub fn status_for(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// JSON response carrying `envelope`, with a matching HTTP status.
pub fn envelope_response(envelope: &Envelope) -> HttpResponse {
    HttpResponse::build(status_for(envelope.status_code())).json(envelope)
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        status_for(self.error_code())
    }

    fn error_response(&self) -> HttpResponse {
        envelope_response(&envelope_for_error(self))
    }
}

impl ResponseError for Failure {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::App(error) => status_for(error.error_code()),
            Self::Http(exception) => status_for(exception.status()),
            Self::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        envelope_response(&envelope_for_exception(self))
    }
}
