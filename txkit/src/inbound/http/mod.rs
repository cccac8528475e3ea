//! HTTP inbound adapter: middleware, extractors and error rendering.
//!
//! Recommended wrapping order, innermost first:
//!
//! ```ignore
//! App::new()
//!     .wrap(Transactional::new(unit))
//!     .wrap(EnvelopeResponses)
//!     .wrap(ExceptionFilter)
//! ```
//!
//! actix applies the last `wrap` outermost, so the filter sees every failure
//! and the transaction sees the handler's raw response.

pub mod envelope;
pub mod error;
pub mod exception_filter;
pub mod transaction;
pub mod validation;

use actix_web::{HttpRequest, HttpResponse};

pub use envelope::{EnvelopeResponses, RawResponse, mark_raw_response};
pub use error::{ApiResult, envelope_response, status_for};
pub use exception_filter::{ExceptionFilter, classify};
pub use transaction::Transactional;
pub use validation::{FieldViolation, Validate, ValidatedJson, ValidatedQuery};

use crate::domain::{Failure, HttpException};

/// Default service for unmatched routes.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use txkit::inbound::http::not_found;
///
/// let _app = App::new().default_service(web::to(not_found));
/// ```
pub async fn not_found(req: HttpRequest) -> ApiResult<HttpResponse> {
    let message = format!("Cannot {} {}", req.method(), req.path());
    Err(Failure::Http(HttpException::new(404, message)))
}
