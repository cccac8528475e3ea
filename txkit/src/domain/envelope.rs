//! Uniform response envelope.
//!
//! Every request boundary response, success or failure, is shaped as
//! `{status, statusCode, message, data?}` unless the handler explicitly opted
//! out. Envelopes are immutable once built.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{AppError, INTERNAL_ERROR_CODE};
use super::failure::Failure;

/// Message attached to every success envelope.
pub const SUCCESS_MESSAGE: &str = "The API call completed successfully.";

/// Message used by [`build_envelope`] when none is given.
pub const DEFAULT_MESSAGE: &str = "ERROR";

/// Message used for application errors without one.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// Message used for exceptions without one.
pub const EXCEPTION_FALLBACK_MESSAGE: &str = "An unexpected error occurred";

/// Outcome marker carried by the envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    /// The handler completed normally.
    Success,
    /// The request failed.
    #[default]
    Error,
}

/// Response envelope.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use txkit::domain::{envelope_for_success, ResponseStatus};
///
/// let envelope = envelope_for_success(json!({"id": 1}));
/// assert_eq!(envelope.status(), ResponseStatus::Success);
/// assert_eq!(envelope.status_code(), 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    status: ResponseStatus,
    status_code: u16,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl Envelope {
    /// Outcome marker.
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Payload, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Consume the envelope, returning its payload.
    pub fn into_data(self) -> Option<Value> {
        self.data
    }
}

/// Optional fields accepted by [`build_envelope`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvelopeParts {
    /// Outcome marker; defaults to [`ResponseStatus::Error`].
    pub status: Option<ResponseStatus>,
    /// Status code; defaults to [`INTERNAL_ERROR_CODE`].
    pub status_code: Option<u16>,
    /// Message; defaults to [`DEFAULT_MESSAGE`] when absent or empty.
    pub message: Option<String>,
    /// Payload.
    pub data: Option<Value>,
}

/// Build an envelope, filling omitted fields with their defaults.
///
/// # Examples
/// ```
/// use txkit::domain::{build_envelope, EnvelopeParts, ResponseStatus};
///
/// let envelope = build_envelope(EnvelopeParts::default());
/// assert_eq!(envelope.status(), ResponseStatus::Error);
/// assert_eq!(envelope.status_code(), 500);
/// assert_eq!(envelope.message(), "ERROR");
/// assert!(envelope.data().is_none());
/// ```
pub fn build_envelope(parts: EnvelopeParts) -> Envelope {
    let EnvelopeParts {
        status,
        status_code,
        message,
        data,
    } = parts;
    Envelope {
        status: status.unwrap_or_default(),
        status_code: status_code.unwrap_or(INTERNAL_ERROR_CODE),
        message: message
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_owned()),
        data,
    }
}

/// Success envelope around `data`.
pub fn envelope_for_success(data: impl Into<Option<Value>>) -> Envelope {
    build_envelope(EnvelopeParts {
        status: Some(ResponseStatus::Success),
        status_code: Some(200),
        message: Some(SUCCESS_MESSAGE.to_owned()),
        data: data.into(),
    })
}

/// Error envelope for an application error.
pub fn envelope_for_error(error: &AppError) -> Envelope {
    build_envelope(EnvelopeParts {
        status: Some(ResponseStatus::Error),
        status_code: Some(error.error_code()),
        message: Some(non_empty_or(error.message(), DEFAULT_ERROR_MESSAGE)),
        data: error.data().cloned(),
    })
}

/// Error envelope for any boundary failure.
///
/// Application errors render exactly as [`envelope_for_error`]; framework
/// HTTP exceptions keep their own status and response body; anything else is
/// an internal error with an empty object as payload.
pub fn envelope_for_exception(failure: &Failure) -> Envelope {
    match failure {
        Failure::App(error) => envelope_for_error(error),
        Failure::Http(exception) => build_envelope(EnvelopeParts {
            status: Some(ResponseStatus::Error),
            status_code: Some(exception.status()),
            message: Some(non_empty_or(
                exception.message(),
                EXCEPTION_FALLBACK_MESSAGE,
            )),
            data: Some(exception.response().clone()),
        }),
        Failure::Unexpected { message, .. } => build_envelope(EnvelopeParts {
            status: Some(ResponseStatus::Error),
            status_code: Some(INTERNAL_ERROR_CODE),
            message: Some(non_empty_or(message, EXCEPTION_FALLBACK_MESSAGE)),
            data: Some(Value::Object(Map::new())),
        }),
    }
}

fn non_empty_or(message: &str, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_owned()
    } else {
        message.to_owned()
    }
}
