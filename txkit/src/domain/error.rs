//! Application error model.
//!
//! An [`AppError`] is raised where a business rule is violated. Its numeric
//! code is resolved at construction time from a fixed kind table, so the
//! boundary never has to guess a status when rendering the failure.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::envelope::DEFAULT_ERROR_MESSAGE;

/// Generic internal-error code used when neither the kind table nor the
/// caller supplies one.
pub const INTERNAL_ERROR_CODE: u16 = 500;

/// Symbolic error kind.
///
/// Known kinds map to a fixed code through [`ErrorKind::code`]. Unknown
/// symbols deserialise into [`ErrorKind::Other`] and carry no table entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorKind {
    /// The resource was already claimed.
    AlreadyUsedData,
    /// The requested record does not exist.
    NoExistsData,
    /// The referenced user does not exist.
    NoExistsUser,
    /// Required request parameters are missing or malformed.
    InsufficientParams,
    /// The caller lacks permission.
    InvalidPermission,
    /// Request parameters are invalid.
    InvalidParams,
    /// The request is invalid as a whole.
    InvalidRequest,
    /// The presented token is invalid.
    InvalidToken,
    /// Bulk removal without a filter is refused.
    NotAllowedRemoveAll,
    /// The caller's permission has expired.
    ExpiredPermission,
    /// Unclassified failure.
    UnknownException,
    /// Authentication is missing.
    Unauthorized,
    /// A symbol outside the fixed table.
    Other(String),
}

impl ErrorKind {
    /// Every kind with a table entry.
    pub const KNOWN: [ErrorKind; 12] = [
        Self::AlreadyUsedData,
        Self::NoExistsData,
        Self::NoExistsUser,
        Self::InsufficientParams,
        Self::InvalidPermission,
        Self::InvalidParams,
        Self::InvalidRequest,
        Self::InvalidToken,
        Self::NotAllowedRemoveAll,
        Self::ExpiredPermission,
        Self::UnknownException,
        Self::Unauthorized,
    ];

    /// Code from the fixed kind table, if the kind has an entry.
    ///
    /// # Examples
    /// ```
    /// use txkit::domain::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::NoExistsData.code(), Some(404));
    /// assert_eq!(ErrorKind::Other("TEAPOT".into()).code(), None);
    /// ```
    pub fn code(&self) -> Option<u16> {
        let code = match self {
            Self::AlreadyUsedData => 402,
            Self::NoExistsData | Self::NoExistsUser => 404,
            Self::InsufficientParams
            | Self::InvalidParams
            | Self::InvalidRequest
            | Self::NotAllowedRemoveAll => 400,
            Self::InvalidPermission | Self::ExpiredPermission => 403,
            Self::InvalidToken | Self::Unauthorized => 401,
            Self::UnknownException => 500,
            Self::Other(_) => return None,
        };
        Some(code)
    }

    /// Wire symbol for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AlreadyUsedData => "ALREADY_USED_DATA",
            Self::NoExistsData => "NO_EXISTS_DATA",
            Self::NoExistsUser => "NO_EXISTS_USER",
            Self::InsufficientParams => "INSUFFICIENT_PARAMS",
            Self::InvalidPermission => "INVALID_PERMISSION",
            Self::InvalidParams => "INVALID_PARAMS",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NotAllowedRemoveAll => "NOT_ALLOWED_REMOVE_ALL",
            Self::ExpiredPermission => "EXPIRED_PERMISSION",
            Self::UnknownException => "UNKNOWN_EXCEPTION",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Other(symbol) => symbol.as_str(),
        }
    }
}

impl From<String> for ErrorKind {
    fn from(value: String) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .unwrap_or(Self::Other(value))
    }
}

impl From<&str> for ErrorKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<ErrorKind> for String {
    fn from(value: ErrorKind) -> Self {
        match value {
            ErrorKind::Other(symbol) => symbol,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constructor input for [`AppError`].
///
/// Mirrors the wire shape `{error, errorCode?, message?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSpec {
    /// Symbolic kind.
    pub error: ErrorKind,
    /// Code used when the kind has no table entry.
    #[serde(default)]
    pub error_code: Option<u16>,
    /// Message overriding the standard reason phrase.
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorSpec {
    /// Spec carrying only a kind.
    pub fn kind(error: impl Into<ErrorKind>) -> Self {
        Self {
            error: error.into(),
            error_code: None,
            message: None,
        }
    }

    /// Attach a fallback code.
    pub fn with_code(mut self, code: u16) -> Self {
        self.error_code = Some(code);
        self
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Business-rule failure with a resolved numeric code.
///
/// ## Invariants
/// - `error_code` is the kind table value, else the caller's code, else
///   [`INTERNAL_ERROR_CODE`].
/// - `message` is never empty: it falls back to the canonical reason phrase
///   for `error_code`, then to [`DEFAULT_ERROR_MESSAGE`].
///
/// # Examples
/// ```
/// use txkit::domain::{AppError, ErrorKind};
///
/// let err = AppError::of(ErrorKind::NoExistsData);
/// assert_eq!(err.error_code(), 404);
/// assert_eq!(err.message(), "Not Found");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppError {
    error: ErrorKind,
    error_code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl AppError {
    /// Resolve a spec into an error.
    pub fn new(spec: ErrorSpec) -> Self {
        let ErrorSpec {
            error,
            error_code,
            message,
        } = spec;
        let resolved_code = error
            .code()
            .or(error_code)
            .unwrap_or(INTERNAL_ERROR_CODE);
        let resolved_message = message
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| reason_phrase(resolved_code).to_owned());
        Self {
            error,
            error_code: resolved_code,
            message: resolved_message,
            data: None,
        }
    }

    /// Error carrying only a kind.
    pub fn of(kind: impl Into<ErrorKind>) -> Self {
        Self::new(ErrorSpec::kind(kind))
    }

    /// Error with an explicit message.
    pub fn with_message(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        Self::new(ErrorSpec::kind(kind).with_message(message))
    }

    /// Attach structured data rendered into the envelope's `data` field.
    ///
    /// # Examples
    /// ```
    /// use serde_json::json;
    /// use txkit::domain::{AppError, ErrorKind};
    ///
    /// let err = AppError::of(ErrorKind::InvalidParams).with_data(json!({"field": "name"}));
    /// assert!(err.data().is_some());
    /// ```
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Symbolic kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.error
    }

    /// Resolved numeric code.
    pub fn error_code(&self) -> u16 {
        self.error_code
    }

    /// Resolved message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Attached structured data.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

impl From<ErrorSpec> for AppError {
    fn from(value: ErrorSpec) -> Self {
        Self::new(value)
    }
}

impl From<ErrorKind> for AppError {
    fn from(value: ErrorKind) -> Self {
        Self::of(value)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

/// Canonical reason phrase for `code`.
pub(crate) fn reason_phrase(code: u16) -> &'static str {
    http::StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or(DEFAULT_ERROR_MESSAGE)
}
