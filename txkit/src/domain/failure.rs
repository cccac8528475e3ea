//! Boundary failure taxonomy.
//!
//! Whatever escapes a handler is classified into one of three shapes before
//! it is rendered: an [`AppError`], a framework-level [`HttpException`], or an
//! unexpected error. The source chain of unexpected errors is kept for
//! server-side logs and never rendered to clients.

use std::error::Error as StdError;
use std::fmt::Write as _;

use serde_json::{Value, json};

use super::error::AppError;
use super::ports::TransactionError;

/// Framework-level HTTP exception carrying its own status and body.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use txkit::domain::HttpException;
///
/// let exception = HttpException::new(404, "Not Found");
/// assert_eq!(exception.response(), &json!({"statusCode": 404, "message": "Not Found"}));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HttpException {
    status: u16,
    message: String,
    response: Value,
}

impl HttpException {
    /// Exception with the default `{statusCode, message}` body.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let response = json!({ "statusCode": status, "message": message });
        Self {
            status,
            message,
            response,
        }
    }

    /// Replace the response body.
    pub fn with_response(mut self, response: Value) -> Self {
        self.response = response;
        self
    }

    /// HTTP status.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Exception text.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Attached response body.
    pub fn response(&self) -> &Value {
        &self.response
    }
}

/// Any failure reaching the request boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Failure {
    /// Expected business-rule violation.
    #[error(transparent)]
    App(#[from] AppError),
    /// Framework-level HTTP exception.
    #[error(transparent)]
    Http(#[from] HttpException),
    /// Anything else.
    #[error("{message}")]
    Unexpected {
        /// Display text of the error.
        message: String,
        /// Display text of each `source()` in the chain, outermost first.
        source_chain: Vec<String>,
    },
}

impl Failure {
    /// Unexpected failure with a bare message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
            source_chain: Vec::new(),
        }
    }

    /// Capture an arbitrary error together with its source chain.
    pub fn unexpected(error: &(dyn StdError + 'static)) -> Self {
        let mut source_chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            source_chain.push(cause.to_string());
            source = cause.source();
        }
        Self::Unexpected {
            message: error.to_string(),
            source_chain,
        }
    }

    /// Single-line diagnostic for server-side logs.
    ///
    /// Includes the error kind, code and full source chain. Never rendered
    /// into an envelope.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::App(error) => format!(
                "{} ({}): {}",
                error.kind(),
                error.error_code(),
                error.message()
            ),
            Self::Http(exception) => {
                format!("http {}: {}", exception.status(), exception.message())
            }
            Self::Unexpected {
                message,
                source_chain,
            } => {
                let mut text = message.clone();
                for cause in source_chain {
                    let _ = write!(text, "\n  caused by: {cause}");
                }
                text
            }
        }
    }
}

impl From<TransactionError> for Failure {
    fn from(value: TransactionError) -> Self {
        Self::unexpected(&value)
    }
}
