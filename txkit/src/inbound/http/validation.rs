//! Validating extractors for request bodies and query strings.
//!
//! Failures surface as `INSUFFICIENT_PARAMS` application errors naming the
//! request part that failed, with every reason listed under `data.reasons`.

use std::fmt::Write as _;
use std::ops::Deref;

use actix_web::dev::Payload;
use actix_web::web::{Bytes, Query};
use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use pagination::PageRequest;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{AppError, ErrorKind, Failure};

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{field}' {message}")]
pub struct FieldViolation {
    field: String,
    message: String,
}

impl FieldViolation {
    /// Violation of `field`; an empty field name means the whole input.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Offending field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// What is wrong with it.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Semantic checks run after deserialisation.
pub trait Validate {
    /// Every violation found, or `Ok` when the value is acceptable.
    fn validate(&self) -> Result<(), Vec<FieldViolation>>;
}

impl Validate for PageRequest {
    fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let mut violations = Vec::new();
        if self.limit == 0 {
            violations.push(FieldViolation::new("limit", "must be at least 1"));
        }
        if self.sort_by.as_deref().is_some_and(str::is_empty) {
            violations.push(FieldViolation::new("sortBy", "must not be empty"));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Request part an extractor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// JSON request body.
    Body,
    /// URL query string.
    Query,
}

impl ParamSource {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Query => "query",
        }
    }
}

/// Application error for rejected input.
///
/// # Examples
/// ```
/// use txkit::inbound::http::validation::{FieldViolation, ParamSource, validation_failure};
///
/// let violation = FieldViolation::new("page", "must be a number");
/// let err = validation_failure(ParamSource::Query, &[violation]);
/// assert_eq!(err.error_code(), 400);
/// assert_eq!(err.message(), "validation failed for 'query' on field \"page\"");
/// ```
pub fn validation_failure(source: ParamSource, violations: &[FieldViolation]) -> AppError {
    let mut message = format!("validation failed for '{}'", source.as_str());
    if let [single] = violations {
        if !single.field.is_empty() {
            let _ = write!(message, " on field \"{}\"", single.field);
        }
    }
    let reasons: Vec<String> = violations.iter().map(ToString::to_string).collect();
    debug!(source = source.as_str(), ?reasons, "request rejected");
    AppError::with_message(ErrorKind::InsufficientParams, message)
        .with_data(json!({ "reasons": reasons }))
}

fn reject(source: ParamSource, violations: &[FieldViolation]) -> Failure {
    Failure::App(validation_failure(source, violations))
}

/// Turn top-level `"false"` strings into `false`.
///
/// Form-style clients send booleans as strings; only the literal `"false"`
/// needs help since any other non-empty string already reads as truthy.
pub fn coerce_false_strings(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| match item {
                    Value::String(text) if text == "false" => (key, Value::Bool(false)),
                    other => (key, other),
                })
                .collect(),
        ),
        other => other,
    }
}

fn check<T: Validate>(source: ParamSource, value: T) -> Result<T, Failure> {
    value
        .validate()
        .map_err(|violations| reject(source, &violations))?;
    Ok(value)
}

/// JSON body, deserialised and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedJson<T>(pub T);

impl<T> ValidatedJson<T> {
    /// Unwrap the validated value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned + Validate + 'static> FromRequest for ValidatedJson<T> {
    type Error = Failure;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let body = Bytes::from_request(req, payload);
        Box::pin(async move {
            let source = ParamSource::Body;
            let whole = |err: &dyn std::fmt::Display| {
                reject(source, &[FieldViolation::new("", err.to_string())])
            };
            let bytes = body.await.map_err(|err| whole(&err))?;
            let raw: Value = serde_json::from_slice(&bytes).map_err(|err| whole(&err))?;
            let parsed: T =
                serde_json::from_value(coerce_false_strings(raw)).map_err(|err| whole(&err))?;
            check(source, parsed).map(Self)
        })
    }
}

/// Query string, deserialised and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery<T>(pub T);

impl<T> ValidatedQuery<T> {
    /// Unwrap the validated value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for ValidatedQuery<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned + Validate + 'static> FromRequest for ValidatedQuery<T> {
    type Error = Failure;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let source = ParamSource::Query;
        let parsed = Query::<T>::from_query(req.query_string())
            .map_err(|err| reject(source, &[FieldViolation::new("", err.to_string())]))
            .and_then(|Query(value)| check(source, value));
        ready(parsed.map(Self))
    }
}
