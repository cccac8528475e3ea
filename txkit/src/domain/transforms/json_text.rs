//! JSON document stored as text, with timestamp revival on read.
//!
//! Strings shaped exactly like `2024-05-01T12:30:00.000Z` are revived as
//! [`JsonValue::Timestamp`] when they denote a real instant; everything else
//! keeps its JSON type.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use tracing::error;

use super::ValueTransformer;

#[expect(clippy::expect_used, reason = "pattern is a compile-time constant")]
static TIMESTAMP_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$")
        .expect("timestamp pattern should compile")
});

/// Stored JSON as handed over by the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawJson {
    /// Serialised text still to be parsed.
    Text(String),
    /// A document the driver already decoded.
    Value(Value),
}

/// JSON document with revived timestamps.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    /// `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(Number),
    /// String that is not a timestamp.
    String(String),
    /// Revived millisecond UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// Array.
    Array(Vec<JsonValue>),
    /// Object.
    Object(BTreeMap<String, JsonValue>),
}

impl JsonValue {
    /// Convert a decoded document, reviving timestamp strings.
    ///
    /// # Examples
    /// ```
    /// use serde_json::json;
    /// use txkit::domain::transforms::JsonValue;
    ///
    /// let doc = JsonValue::revive(json!({"at": "2024-05-01T12:30:00.000Z"}));
    /// assert!(doc.get("at").and_then(JsonValue::as_timestamp).is_some());
    /// ```
    pub fn revive(value: Value) -> Self {
        match value {
            Value::String(text) => revive_string(text),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::revive).collect()),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Self::revive(item)))
                    .collect(),
            ),
            scalar => Self::from(scalar),
        }
    }

    /// Field of an object document.
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Revived instant, if this is one.
    pub const fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(at) => Some(at),
            _ => None,
        }
    }

    /// Plain JSON rendering; timestamps become millisecond `Z` strings.
    pub fn to_json(&self) -> Value {
        self.clone().into_json()
    }

    /// Consuming variant of [`to_json`](Self::to_json).
    pub fn into_json(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(flag) => Value::Bool(flag),
            Self::Number(number) => Value::Number(number),
            Self::String(text) => Value::String(text),
            Self::Timestamp(at) => Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Array(items) => Value::Array(items.into_iter().map(Self::into_json).collect()),
            Self::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, item.into_json()))
                    .collect(),
            ),
        }
    }
}

/// Structural conversion without timestamp revival.
impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::Number(number),
            Value::String(text) => Self::String(text),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Self::from(item)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn revive_string(text: String) -> JsonValue {
    if !TIMESTAMP_SHAPE.is_match(&text) {
        return JsonValue::String(text);
    }
    match DateTime::parse_from_rfc3339(&text) {
        Ok(at) => JsonValue::Timestamp(at.with_timezone(&Utc)),
        Err(_) => JsonValue::String(text),
    }
}

fn parse_revived(text: &str) -> Result<JsonValue, serde_json::Error> {
    serde_json::from_str::<Value>(text).map(JsonValue::revive)
}

/// JSON document persisted as text.
///
/// Writes serialise the document; an absent document writes the default, or
/// `{}` without one. Reads parse with timestamp revival and fall back to the
/// default when the stored text is absent or malformed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonText {
    default: Option<Value>,
}

impl JsonText {
    /// Transformer without a default.
    pub const fn new() -> Self {
        Self { default: None }
    }

    /// Transformer with a default document.
    ///
    /// A string default is itself treated as JSON text when read back.
    pub const fn with_default(default: Value) -> Self {
        Self {
            default: Some(default),
        }
    }

    /// Transformer whose default is given as JSON text.
    pub fn with_default_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text).map(Self::with_default)
    }

    /// Configured default document.
    pub const fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn fallback(&self) -> Option<JsonValue> {
        match self.default.as_ref()? {
            Value::String(text) => match parse_revived(text) {
                Ok(doc) => Some(doc),
                Err(err) => {
                    error!(error = %err, "json column default is not valid JSON text");
                    Some(JsonValue::String(text.clone()))
                }
            },
            other => Some(JsonValue::revive(other.clone())),
        }
    }

    /// Read a stored document in either raw form.
    ///
    /// # Examples
    /// ```
    /// use serde_json::json;
    /// use txkit::domain::transforms::{JsonText, JsonValue, RawJson};
    ///
    /// let column = JsonText::with_default(json!({"tags": []}));
    /// let doc = column.from_raw(Some(RawJson::Text("not json".into())));
    /// assert_eq!(doc.map(JsonValue::into_json), Some(json!({"tags": []})));
    /// ```
    pub fn from_raw(&self, raw: Option<RawJson>) -> Option<JsonValue> {
        match raw {
            None => self.fallback(),
            Some(RawJson::Value(value)) => Some(JsonValue::from(value)),
            Some(RawJson::Text(text)) => match parse_revived(&text) {
                Ok(doc) => Some(doc),
                Err(err) => {
                    error!(error = %err, "json column parse error");
                    self.fallback()
                }
            },
        }
    }
}

impl ValueTransformer for JsonText {
    type Model = JsonValue;
    type Stored = String;

    fn to_stored(&self, value: Option<JsonValue>) -> Option<String> {
        let text = match value {
            Some(doc) => doc.to_json().to_string(),
            None => self
                .default
                .as_ref()
                .map_or_else(|| "{}".to_owned(), Value::to_string),
        };
        Some(text)
    }

    fn from_stored(&self, value: Option<String>) -> Option<JsonValue> {
        self.from_raw(value.map(RawJson::Text))
    }
}
