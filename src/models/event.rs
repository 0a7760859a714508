//! The incoming event: a schema-flexible JSON object plus its raw bytes.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, ser::PrettyFormatter};
use thiserror::Error;

/// Errors produced while parsing an incoming payload.
#[derive(Debug, Error)]
pub enum EventParseError {
    /// The payload is not valid JSON.
    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is valid JSON but not an object.
    #[error("Payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// An immutable event as received by the router.
///
/// Cloning is cheap: fields and raw bytes are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    fields: Arc<Map<String, Value>>,
    raw: Arc<[u8]>,
}

impl Event {
    /// Parses a raw payload. Only JSON objects are accepted.
    pub fn parse(raw: &[u8]) -> Result<Self, EventParseError> {
        match serde_json::from_slice::<Value>(raw)? {
            Value::Object(fields) => Ok(Self { fields: Arc::new(fields), raw: Arc::from(raw) }),
            other => Err(EventParseError::NotAnObject(json_type_name(&other))),
        }
    }

    /// Builds an event from already parsed fields, re-serializing the raw form.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let raw = serde_json::to_vec(&fields).unwrap_or_default();
        Self { fields: Arc::new(fields), raw: Arc::from(raw) }
    }

    /// The event's top-level fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The payload exactly as received.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The event as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.as_ref().clone())
    }

    /// Looks up a dotted path such as `image.digest` or `resources.0.name`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Pretty-prints JSON with a one-space indent, the layout used for event
/// bodies in chat messages and the `json_format` helper.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
