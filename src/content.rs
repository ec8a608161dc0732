//! Snapshot values and their string serialization.
//!
//! DESIGN
//! ======
//! A `Snapshot` is compared only by exact serialized-string equality, so the
//! serialization must be canonical: object keys come out sorted (serde_json's
//! default map) and integral floats are normalized to integers on
//! construction. Without the latter, `{"x":100}` loaded from storage and the
//! canvas's own `{"x":100.0}` would compare unequal and trigger a save of
//! content that was just loaded.

#[cfg(test)]
#[path = "content_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to parse whiteboard content: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to serialize whiteboard content: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Immutable point-in-time state of a canvas document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct Snapshot(Value);

impl Snapshot {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(canonicalize(value))
    }

    /// Parse a serialized snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Parse`] if `raw` is not valid JSON.
    pub fn from_json(raw: &str) -> Result<Self, ContentError> {
        serde_json::from_str::<Value>(raw)
            .map(Self::new)
            .map_err(ContentError::Parse)
    }

    /// Serialize to the canonical string form used for idempotence checks.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Serialize`] if the value cannot be stringified.
    pub fn serialize(&self) -> Result<String, ContentError> {
        serde_json::to_string(&self.0).map_err(ContentError::Serialize)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<Snapshot> for Value {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.0
    }
}

/// Interpret record content as a snapshot.
///
/// Strings are parsed as JSON; structured values are taken as-is. Null and
/// blank strings mean "no document" and yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`ContentError::Parse`] if a string payload is not valid JSON.
pub fn parse_content(content: &Value) -> Result<Option<Snapshot>, ContentError> {
    match content {
        Value::Null => Ok(None),
        Value::String(raw) if raw.trim().is_empty() => Ok(None),
        Value::String(raw) => {
            let snapshot = Snapshot::from_json(raw)?;
            if snapshot.as_value().is_null() { Ok(None) } else { Ok(Some(snapshot)) }
        }
        other => Ok(Some(Snapshot::new(other.clone()))),
    }
}

// i64 covers every integral f64 below 2^63; beyond that leave the float.
const MAX_EXACT_INT: f64 = 9_223_372_036_854_775_807.0;

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(canonical_number(n)),
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect()),
        other => other,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn canonical_number(n: Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n;
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => Number::from(f as i64),
        _ => n,
    }
}
