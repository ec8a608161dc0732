//! Wire types shared by the HTTP service and its clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::content::Snapshot;

/// A persisted whiteboard as returned by every procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardRecord {
    pub id: String,
    /// Parsed document. Opaque to the service.
    pub content: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Content accepted by `create` / `update`: a JSON object, or a string that
/// already holds serialized JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentInput {
    Document(Map<String, Value>),
    Text(String),
}

impl From<Snapshot> for ContentInput {
    fn from(snapshot: Snapshot) -> Self {
        match snapshot.into_value() {
            Value::Object(map) => Self::Document(map),
            other => Self::Text(other.to_string()),
        }
    }
}

/// `POST /api/whiteboard` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWhiteboardBody {
    pub id: String,
    pub content: ContentInput,
}

/// `PUT /api/whiteboard/{id}` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateWhiteboardBody {
    pub content: ContentInput,
}

/// Grepable error code for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// Error payload returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl ErrorBody {
    #[must_use]
    pub fn from_error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { error: err.to_string(), code: err.error_code().to_owned() }
    }
}
