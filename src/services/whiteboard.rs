//! Whiteboard service — `getById`, `create`, and `update` procedures.
//!
//! DESIGN
//! ======
//! Content crosses the storage boundary as JSON text and leaves the service
//! as a parsed value. Callers may hand in either a JSON object or a string
//! that already holds JSON; strings are validated and stored verbatim so a
//! client's own serialization survives the round trip byte for byte.
//!
//! ERROR HANDLING
//! ==============
//! A stored row whose content no longer parses is reported as corrupt rather
//! than returned half-decoded.

#[cfg(test)]
#[path = "whiteboard_test.rs"]
mod tests;

use serde_json::Value;
use tracing::info;

use super::store::{StoreError, StoredWhiteboard, WhiteboardStore};
use crate::model::{ContentInput, ErrorCode, WhiteboardRecord};

#[derive(Debug, thiserror::Error)]
pub enum WhiteboardError {
    #[error("whiteboard id must not be empty")]
    InvalidId,
    #[error("content is not valid JSON: {0}")]
    InvalidContent(#[source] serde_json::Error),
    #[error("failed to serialize content: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("stored content for {id} is corrupt: {source}")]
    CorruptContent {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("whiteboard already exists: {0}")]
    AlreadyExists(String),
    #[error("storage error: {0}")]
    Store(#[source] StoreError),
}

impl ErrorCode for WhiteboardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidId => "E_INVALID_ID",
            Self::InvalidContent(_) => "E_INVALID_CONTENT",
            Self::Serialize(_) => "E_SERIALIZE",
            Self::CorruptContent { .. } => "E_CORRUPT_CONTENT",
            Self::AlreadyExists(_) => "E_ALREADY_EXISTS",
            Self::Store(_) => "E_DATABASE",
        }
    }
}

impl From<StoreError> for WhiteboardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(id) => Self::AlreadyExists(id),
            other => Self::Store(other),
        }
    }
}

/// Fetch a whiteboard by id. Absent ids yield `Ok(None)`.
///
/// # Errors
///
/// Returns an error if the lookup fails or the stored content is corrupt.
pub async fn get_by_id(store: &dyn WhiteboardStore, id: &str) -> Result<Option<WhiteboardRecord>, WhiteboardError> {
    let id = validate_id(id)?;
    store.find(id).await?.map(to_record).transpose()
}

/// Create a new whiteboard.
///
/// # Errors
///
/// Returns [`WhiteboardError::AlreadyExists`] if the id is taken, or a
/// validation/storage error.
pub async fn create(
    store: &dyn WhiteboardStore,
    id: &str,
    content: ContentInput,
) -> Result<WhiteboardRecord, WhiteboardError> {
    let id = validate_id(id)?;
    let content = normalize_content(content)?;
    let row = store.insert(id, &content).await?;
    info!(id = %row.id, bytes = row.content.len(), "whiteboard created");
    to_record(row)
}

/// Create or replace a whiteboard's content.
///
/// # Errors
///
/// Returns a validation or storage error.
pub async fn update(
    store: &dyn WhiteboardStore,
    id: &str,
    content: ContentInput,
) -> Result<WhiteboardRecord, WhiteboardError> {
    let id = validate_id(id)?;
    let content = normalize_content(content)?;
    let row = store.upsert(id, &content).await?;
    info!(id = %row.id, bytes = row.content.len(), "whiteboard saved");
    to_record(row)
}

/// Reduce caller-supplied content to the JSON text that gets stored.
///
/// # Errors
///
/// Returns [`WhiteboardError::InvalidContent`] for strings that are not JSON.
pub fn normalize_content(content: ContentInput) -> Result<String, WhiteboardError> {
    match content {
        ContentInput::Text(raw) => {
            serde_json::from_str::<Value>(&raw).map_err(WhiteboardError::InvalidContent)?;
            Ok(raw)
        }
        ContentInput::Document(map) => serde_json::to_string(&map).map_err(WhiteboardError::Serialize),
    }
}

fn validate_id(id: &str) -> Result<&str, WhiteboardError> {
    if id.trim().is_empty() { Err(WhiteboardError::InvalidId) } else { Ok(id) }
}

fn to_record(row: StoredWhiteboard) -> Result<WhiteboardRecord, WhiteboardError> {
    let content = serde_json::from_str::<Value>(&row.content)
        .map_err(|source| WhiteboardError::CorruptContent { id: row.id.clone(), source })?;
    Ok(WhiteboardRecord { id: row.id, content, created_at: row.created_at, updated_at: row.updated_at })
}
