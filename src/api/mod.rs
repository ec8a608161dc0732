//! Typed client surface for the whiteboard procedures.
//!
//! The editor and autosave pipeline depend on [`WhiteboardApi`] only, so the
//! same session code runs against a remote server ([`HttpWhiteboardClient`])
//! or directly against a store in-process ([`LocalWhiteboardApi`]).

pub mod http;
pub mod local;

pub use http::HttpWhiteboardClient;
pub use local::LocalWhiteboardApi;

use crate::model::{ContentInput, WhiteboardRecord};
use crate::services::whiteboard::WhiteboardError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid base URL `{0}`")]
    InvalidBaseUrl(String),
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Service(#[from] WhiteboardError),
}

#[async_trait::async_trait]
pub trait WhiteboardApi: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the call fails; an absent record is `Ok(None)`.
    async fn get_by_id(&self, id: &str) -> Result<Option<WhiteboardRecord>, ApiError>;

    /// # Errors
    ///
    /// Returns an error if the call fails or the id already exists.
    async fn create(&self, id: &str, content: ContentInput) -> Result<WhiteboardRecord, ApiError>;

    /// # Errors
    ///
    /// Returns an error if the call fails.
    async fn update(&self, id: &str, content: ContentInput) -> Result<WhiteboardRecord, ApiError>;
}
