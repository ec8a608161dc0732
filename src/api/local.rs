//! In-process client: calls the whiteboard service directly on a store.

use std::sync::Arc;

use super::{ApiError, WhiteboardApi};
use crate::model::{ContentInput, WhiteboardRecord};
use crate::services::store::WhiteboardStore;
use crate::services::whiteboard;

#[derive(Clone)]
pub struct LocalWhiteboardApi {
    store: Arc<dyn WhiteboardStore>,
}

impl LocalWhiteboardApi {
    #[must_use]
    pub fn new(store: Arc<dyn WhiteboardStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl WhiteboardApi for LocalWhiteboardApi {
    async fn get_by_id(&self, id: &str) -> Result<Option<WhiteboardRecord>, ApiError> {
        Ok(whiteboard::get_by_id(self.store.as_ref(), id).await?)
    }

    async fn create(&self, id: &str, content: ContentInput) -> Result<WhiteboardRecord, ApiError> {
        Ok(whiteboard::create(self.store.as_ref(), id, content).await?)
    }

    async fn update(&self, id: &str, content: ContentInput) -> Result<WhiteboardRecord, ApiError> {
        Ok(whiteboard::update(self.store.as_ref(), id, content).await?)
    }
}
