//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! only holds the whiteboard store; the service itself is stateless.

use std::sync::Arc;

use crate::services::store::WhiteboardStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; the store is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WhiteboardStore>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn WhiteboardStore>) -> Self {
        Self { store }
    }
}
