//! Editor session — ties a canvas to the backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! [`EditorSession::open`] fetches the initial record. [`EditorSession::mount`]
//! attaches a canvas: the record is loaded through the autosave pipeline (so
//! the marker is set before the canvas changes), a listener task forwards
//! every change notification to the pipeline, and the selection state is
//! recomputed on each notification.
//!
//! User actions (`add_sample_shape`, `change_shape_type`) mutate the canvas
//! directly; the resulting change notifications flow into autosave like any
//! other edit.

#[cfg(test)]
#[path = "editor_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::WhiteboardApi;
use crate::autosave::AutosaveHandle;
use crate::canvas::shape::{DEFAULT_COLOR, DEFAULT_DASH, DEFAULT_FILL, DEFAULT_SIZE};
use crate::canvas::{
    Canvas, CanvasError, GeoKind, GeoProps, Shape, ShapeId, ShapeStyle, ShapeType, StoreChange, are_shapes_convertible,
};
use crate::config::EditorConfig;
use crate::model::WhiteboardRecord;
use crate::notify::{Notifier, messages};

const SAMPLE_SHAPE_SIZE: f64 = 100.0;

/// Selection-derived UI state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub has_selected_shapes: bool,
    /// Non-empty and every selected shape is `geo` or `text`.
    pub can_change_shape: bool,
    pub selected_shape_ids: Vec<ShapeId>,
}

impl SelectionState {
    #[must_use]
    pub fn of(shapes: &[Shape]) -> Self {
        Self {
            has_selected_shapes: !shapes.is_empty(),
            can_change_shape: are_shapes_convertible(shapes),
            selected_shape_ids: shapes.iter().map(|shape| shape.id.clone()).collect(),
        }
    }
}

/// Introspection slot that holds whichever canvas is currently mounted.
#[derive(Default)]
pub struct DebugHandle {
    canvas: Mutex<Option<Arc<dyn Canvas>>>,
}

impl DebugHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn canvas(&self) -> Option<Arc<dyn Canvas>> {
        self.slot().clone()
    }

    fn attach(&self, canvas: Arc<dyn Canvas>) {
        *self.slot() = Some(canvas);
    }

    fn detach(&self) {
        *self.slot() = None;
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn Canvas>>> {
        self.canvas.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// An editor session before a canvas is attached.
pub struct EditorSession {
    config: EditorConfig,
    api: Arc<dyn WhiteboardApi>,
    notifier: Arc<dyn Notifier>,
    debug: Option<Arc<DebugHandle>>,
    initial: Option<WhiteboardRecord>,
}

impl EditorSession {
    /// Fetch the configured whiteboard. A failed fetch is reported as a
    /// notification and the session opens empty.
    pub async fn open(
        config: EditorConfig,
        api: Arc<dyn WhiteboardApi>,
        notifier: Arc<dyn Notifier>,
        debug: Option<Arc<DebugHandle>>,
    ) -> Self {
        let initial = match api.get_by_id(&config.whiteboard_id).await {
            Ok(record) => {
                debug!(whiteboard_id = %config.whiteboard_id, found = record.is_some(), "fetched whiteboard");
                record
            }
            Err(e) => {
                error!(whiteboard_id = %config.whiteboard_id, error = %e, "error loading whiteboard");
                notifier.notify(messages::error_loading(e.to_string()));
                None
            }
        };
        Self { config, api, notifier, debug, initial }
    }

    #[must_use]
    pub fn initial_record(&self) -> Option<&WhiteboardRecord> {
        self.initial.as_ref()
    }

    /// Attach `canvas` and start autosaving it.
    #[must_use]
    pub fn mount(self, canvas: Arc<dyn Canvas>) -> MountedEditor {
        let autosave = AutosaveHandle::spawn(
            &self.config,
            Arc::clone(&canvas),
            Arc::clone(&self.api),
            Arc::clone(&self.notifier),
        );
        if let Some(debug) = &self.debug {
            debug.attach(Arc::clone(&canvas));
        }

        let changes = canvas.listen();
        if let Some(record) = self.initial {
            autosave.load(record);
        }

        let (selection_tx, selection_rx) = watch::channel(SelectionState::of(&canvas.selected_shapes()));
        let listener = tokio::spawn(forward_changes(
            Arc::clone(&canvas),
            changes,
            autosave.clone(),
            Arc::clone(&self.notifier),
            selection_tx,
        ));

        info!(whiteboard_id = %self.config.whiteboard_id, "editor mounted");
        MountedEditor { canvas, autosave, notifier: self.notifier, selection: selection_rx, listener, debug: self.debug }
    }
}

async fn forward_changes(
    canvas: Arc<dyn Canvas>,
    mut changes: mpsc::UnboundedReceiver<StoreChange>,
    autosave: AutosaveHandle,
    notifier: Arc<dyn Notifier>,
    selection: watch::Sender<SelectionState>,
) {
    while let Some(change) = changes.recv().await {
        let next = SelectionState::of(&canvas.selected_shapes());
        selection.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });

        match canvas.snapshot() {
            Ok(snapshot) => autosave.on_document_changed(snapshot),
            Err(e) => {
                error!(?change, error = %e, "failed to snapshot canvas");
                notifier.notify(messages::error_saving(e.to_string()));
            }
        }
    }
    debug!("canvas listener closed");
}

// =============================================================================
// MOUNTED EDITOR
// =============================================================================

/// A canvas attached to a session. Dropping it unsubscribes from the canvas
/// and stops the pipeline; use [`MountedEditor::close`] to save first.
pub struct MountedEditor {
    canvas: Arc<dyn Canvas>,
    autosave: AutosaveHandle,
    notifier: Arc<dyn Notifier>,
    selection: watch::Receiver<SelectionState>,
    listener: JoinHandle<()>,
    debug: Option<Arc<DebugHandle>>,
}

impl MountedEditor {
    #[must_use]
    pub fn canvas(&self) -> &Arc<dyn Canvas> {
        &self.canvas
    }

    #[must_use]
    pub fn autosave(&self) -> &AutosaveHandle {
        &self.autosave
    }

    #[must_use]
    pub fn selection(&self) -> SelectionState {
        self.selection.borrow().clone()
    }

    #[must_use]
    pub fn watch_selection(&self) -> watch::Receiver<SelectionState> {
        self.selection.clone()
    }

    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.autosave.is_saving()
    }

    /// Load a newer canonical record into the canvas.
    pub fn load_record(&self, record: WhiteboardRecord) {
        self.autosave.load(record);
    }

    /// Create a 100x100 rectangle centred in the viewport.
    ///
    /// # Errors
    ///
    /// Returns the canvas error after notifying the user.
    pub fn add_sample_shape(&self) -> Result<ShapeId, CanvasError> {
        let (center_x, center_y) = self.canvas.viewport_page_bounds().center();
        let offset = SAMPLE_SHAPE_SIZE / 2.0;

        let mut extra = Map::new();
        extra.insert("w".to_owned(), Value::from(SAMPLE_SHAPE_SIZE));
        extra.insert("h".to_owned(), Value::from(SAMPLE_SHAPE_SIZE));
        extra.insert("dash".to_owned(), Value::from(DEFAULT_DASH));
        let style = ShapeStyle {
            size: Some(DEFAULT_SIZE.to_owned()),
            fill: Some(DEFAULT_FILL.to_owned()),
            color: Some(DEFAULT_COLOR.to_owned()),
        };
        let shape = Shape::geo(
            ShapeId::generate(),
            self.canvas.current_page_id(),
            center_x - offset,
            center_y - offset,
            GeoProps { geo: GeoKind::Rectangle, style, extra },
        );
        let id = shape.id.clone();

        match self.canvas.create_shape(shape) {
            Ok(()) => {
                info!(shape_id = %id, "shape added");
                self.notifier.notify(messages::shape_added());
                Ok(id)
            }
            Err(e) => {
                error!(shape_id = %id, error = %e, "error adding shape");
                self.notifier.notify(messages::error_adding_shape());
                Err(e)
            }
        }
    }

    /// Convert every selected `geo`/`text` shape to `target` in one batch.
    /// Other shape types in the selection are left alone. Returns how many
    /// shapes changed.
    ///
    /// # Errors
    ///
    /// Returns the first failure after notifying the user. Shapes converted
    /// before it keep their new kind.
    pub fn change_shape_type(&self, target: ShapeType) -> Result<usize, CanvasError> {
        let ids: Vec<ShapeId> = self.canvas.selected_shapes().into_iter().map(|shape| shape.id).collect();
        if ids.is_empty() {
            debug!(%target, "no shapes selected; nothing to convert");
            return Ok(0);
        }

        let mut converted = 0;
        let result = self.canvas.batch(&mut || {
            for id in &ids {
                let Some(shape) = self.canvas.shape(id) else {
                    continue;
                };
                if !shape.kind.is_convertible() {
                    continue;
                }
                self.canvas.update_shapes(vec![shape.convert(target)?])?;
                converted += 1;
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                info!(%target, converted, "shapes converted");
                self.notifier.notify(messages::shape_updated(target));
                Ok(converted)
            }
            Err(e) => {
                error!(%target, converted, error = %e, "error changing shape type");
                self.notifier.notify(messages::error_changing_shape(e.to_string()));
                Err(e)
            }
        }
    }

    /// Submit any pending change and wait for in-flight saves to finish.
    pub async fn close(self) {
        self.autosave.flush().await;
        self.autosave.wait_idle().await;
        info!("editor closed");
    }
}

impl Drop for MountedEditor {
    fn drop(&mut self) {
        self.listener.abort();
        if let Some(debug) = &self.debug {
            debug.detach();
        }
        if self.autosave.is_saving() {
            warn!("editor dropped while a save is in flight");
        }
    }
}
