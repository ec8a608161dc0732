//! Headless in-memory document store.
//!
//! DESIGN
//! ======
//! State sits behind one `std::sync::Mutex`; the lock is never held while a
//! batch closure runs, so the closure may call back into the canvas. Change
//! notifications fan out over unbounded channels; a listener whose receiver
//! was dropped is pruned on the next emit.

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::{Bounds, Canvas, CanvasError, ParentId, Shape, ShapeId, StoreChange};
use crate::content::Snapshot;

const DEFAULT_VIEWPORT: Bounds = Bounds { x: 0.0, y: 0.0, width: 1280.0, height: 720.0 };

type ShapeMap = BTreeMap<ShapeId, Shape>;

/// Document layout: `{ shapes, bindings, assets, ... }`. Anything other than
/// `shapes` is carried opaquely. `shapes` distinguishes absent (`None`) from
/// an explicit `null` (`Some(None)`) so either survives a reload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    shapes: Option<Option<ShapeMap>>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<ShapeMap>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<ShapeMap>::deserialize(deserializer).map(Some)
}

impl Document {
    fn empty() -> Self {
        let mut rest = Map::new();
        rest.insert("bindings".to_owned(), Value::Object(Map::new()));
        rest.insert("assets".to_owned(), Value::Object(Map::new()));
        Self { shapes: Some(Some(BTreeMap::new())), rest }
    }

    fn shapes(&self) -> Option<&ShapeMap> {
        self.shapes.as_ref().and_then(Option::as_ref)
    }

    fn shapes_mut(&mut self) -> &mut ShapeMap {
        self.shapes.get_or_insert(None).get_or_insert_with(BTreeMap::new)
    }
}

struct Inner {
    document: Document,
    selection: Vec<ShapeId>,
    viewport: Bounds,
    page_id: ParentId,
    listeners: Vec<mpsc::UnboundedSender<StoreChange>>,
    batch_depth: usize,
    pending: Option<StoreChange>,
}

impl Inner {
    fn emit(&mut self, change: StoreChange) {
        if self.batch_depth > 0 {
            // A batch reports one notification; a document mutation outranks
            // a selection-only change.
            self.pending = match self.pending {
                Some(StoreChange::Selection) | None => Some(change),
                Some(existing) => Some(existing),
            };
            return;
        }
        self.listeners.retain(|tx| tx.send(change).is_ok());
    }
}

/// In-memory [`Canvas`].
pub struct MemoryCanvas {
    inner: Mutex<Inner>,
}

impl MemoryCanvas {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                document: Document::empty(),
                selection: Vec::new(),
                viewport: DEFAULT_VIEWPORT,
                page_id: ParentId::default(),
                listeners: Vec::new(),
                batch_depth: 0,
                pending: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the selection. Unknown ids are ignored.
    pub fn select(&self, ids: &[ShapeId]) {
        let mut inner = self.lock();
        let known = inner.document.shapes();
        let selection = ids
            .iter()
            .filter(|id| known.is_some_and(|shapes| shapes.contains_key(*id)))
            .cloned()
            .collect();
        inner.selection = selection;
        inner.emit(StoreChange::Selection);
    }

    pub fn set_viewport(&self, viewport: Bounds) {
        self.lock().viewport = viewport;
    }

    #[must_use]
    pub fn shapes(&self) -> Vec<Shape> {
        self.lock()
            .document
            .shapes()
            .map(|shapes| shapes.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas for MemoryCanvas {
    fn snapshot(&self) -> Result<Snapshot, CanvasError> {
        let inner = self.lock();
        let value = serde_json::to_value(&inner.document).map_err(CanvasError::InvalidSnapshot)?;
        Ok(Snapshot::new(value))
    }

    fn load_snapshot(&self, snapshot: &Snapshot) -> Result<(), CanvasError> {
        let document: Document =
            serde_json::from_value(snapshot.as_value().clone()).map_err(CanvasError::InvalidSnapshot)?;
        let mut inner = self.lock();
        let shapes = document.shapes();
        let selection = inner
            .selection
            .iter()
            .filter(|id| shapes.is_some_and(|shapes| shapes.contains_key(*id)))
            .cloned()
            .collect();
        inner.selection = selection;
        inner.document = document;
        inner.emit(StoreChange::Loaded);
        Ok(())
    }

    fn listen(&self) -> mpsc::UnboundedReceiver<StoreChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().listeners.push(tx);
        rx
    }

    fn selected_shapes(&self) -> Vec<Shape> {
        let inner = self.lock();
        let Some(shapes) = inner.document.shapes() else {
            return Vec::new();
        };
        inner.selection.iter().filter_map(|id| shapes.get(id).cloned()).collect()
    }

    fn shape(&self, id: &ShapeId) -> Option<Shape> {
        self.lock().document.shapes()?.get(id).cloned()
    }

    fn create_shape(&self, shape: Shape) -> Result<(), CanvasError> {
        let mut inner = self.lock();
        let shapes = inner.document.shapes_mut();
        if shapes.contains_key(&shape.id) {
            return Err(CanvasError::DuplicateShape(shape.id));
        }
        shapes.insert(shape.id.clone(), shape);
        inner.emit(StoreChange::Shapes);
        Ok(())
    }

    fn update_shapes(&self, updates: Vec<Shape>) -> Result<(), CanvasError> {
        let mut inner = self.lock();
        let mut changed = false;
        let mut result = Ok(());
        for shape in updates {
            let slot = inner
                .document
                .shapes
                .as_mut()
                .and_then(Option::as_mut)
                .and_then(|shapes| shapes.get_mut(&shape.id));
            let Some(slot) = slot else {
                result = Err(CanvasError::ShapeNotFound(shape.id));
                break;
            };
            *slot = shape;
            changed = true;
        }
        if changed {
            inner.emit(StoreChange::Shapes);
        }
        result
    }

    fn batch(&self, f: &mut dyn FnMut() -> Result<(), CanvasError>) -> Result<(), CanvasError> {
        self.lock().batch_depth += 1;
        let result = f();
        let mut inner = self.lock();
        inner.batch_depth -= 1;
        if inner.batch_depth == 0 {
            if let Some(change) = inner.pending.take() {
                inner.emit(change);
            }
        }
        result
    }

    fn viewport_page_bounds(&self) -> Bounds {
        self.lock().viewport
    }

    fn current_page_id(&self) -> ParentId {
        self.lock().page_id.clone()
    }
}
