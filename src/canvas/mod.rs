//! Canvas document-store boundary.
//!
//! SYSTEM CONTEXT
//! ==============
//! The editor and autosave pipeline only ever talk to a document store
//! through the [`Canvas`] trait: full snapshots out, snapshots in, change
//! notifications, and a handful of shape operations. Rendering, hit-testing,
//! and undo live behind whatever implements it. [`MemoryCanvas`] is a
//! headless implementation used by the CLI demo and the tests.

pub mod memory;
pub mod shape;

pub use memory::MemoryCanvas;
pub use shape::{
    ConversionError, GeoKind, GeoProps, ParentId, Shape, ShapeId, ShapeKind, ShapeStyle, ShapeType, TextProps,
    are_shapes_convertible,
};

use tokio::sync::mpsc;

use crate::content::{ContentError, Snapshot};

/// What kind of mutation produced a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// Shapes were created or updated.
    Shapes,
    /// The selection changed.
    Selection,
    /// The whole document was replaced from a snapshot.
    Loaded,
}

/// Viewport rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("shape not found: {0}")]
    ShapeNotFound(ShapeId),
    #[error("shape already exists: {0}")]
    DuplicateShape(ShapeId),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(#[source] serde_json::Error),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// A canvas document store.
///
/// Every mutation emits a [`StoreChange`] to each live listener. Mutations
/// made inside [`Canvas::batch`] are coalesced into a single notification
/// emitted when the outermost batch returns.
pub trait Canvas: Send + Sync {
    /// Serializable state of the whole document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized.
    fn snapshot(&self) -> Result<Snapshot, CanvasError>;

    /// Replace the document with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot does not describe a document.
    fn load_snapshot(&self, snapshot: &Snapshot) -> Result<(), CanvasError>;

    /// Subscribe to change notifications. Dropping the receiver unsubscribes.
    fn listen(&self) -> mpsc::UnboundedReceiver<StoreChange>;

    fn selected_shapes(&self) -> Vec<Shape>;

    fn shape(&self, id: &ShapeId) -> Option<Shape>;

    /// # Errors
    ///
    /// Returns an error if a shape with the same id already exists.
    fn create_shape(&self, shape: Shape) -> Result<(), CanvasError>;

    /// Replace existing shapes by id.
    ///
    /// # Errors
    ///
    /// Returns an error for the first id that does not exist; earlier shapes
    /// in `shapes` stay updated.
    fn update_shapes(&self, shapes: Vec<Shape>) -> Result<(), CanvasError>;

    /// Run `f` as one atomic unit of change. There is no rollback: if `f`
    /// fails, mutations it already made are kept.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    fn batch(&self, f: &mut dyn FnMut() -> Result<(), CanvasError>) -> Result<(), CanvasError>;

    fn viewport_page_bounds(&self) -> Bounds;

    fn current_page_id(&self) -> ParentId;
}
