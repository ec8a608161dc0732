use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, json};

use super::*;
use crate::canvas::{Bounds, MemoryCanvas, ParentId, ShapeKind};
use crate::content::Snapshot;
use crate::notify::Severity;
use crate::test_helpers::{MockApi, RecordingNotifier, geo};

struct Mounted {
    editor: MountedEditor,
    canvas: Arc<MemoryCanvas>,
    api: Arc<MockApi>,
    notifier: Arc<RecordingNotifier>,
}

async fn mount_with(api: Arc<MockApi>, debug: Option<Arc<DebugHandle>>) -> Mounted {
    let notifier = Arc::new(RecordingNotifier::default());
    let session = EditorSession::open(EditorConfig::default(), api.clone(), notifier.clone(), debug).await;
    let canvas = Arc::new(MemoryCanvas::new());
    let editor = session.mount(canvas.clone());
    Mounted { editor, canvas, api, notifier }
}

async fn mount() -> Mounted {
    mount_with(MockApi::new(), None).await
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}

fn image(id: &str) -> Shape {
    Shape {
        id: ShapeId::from(id),
        parent_id: ParentId::default(),
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        kind: ShapeKind::Other { type_name: "image".into(), props: Map::new() },
        meta: Map::new(),
        omitted: Default::default(),
    }
}

fn ids(raw: &[&str]) -> Vec<ShapeId> {
    raw.iter().map(|id| ShapeId::from(*id)).collect()
}

// =============================================================================
// Open / mount
// =============================================================================

#[tokio::test(start_paused = true)]
async fn failed_initial_fetch_notifies_and_opens_empty() {
    let api = MockApi::new();
    api.fail_gets(true);
    let notifier = Arc::new(RecordingNotifier::default());

    let session = EditorSession::open(EditorConfig::default(), api, notifier.clone(), None).await;
    assert!(session.initial_record().is_none());

    let toasts = notifier.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].title, "Error loading whiteboard");
    assert_eq!(toasts[0].severity, Severity::Error);
}

#[tokio::test(start_paused = true)]
async fn mount_loads_existing_content_without_saving_it() {
    let api = MockApi::new();
    let shape = serde_json::to_value(geo("shape:a")).unwrap();
    api.seed("default", json!({"shapes": {"shape:a": shape}, "bindings": {}, "assets": {}})).await;

    let m = mount_with(api, None).await;
    settle().await;

    assert_eq!(m.canvas.shapes().len(), 1);
    assert_eq!(m.api.update_count(), 0);
    assert!(m.notifier.toasts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn mount_does_not_resave_hand_written_content() {
    let api = MockApi::new();
    let content = json!({"shapes": {"shape:a": {"id": "shape:a", "type": "geo", "props": {"geo": "ellipse"}}}});
    api.seed("default", content.clone()).await;

    let m = mount_with(api, None).await;
    settle().await;

    assert_eq!(m.canvas.shapes().len(), 1);
    assert_eq!(m.api.update_count(), 0);
    assert_eq!(m.canvas.snapshot().unwrap().as_value(), &content);
}

#[tokio::test(start_paused = true)]
async fn mount_does_not_resave_null_shapes() {
    let api = MockApi::new();
    api.seed("default", json!({"shapes": null, "bindings": {}, "assets": {}})).await;

    let m = mount_with(api, None).await;
    settle().await;

    assert_eq!(m.api.update_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_store_edit_then_get_round_trips() {
    let m = mount().await;
    let id = m.editor.add_sample_shape().unwrap();
    settle().await;

    assert_eq!(m.api.update_count(), 1);
    let record = m.api.get_by_id("default").await.unwrap().unwrap();
    assert!(record.content["shapes"].get(id.as_str()).is_some());
    assert_eq!(m.canvas.snapshot().unwrap().as_value(), &record.content);
}

#[tokio::test(start_paused = true)]
async fn debug_handle_tracks_mounted_canvas() {
    let debug = Arc::new(DebugHandle::new());
    let m = mount_with(MockApi::new(), Some(debug.clone())).await;

    let attached = debug.canvas().unwrap();
    attached.create_shape(geo("shape:a")).unwrap();
    assert_eq!(m.canvas.shapes().len(), 1);

    drop(m);
    assert!(debug.canvas().is_none());
}

#[tokio::test(start_paused = true)]
async fn close_flushes_pending_change() {
    let m = mount().await;
    m.editor.add_sample_shape().unwrap();
    // Let the listener forward the change; the quiet interval has not passed.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(m.api.update_count(), 0);

    let api = m.api.clone();
    m.editor.close().await;
    assert_eq!(api.update_count(), 1);
}

// =============================================================================
// Selection
// =============================================================================

#[tokio::test(start_paused = true)]
async fn selection_state_follows_canvas() {
    let m = mount().await;
    assert_eq!(m.editor.selection(), SelectionState::default());

    m.canvas.create_shape(geo("shape:a")).unwrap();
    m.canvas.create_shape(image("shape:img")).unwrap();
    m.canvas.select(&ids(&["shape:a"]));

    let mut watch = m.editor.watch_selection();
    let state = watch.wait_for(|s| s.has_selected_shapes).await.unwrap().clone();
    assert!(state.can_change_shape);
    assert_eq!(state.selected_shape_ids, ids(&["shape:a"]));

    m.canvas.select(&ids(&["shape:a", "shape:img"]));
    let state = watch.wait_for(|s| s.selected_shape_ids.len() == 2).await.unwrap().clone();
    assert!(state.has_selected_shapes);
    assert!(!state.can_change_shape);

    m.canvas.select(&[]);
    let state = watch.wait_for(|s| !s.has_selected_shapes).await.unwrap().clone();
    assert!(!state.can_change_shape);
}

// =============================================================================
// Actions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn sample_shape_is_centered_rectangle() {
    let m = mount().await;
    let id = m.editor.add_sample_shape().unwrap();

    let shape = m.canvas.shape(&id).unwrap();
    assert!(id.as_str().starts_with("shape:"));
    assert_eq!((shape.x, shape.y), (590.0, 310.0));
    assert_eq!(shape.parent_id, ParentId::default());
    let ShapeKind::Geo(props) = &shape.kind else {
        panic!("expected geo shape, got {}", shape.type_name());
    };
    assert_eq!(props.geo, GeoKind::Rectangle);
    assert_eq!(props.style.fill.as_deref(), Some("solid"));
    assert_eq!(props.style.color.as_deref(), Some("black"));
    assert_eq!(props.style.size.as_deref(), Some("m"));
    assert_eq!(props.extra["dash"], json!("draw"));
    assert_eq!(props.extra["w"], json!(100.0));

    assert_eq!(m.notifier.toasts(), vec![messages::shape_added()]);
}

/// Delegates to a [`MemoryCanvas`] but refuses new shapes.
struct ReadOnlyCanvas(MemoryCanvas);

impl Canvas for ReadOnlyCanvas {
    fn snapshot(&self) -> Result<Snapshot, CanvasError> {
        self.0.snapshot()
    }

    fn load_snapshot(&self, snapshot: &Snapshot) -> Result<(), CanvasError> {
        self.0.load_snapshot(snapshot)
    }

    fn listen(&self) -> mpsc::UnboundedReceiver<StoreChange> {
        self.0.listen()
    }

    fn selected_shapes(&self) -> Vec<Shape> {
        self.0.selected_shapes()
    }

    fn shape(&self, id: &ShapeId) -> Option<Shape> {
        self.0.shape(id)
    }

    fn create_shape(&self, shape: Shape) -> Result<(), CanvasError> {
        Err(CanvasError::DuplicateShape(shape.id))
    }

    fn update_shapes(&self, shapes: Vec<Shape>) -> Result<(), CanvasError> {
        self.0.update_shapes(shapes)
    }

    fn batch(&self, f: &mut dyn FnMut() -> Result<(), CanvasError>) -> Result<(), CanvasError> {
        self.0.batch(f)
    }

    fn viewport_page_bounds(&self) -> Bounds {
        self.0.viewport_page_bounds()
    }

    fn current_page_id(&self) -> ParentId {
        self.0.current_page_id()
    }
}

#[tokio::test(start_paused = true)]
async fn failed_add_reports_error() {
    let notifier = Arc::new(RecordingNotifier::default());
    let session = EditorSession::open(EditorConfig::default(), MockApi::new(), notifier.clone(), None).await;
    let editor = session.mount(Arc::new(ReadOnlyCanvas(MemoryCanvas::new())));

    assert!(editor.add_sample_shape().is_err());
    let toasts = notifier.toasts();
    assert_eq!(toasts, vec![messages::error_adding_shape()]);
    assert_eq!(toasts[0].description.as_deref(), Some("Failed to add a new shape to the canvas."));
}

#[tokio::test(start_paused = true)]
async fn change_shape_type_converts_selection_in_one_batch() {
    let m = mount().await;
    m.canvas.create_shape(geo("shape:a")).unwrap();
    m.canvas.create_shape(geo("shape:b")).unwrap();
    m.canvas.create_shape(image("shape:img")).unwrap();
    m.canvas.select(&ids(&["shape:a", "shape:b", "shape:img"]));
    settle().await;
    let saves_before = m.api.update_count();

    let mut changes = m.canvas.listen();
    let converted = m.editor.change_shape_type(ShapeType::Ellipse).unwrap();
    assert_eq!(converted, 2);
    assert_eq!(changes.try_recv().unwrap(), StoreChange::Shapes);
    assert!(changes.try_recv().is_err());

    for id in ["shape:a", "shape:b"] {
        let shape = m.canvas.shape(&ShapeId::from(id)).unwrap();
        let ShapeKind::Geo(props) = shape.kind else {
            panic!("expected geo shape");
        };
        assert_eq!(props.geo, GeoKind::Ellipse);
        assert_eq!(props.style.size.as_deref(), Some("m"));
    }
    assert_eq!(m.canvas.shape(&ShapeId::from("shape:img")).unwrap().type_name(), "image");

    let last = m.notifier.toasts().into_iter().last().unwrap();
    assert_eq!(last, messages::shape_updated(ShapeType::Ellipse));
    assert_eq!(last.description.as_deref(), Some("Changed to ellipse shape"));

    settle().await;
    assert_eq!(m.api.update_count(), saves_before + 1);
}

#[tokio::test(start_paused = true)]
async fn change_to_text_sets_placeholder() {
    let m = mount().await;
    m.canvas.create_shape(geo("shape:a")).unwrap();
    m.canvas.select(&ids(&["shape:a"]));

    m.editor.change_shape_type(ShapeType::Text).unwrap();
    let shape = m.canvas.shape(&ShapeId::from("shape:a")).unwrap();
    let ShapeKind::Text(props) = shape.kind else {
        panic!("expected text shape");
    };
    assert_eq!(props.text.as_deref(), Some("Double click to edit"));
    assert_eq!(props.extra["w"], json!(100));
}

#[tokio::test(start_paused = true)]
async fn empty_selection_is_a_no_op() {
    let m = mount().await;
    assert_eq!(m.editor.change_shape_type(ShapeType::Star).unwrap(), 0);
    assert!(m.notifier.toasts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn image_target_reports_error() {
    let m = mount().await;
    m.canvas.create_shape(geo("shape:a")).unwrap();
    m.canvas.select(&ids(&["shape:a"]));

    let err = m.editor.change_shape_type(ShapeType::Image).unwrap_err();
    assert!(matches!(err, CanvasError::Conversion(_)));

    let last = m.notifier.toasts().into_iter().last().unwrap();
    assert_eq!(last.title, "Error");
    assert_eq!(last.severity, Severity::Error);
    assert_eq!(last.description, Some(err.to_string()));
    assert_eq!(m.canvas.shape(&ShapeId::from("shape:a")).unwrap().type_name(), "geo");
}
