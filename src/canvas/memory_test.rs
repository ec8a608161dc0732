use serde_json::json;

use super::*;
use crate::test_helpers::geo;

fn drain(rx: &mut mpsc::UnboundedReceiver<StoreChange>) -> Vec<StoreChange> {
    let mut out = Vec::new();
    while let Ok(change) = rx.try_recv() {
        out.push(change);
    }
    out
}

#[test]
fn new_canvas_snapshot_has_empty_collections() {
    let canvas = MemoryCanvas::new();
    let snapshot = canvas.snapshot().unwrap();
    assert_eq!(snapshot.as_value(), &json!({"shapes": {}, "bindings": {}, "assets": {}}));
}

#[test]
fn create_shape_notifies_listeners() {
    let canvas = MemoryCanvas::new();
    let mut rx = canvas.listen();
    canvas.create_shape(geo("shape:a")).unwrap();
    assert_eq!(drain(&mut rx), vec![StoreChange::Shapes]);
    assert_eq!(canvas.shapes().len(), 1);
}

#[test]
fn duplicate_create_is_rejected() {
    let canvas = MemoryCanvas::new();
    canvas.create_shape(geo("shape:a")).unwrap();
    let err = canvas.create_shape(geo("shape:a")).unwrap_err();
    assert!(matches!(err, CanvasError::DuplicateShape(_)));
}

#[test]
fn dropped_listener_is_pruned() {
    let canvas = MemoryCanvas::new();
    let rx = canvas.listen();
    drop(rx);
    canvas.create_shape(geo("shape:a")).unwrap();
    assert!(canvas.lock().listeners.is_empty());
}

#[test]
fn batch_emits_single_notification() {
    let canvas = MemoryCanvas::new();
    canvas.create_shape(geo("shape:a")).unwrap();
    canvas.create_shape(geo("shape:b")).unwrap();
    let mut rx = canvas.listen();

    canvas
        .batch(&mut || {
            let mut a = canvas.shape(&ShapeId::from("shape:a")).unwrap();
            a.x = 50.0;
            canvas.update_shapes(vec![a])?;
            let mut b = canvas.shape(&ShapeId::from("shape:b")).unwrap();
            b.y = 75.0;
            canvas.update_shapes(vec![b])
        })
        .unwrap();

    assert_eq!(drain(&mut rx), vec![StoreChange::Shapes]);
}

#[test]
fn failed_batch_keeps_earlier_updates() {
    let canvas = MemoryCanvas::new();
    canvas.create_shape(geo("shape:a")).unwrap();
    let mut rx = canvas.listen();

    let result = canvas.batch(&mut || {
        let mut a = canvas.shape(&ShapeId::from("shape:a")).unwrap();
        a.x = 99.0;
        canvas.update_shapes(vec![a])?;
        canvas.update_shapes(vec![geo("shape:missing")])
    });

    assert!(matches!(result, Err(CanvasError::ShapeNotFound(_))));
    let a = canvas.shape(&ShapeId::from("shape:a")).unwrap();
    assert!((a.x - 99.0).abs() < f64::EPSILON);
    assert_eq!(drain(&mut rx), vec![StoreChange::Shapes]);
}

#[test]
fn selection_filters_unknown_ids() {
    let canvas = MemoryCanvas::new();
    canvas.create_shape(geo("shape:a")).unwrap();
    canvas.select(&[ShapeId::from("shape:a"), ShapeId::from("shape:ghost")]);
    let selected = canvas.selected_shapes();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id, ShapeId::from("shape:a"));
}

#[test]
fn load_then_snapshot_is_lossless() {
    let content = json!({
        "shapes": {
            "shape:a": {
                "id": "shape:a", "type": "geo", "x": 10, "y": 20, "rotation": 0,
                "parentId": "page:page", "index": "a1",
                "props": {"geo": "rectangle", "w": 100, "h": 100, "dash": "draw"}
            },
            "shape:i": {
                "id": "shape:i", "type": "image", "x": 0, "y": 0, "rotation": 0,
                "parentId": "page:page", "props": {"assetId": "asset:1"}
            }
        },
        "bindings": {"binding:1": {"fromId": "shape:a"}},
        "assets": {"asset:1": {"src": "data:,"}},
        "schema": {"schemaVersion": 2}
    });
    let snapshot = Snapshot::new(content);
    let canvas = MemoryCanvas::new();
    let mut rx = canvas.listen();
    canvas.load_snapshot(&snapshot).unwrap();

    assert_eq!(canvas.snapshot().unwrap().serialize().unwrap(), snapshot.serialize().unwrap());
    assert_eq!(drain(&mut rx), vec![StoreChange::Loaded]);
}

#[test]
fn load_keeps_sparse_documents_sparse() {
    let snapshot = Snapshot::new(json!({"shapes": {}}));
    let canvas = MemoryCanvas::new();
    canvas.load_snapshot(&snapshot).unwrap();
    assert_eq!(canvas.snapshot().unwrap(), snapshot);
}

#[test]
fn load_keeps_absent_shape_fields_absent() {
    let snapshot = Snapshot::new(json!({
        "shapes": {
            "shape:a": {"id": "shape:a", "type": "geo", "props": {"geo": "ellipse"}},
            "shape:b": {"id": "shape:b", "type": "geo", "x": 4},
            "shape:n": {"id": "shape:n", "type": "note"}
        }
    }));
    let canvas = MemoryCanvas::new();
    canvas.load_snapshot(&snapshot).unwrap();
    assert_eq!(canvas.snapshot().unwrap().serialize().unwrap(), snapshot.serialize().unwrap());
}

#[test]
fn moving_a_sparse_shape_writes_only_what_changed() {
    let canvas = MemoryCanvas::new();
    canvas
        .load_snapshot(&Snapshot::new(json!({"shapes": {"shape:a": {"id": "shape:a", "type": "geo"}}})))
        .unwrap();

    let mut a = canvas.shape(&ShapeId::from("shape:a")).unwrap();
    a.x = 30.0;
    canvas.update_shapes(vec![a]).unwrap();

    let snapshot = canvas.snapshot().unwrap();
    assert_eq!(snapshot.as_value()["shapes"]["shape:a"], json!({"id": "shape:a", "type": "geo", "x": 30}));
}

#[test]
fn null_shapes_survive_reload() {
    let snapshot = Snapshot::new(json!({"shapes": null, "bindings": {}, "assets": {}}));
    let canvas = MemoryCanvas::new();
    canvas.load_snapshot(&snapshot).unwrap();
    assert_eq!(canvas.snapshot().unwrap(), snapshot);
    assert!(canvas.shapes().is_empty());

    canvas.create_shape(geo("shape:a")).unwrap();
    assert_eq!(canvas.shapes().len(), 1);
}

#[test]
fn load_rejects_non_document() {
    let canvas = MemoryCanvas::new();
    let err = canvas.load_snapshot(&Snapshot::new(json!([1, 2, 3]))).unwrap_err();
    assert!(matches!(err, CanvasError::InvalidSnapshot(_)));
}

#[test]
fn load_drops_selection_of_vanished_shapes() {
    let canvas = MemoryCanvas::new();
    canvas.create_shape(geo("shape:a")).unwrap();
    canvas.select(&[ShapeId::from("shape:a")]);
    canvas.load_snapshot(&Snapshot::new(json!({"shapes": {}}))).unwrap();
    assert!(canvas.selected_shapes().is_empty());
}

#[test]
fn viewport_and_page_defaults() {
    let canvas = MemoryCanvas::new();
    assert_eq!(canvas.current_page_id(), ParentId::from("page:page"));
    canvas.set_viewport(Bounds { x: 100.0, y: 100.0, width: 200.0, height: 50.0 });
    assert_eq!(canvas.viewport_page_bounds().center(), (200.0, 125.0));
}
