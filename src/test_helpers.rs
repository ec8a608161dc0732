use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{Map, json};

use crate::api::{ApiError, LocalWhiteboardApi, WhiteboardApi};
use crate::canvas::{GeoKind, GeoProps, ParentId, Shape, ShapeId, ShapeStyle};
use crate::model::{ContentInput, WhiteboardRecord};
use crate::notify::{Notifier, Toast};
use crate::services::store::MemoryWhiteboardStore;

/// A 100x100 rectangle at the origin.
pub fn geo(id: &str) -> Shape {
    let mut extra = Map::new();
    extra.insert("w".into(), json!(100));
    extra.insert("h".into(), json!(100));
    Shape::geo(
        ShapeId::from(id),
        ParentId::default(),
        0.0,
        0.0,
        GeoProps { geo: GeoKind::Rectangle, style: ShapeStyle::default(), extra },
    )
}

/// Collects every toast for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.toasts().into_iter().map(|toast| toast.title).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner).push(toast);
    }
}

/// In-process API over a memory store that counts calls and can be told to
/// fail or stall.
pub struct MockApi {
    inner: LocalWhiteboardApi,
    updates: Mutex<Vec<ContentInput>>,
    gets: AtomicUsize,
    fail_updates: AtomicBool,
    fail_gets: AtomicBool,
    update_delays: Mutex<VecDeque<Duration>>,
    get_delays: Mutex<VecDeque<Duration>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalWhiteboardApi::new(Arc::new(MemoryWhiteboardStore::new())),
            updates: Mutex::new(Vec::new()),
            gets: AtomicUsize::new(0),
            fail_updates: AtomicBool::new(false),
            fail_gets: AtomicBool::new(false),
            update_delays: Mutex::new(VecDeque::new()),
            get_delays: Mutex::new(VecDeque::new()),
        })
    }

    pub fn updates(&self) -> Vec<ContentInput> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Delay the next update call by `delay`. Queued delays apply in order.
    pub fn delay_next_update(&self, delay: Duration) {
        self.update_delays.lock().unwrap_or_else(PoisonError::into_inner).push_back(delay);
    }

    /// Delay the next get call by `delay`.
    pub fn delay_next_get(&self, delay: Duration) {
        self.get_delays.lock().unwrap_or_else(PoisonError::into_inner).push_back(delay);
    }

    /// Seed a record without counting it as an update.
    pub async fn seed(&self, id: &str, content: serde_json::Value) -> WhiteboardRecord {
        let serde_json::Value::Object(map) = content else {
            panic!("seed content must be an object");
        };
        self.inner.update(id, ContentInput::Document(map)).await.unwrap()
    }
}

fn unavailable() -> ApiError {
    ApiError::Status { status: 500, message: "database unavailable".into() }
}

#[async_trait::async_trait]
impl WhiteboardApi for MockApi {
    async fn get_by_id(&self, id: &str) -> Result<Option<WhiteboardRecord>, ApiError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let delay = self.get_delays.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.get_by_id(id).await
    }

    async fn create(&self, id: &str, content: ContentInput) -> Result<WhiteboardRecord, ApiError> {
        self.inner.create(id, content).await
    }

    async fn update(&self, id: &str, content: ContentInput) -> Result<WhiteboardRecord, ApiError> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner).push(content.clone());
        let delay = self.update_delays.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.update(id, content).await
    }
}
