//! Autosave pipeline — debounced, idempotent publisher of canvas snapshots.
//!
//! DESIGN
//! ======
//! One tokio task owns all pipeline state (pending snapshot, debounce
//! deadline, save marker) and processes commands strictly in arrival order,
//! so the marker has a single writer and needs no lock. Remote calls run as
//! spawned tasks that report back to the owner over an event channel; the
//! owner never awaits the network itself.
//!
//! Every change notification replaces the pending snapshot and pushes the
//! deadline out by the quiet interval. When the deadline passes, the pending
//! snapshot is serialized and compared with the last-saved marker; an
//! identical serialization is dropped without a network call.
//!
//! Each submission carries a monotonic sequence number. Only the newest
//! submission's acknowledgment triggers a re-fetch of the canonical record,
//! and a re-fetched record is only loaded into the canvas if nothing newer
//! happened locally in the meantime.
//!
//! ERROR HANDLING
//! ==============
//! Failures end at this task: they are logged and surfaced as notifications.
//! No retry timer is scheduled. Under [`MarkerPolicy::Optimistic`] a failed
//! save leaves the marker at the attempted value, so resubmitting the same
//! document is suppressed until it changes again. [`MarkerPolicy::Acknowledged`]
//! rolls the marker back to the last acknowledged value instead, so the next
//! debounce tick resubmits.

#[cfg(test)]
#[path = "autosave_test.rs"]
mod tests;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, WhiteboardApi};
use crate::canvas::Canvas;
use crate::config::{ConfigError, EditorConfig};
use crate::content::{Snapshot, parse_content};
use crate::model::{ContentInput, WhiteboardRecord};
use crate::notify::{Notifier, messages};

// =============================================================================
// MARKER
// =============================================================================

/// When the last-saved marker is allowed to move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkerPolicy {
    /// Set on submission and kept even if the save fails.
    #[default]
    Optimistic,
    /// Set on submission, rolled back to the acknowledged value on failure.
    Acknowledged,
}

impl FromStr for MarkerPolicy {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "acknowledged" => Ok(Self::Acknowledged),
            _ => Err(ConfigError::UnknownMarkerPolicy(raw.to_owned())),
        }
    }
}

impl fmt::Display for MarkerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimistic => f.write_str("optimistic"),
            Self::Acknowledged => f.write_str("acknowledged"),
        }
    }
}

/// Serializations the pipeline considers saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveMarker {
    last_saved: Option<String>,
    committed: Option<String>,
}

impl SaveMarker {
    /// Most recently submitted or loaded serialization.
    #[must_use]
    pub fn last_saved(&self) -> Option<&str> {
        self.last_saved.as_deref()
    }

    /// Most recently acknowledged or loaded serialization.
    #[must_use]
    pub fn committed(&self) -> Option<&str> {
        self.committed.as_deref()
    }

    fn is_saved(&self, serialized: &str) -> bool {
        self.last_saved.as_deref() == Some(serialized)
    }

    fn submitted(&mut self, serialized: String) {
        self.last_saved = Some(serialized);
    }

    fn acknowledged(&mut self, serialized: String) {
        self.committed = Some(serialized);
    }

    fn rejected(&mut self, serialized: &str, policy: MarkerPolicy) {
        // EDGE: a newer submission already moved the marker; leave it alone.
        if policy == MarkerPolicy::Acknowledged && self.is_saved(serialized) {
            self.last_saved.clone_from(&self.committed);
        }
    }

    fn loaded(&mut self, serialized: String) {
        self.committed = Some(serialized.clone());
        self.last_saved = Some(serialized);
    }
}

// =============================================================================
// HANDLE
// =============================================================================

enum Command {
    Changed(Snapshot),
    Load(WhiteboardRecord),
    Flush(oneshot::Sender<()>),
    Marker(oneshot::Sender<SaveMarker>),
}

enum Event {
    Saved { seq: u64, serialized: String, result: Result<WhiteboardRecord, ApiError> },
    Refetched { seq: u64, result: Result<Option<WhiteboardRecord>, ApiError> },
}

/// Cheap, cloneable handle to a running pipeline. The pipeline stops (and
/// any pending, unsubmitted snapshot is discarded) once every handle is
/// dropped; saves already in flight still complete.
#[derive(Clone)]
pub struct AutosaveHandle {
    commands: mpsc::UnboundedSender<Command>,
    saving: watch::Receiver<bool>,
}

impl AutosaveHandle {
    /// Spawn the pipeline task on the current tokio runtime.
    #[must_use]
    pub fn spawn(
        config: &EditorConfig,
        canvas: Arc<dyn Canvas>,
        api: Arc<dyn WhiteboardApi>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (saving_tx, saving_rx) = watch::channel(false);

        info!(
            whiteboard_id = %config.whiteboard_id,
            debounce_ms = u64::try_from(config.debounce.as_millis()).unwrap_or(u64::MAX),
            marker_policy = %config.marker_policy,
            "autosave pipeline started"
        );

        let pipeline = Pipeline {
            whiteboard_id: config.whiteboard_id.clone(),
            debounce: config.debounce,
            policy: config.marker_policy,
            canvas,
            api,
            notifier,
            marker: SaveMarker::default(),
            pending: None,
            deadline: None,
            next_seq: 0,
            acked_seq: 0,
            in_flight: 0,
            saving: saving_tx,
            events: events_tx,
        };
        tokio::spawn(pipeline.run(commands_rx, events_rx));

        Self { commands: commands_tx, saving: saving_rx }
    }

    /// Record a change notification carrying the document's current state.
    pub fn on_document_changed(&self, snapshot: Snapshot) {
        self.send(Command::Changed(snapshot));
    }

    /// Load a canonical record into the canvas without it counting as an edit.
    pub fn load(&self, record: WhiteboardRecord) {
        self.send(Command::Load(record));
    }

    /// Submit the pending snapshot now instead of waiting out the quiet
    /// interval. Returns once the submission (if any) has been issued.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx));
        if rx.await.is_err() {
            warn!("autosave pipeline stopped before flush completed");
        }
    }

    /// Current marker state, or `None` if the pipeline has stopped.
    pub async fn marker(&self) -> Option<SaveMarker> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Marker(tx));
        rx.await.ok()
    }

    /// True while any save request is in flight.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        *self.saving.borrow()
    }

    /// Subscribe to the saving indicator.
    #[must_use]
    pub fn saving(&self) -> watch::Receiver<bool> {
        self.saving.clone()
    }

    /// Wait until no save request is in flight.
    pub async fn wait_idle(&self) {
        let mut saving = self.saving.clone();
        if saving.wait_for(|busy| !*busy).await.is_err() {
            debug!("autosave pipeline stopped while waiting for idle");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("autosave pipeline is not running; command dropped");
        }
    }
}

// =============================================================================
// PIPELINE TASK
// =============================================================================

struct Pipeline {
    whiteboard_id: String,
    debounce: Duration,
    policy: MarkerPolicy,
    canvas: Arc<dyn Canvas>,
    api: Arc<dyn WhiteboardApi>,
    notifier: Arc<dyn Notifier>,
    marker: SaveMarker,
    pending: Option<Snapshot>,
    deadline: Option<Instant>,
    /// Sequence number of the newest submission.
    next_seq: u64,
    /// Sequence number of the newest acknowledged submission.
    acked_seq: u64,
    in_flight: usize,
    saving: watch::Sender<bool>,
    events: mpsc::UnboundedSender<Event>,
}

impl Pipeline {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, mut events: mpsc::UnboundedReceiver<Event>) {
        loop {
            let deadline = self.deadline;
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command);
                }
                Some(event) = events.recv() => self.handle_event(event),
                () = timer => self.fire(),
            }
        }

        if self.pending.is_some() {
            warn!(whiteboard_id = %self.whiteboard_id, "autosave pipeline stopped with an unsaved change pending");
        }
        debug!(whiteboard_id = %self.whiteboard_id, "autosave pipeline stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Changed(snapshot) => {
                // Supersede whatever was scheduled; only the newest snapshot
                // of a burst is ever submitted.
                self.pending = Some(snapshot);
                self.deadline = Some(Instant::now() + self.debounce);
            }
            Command::Load(record) => self.load(&record),
            Command::Flush(reply) => {
                self.fire();
                if reply.send(()).is_err() {
                    debug!("flush caller went away");
                }
            }
            Command::Marker(reply) => {
                if reply.send(self.marker.clone()).is_err() {
                    debug!("marker caller went away");
                }
            }
        }
    }

    fn fire(&mut self) {
        self.deadline = None;
        if let Some(snapshot) = self.pending.take() {
            self.submit(snapshot);
        }
    }

    fn submit(&mut self, snapshot: Snapshot) {
        let serialized = match snapshot.serialize() {
            Ok(serialized) => serialized,
            Err(e) => {
                error!(error = %e, "failed to serialize whiteboard snapshot");
                self.notifier.notify(messages::error_saving(e.to_string()));
                return;
            }
        };

        if self.marker.is_saved(&serialized) {
            debug!(whiteboard_id = %self.whiteboard_id, "snapshot unchanged since last save; skipping");
            return;
        }

        self.marker.submitted(serialized.clone());
        self.next_seq += 1;
        let seq = self.next_seq;
        self.in_flight += 1;
        self.saving.send_replace(true);
        debug!(whiteboard_id = %self.whiteboard_id, seq, bytes = serialized.len(), "submitting whiteboard save");

        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        let id = self.whiteboard_id.clone();
        let content = ContentInput::from(snapshot);
        tokio::spawn(async move {
            let result = api.update(&id, content).await;
            if events.send(Event::Saved { seq, serialized, result }).is_err() {
                debug!(seq, "autosave pipeline stopped before save completed");
            }
        });
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Saved { seq, serialized, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.saving.send_replace(self.in_flight > 0);
                match result {
                    Ok(record) => self.on_saved(seq, serialized, &record),
                    Err(e) => self.on_save_failed(seq, &serialized, &e),
                }
            }
            Event::Refetched { seq, result } => self.on_refetched(seq, result),
        }
    }

    fn on_saved(&mut self, seq: u64, serialized: String, record: &WhiteboardRecord) {
        info!(whiteboard_id = %record.id, seq, "whiteboard saved");
        if seq > self.acked_seq {
            self.acked_seq = seq;
            self.marker.acknowledged(serialized);
        }
        self.notifier.notify(messages::changes_saved());

        if seq != self.next_seq {
            debug!(seq, latest = self.next_seq, "newer save in flight; skipping re-fetch");
            return;
        }

        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        let id = self.whiteboard_id.clone();
        tokio::spawn(async move {
            let result = api.get_by_id(&id).await;
            if events.send(Event::Refetched { seq, result }).is_err() {
                debug!(seq, "autosave pipeline stopped before re-fetch completed");
            }
        });
    }

    fn on_save_failed(&mut self, seq: u64, serialized: &str, err: &ApiError) {
        error!(whiteboard_id = %self.whiteboard_id, seq, error = %err, "error saving whiteboard");
        self.marker.rejected(serialized, self.policy);
        self.notifier.notify(messages::error_saving(err.to_string()));
    }

    fn on_refetched(&mut self, seq: u64, result: Result<Option<WhiteboardRecord>, ApiError>) {
        match result {
            Ok(Some(record)) => {
                if seq != self.next_seq || self.pending.is_some() {
                    debug!(seq, latest = self.next_seq, "local changes are newer; not reloading canonical record");
                    return;
                }
                self.load(&record);
            }
            Ok(None) => warn!(whiteboard_id = %self.whiteboard_id, "whiteboard missing on re-fetch after save"),
            Err(e) => warn!(whiteboard_id = %self.whiteboard_id, error = %e, "re-fetch after save failed"),
        }
    }

    /// Parse a record and load it into the canvas. The marker moves first so
    /// the change notification the load itself produces is not mistaken for
    /// an edit.
    fn load(&mut self, record: &WhiteboardRecord) {
        let snapshot = match parse_content(&record.content) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(whiteboard_id = %record.id, "whiteboard has no content to load");
                return;
            }
            Err(e) => {
                warn!(whiteboard_id = %record.id, error = %e, "failed to parse whiteboard content; skipping load");
                return;
            }
        };
        let serialized = match snapshot.serialize() {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(whiteboard_id = %record.id, error = %e, "failed to serialize loaded content; skipping load");
                return;
            }
        };

        self.marker.loaded(serialized);
        match self.canvas.load_snapshot(&snapshot) {
            Ok(()) => debug!(whiteboard_id = %record.id, "loaded whiteboard into canvas"),
            Err(e) => warn!(whiteboard_id = %record.id, error = %e, "canvas rejected whiteboard content"),
        }
    }
}
