//! Change source: a non-recursive `notify` watcher feeding two bounded channels.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, error::TrySendError};

use s3drop_core::{ChangeEvent, ChangeKind, OverflowPolicy, QueueSettings, SourceError};

use crate::error::DaemonError;

/// Capacity of the source error channel. Errors beyond it are dropped.
pub const ERROR_QUEUE_CAPACITY: usize = 64;

/// Owns the watcher. Dropping it stops notifications and closes both channels.
pub struct ChangeSource {
    dir: PathBuf,
    dropped: Arc<AtomicU64>,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSource")
            .field("dir", &self.dir)
            .field("dropped", &self.dropped_events())
            .finish_non_exhaustive()
    }
}

impl ChangeSource {
    /// Start watching `dir` (non-recursive).
    pub fn watch(
        dir: &Path,
        queue: QueueSettings,
    ) -> Result<(Self, mpsc::Receiver<ChangeEvent>, mpsc::Receiver<SourceError>), DaemonError> {
        let (event_tx, event_rx) = mpsc::channel(queue.capacity.max(1));
        let (error_tx, error_rx) = mpsc::channel(ERROR_QUEUE_CAPACITY);
        let dropped = Arc::new(AtomicU64::new(0));

        let sink = EventSink {
            events: event_tx,
            errors: error_tx,
            overflow: queue.overflow,
            dropped: dropped.clone(),
        };
        let mut watcher =
            recommended_watcher(move |result: notify::Result<Event>| sink.dispatch(result))?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(
            path = %dir.display(),
            capacity = queue.capacity,
            overflow = ?queue.overflow,
            "watch registered",
        );

        let source = Self {
            dir: dir.to_path_buf(),
            dropped,
            _watcher: watcher,
        };
        Ok((source, event_rx, error_rx))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Events discarded by the `drop_newest` overflow policy so far.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Producer half, called on the watcher's own thread.
struct EventSink {
    events: mpsc::Sender<ChangeEvent>,
    errors: mpsc::Sender<SourceError>,
    overflow: OverflowPolicy,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    fn dispatch(&self, result: notify::Result<Event>) {
        match result {
            Ok(event) => {
                for change in translate(event) {
                    self.push_event(change);
                }
            }
            Err(err) => self.push_error(source_error(err)),
        }
    }

    fn push_event(&self, change: ChangeEvent) {
        match self.overflow {
            OverflowPolicy::Block => {
                // Only fails once the pipeline has gone away.
                let _ = self.events.blocking_send(change);
            }
            OverflowPolicy::DropNewest => match self.events.try_send(change) {
                Ok(()) => {}
                Err(TrySendError::Full(change)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        path = %change.path.display(),
                        kind = %change.kind,
                        "event queue full, dropping event",
                    );
                }
                Err(TrySendError::Closed(_)) => {}
            },
        }
    }

    fn push_error(&self, err: SourceError) {
        if let Err(TrySendError::Full(err)) = self.errors.try_send(err) {
            tracing::warn!(error = %err, "source error queue full, dropping error");
        }
    }
}

/// Map a `notify` event kind onto the pipeline's three-way classification.
pub fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(CreateKind::Folder) => ChangeKind::Other,
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
            ChangeKind::Modified
        }
        _ => ChangeKind::Other,
    }
}

/// One [`ChangeEvent`] per path carried by a `notify` event.
pub fn translate(event: Event) -> Vec<ChangeEvent> {
    let kind = classify(&event.kind);
    event
        .paths
        .into_iter()
        .map(|path| ChangeEvent::new(path, kind))
        .collect()
}

fn source_error(err: notify::Error) -> SourceError {
    let message = match &err.kind {
        notify::ErrorKind::Generic(msg) => msg.clone(),
        notify::ErrorKind::Io(io) => format!("I/O error: {io}"),
        notify::ErrorKind::PathNotFound => "path not found".to_string(),
        notify::ErrorKind::WatchNotFound => "watch not found".to_string(),
        notify::ErrorKind::InvalidConfig(config) => format!("invalid watcher config: {config:?}"),
        notify::ErrorKind::MaxFilesWatch => "OS file watch limit reached".to_string(),
    };
    SourceError {
        message,
        paths: err.paths,
    }
}
