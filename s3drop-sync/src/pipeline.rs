//! Event-to-upload pipeline: the single consumer of the change source.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use s3drop_core::{ChangeEvent, Outcome, SourceError};

use crate::store::ObjectStore;
use crate::upload::{upload_file, SyncSettings};

/// Counters accumulated over one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub uploaded: u64,
    pub failed: u64,
    pub ignored: u64,
    pub source_errors: u64,
    pub abandoned: u64,
}

impl SyncStats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success { .. } => self.uploaded += 1,
            Outcome::Failure { .. } => self.failed += 1,
            Outcome::Skipped => self.ignored += 1,
            Outcome::Abandoned { .. } => self.abandoned += 1,
        }
    }
}

/// Serial consumer: one event at a time, one upload at a time.
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    settings: SyncSettings,
}

impl Pipeline {
    pub fn new(store: Arc<dyn ObjectStore>, settings: SyncSettings) -> Self {
        Self { store, settings }
    }

    /// Drain `events` until the channel closes or `shutdown` is cancelled.
    ///
    /// Source errors are logged and counted. When the error channel closes the
    /// loop stops polling it and keeps consuming events. An upload still in
    /// flight at shutdown is dropped and counted as abandoned.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<ChangeEvent>,
        mut errors: mpsc::Receiver<SourceError>,
        shutdown: CancellationToken,
    ) -> SyncStats {
        let mut stats = SyncStats::default();
        let mut errors_open = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested, stopping sync pipeline");
                    break;
                }
                err = errors.recv(), if errors_open => match err {
                    Some(err) => {
                        tracing::warn!(error = %err, "change source error");
                        stats.source_errors += 1;
                    }
                    None => {
                        tracing::debug!("change source error channel closed");
                        errors_open = false;
                    }
                },
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("change source closed, stopping sync pipeline");
                        break;
                    };

                    let outcome = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => Outcome::Abandoned { path: event.path.clone() },
                        outcome = self.handle_event(&event) => outcome,
                    };
                    stats.record(&outcome);

                    if let Outcome::Abandoned { path } = &outcome {
                        tracing::warn!(path = %path.display(), "upload interrupted by shutdown");
                        break;
                    }
                }
            }
        }

        stats
    }

    /// Classify one event and upload it if actionable.
    pub async fn handle_event(&self, event: &ChangeEvent) -> Outcome {
        if !event.kind.is_actionable() {
            tracing::debug!(path = %event.path.display(), kind = %event.kind, "ignoring event");
            return Outcome::Skipped;
        }

        tracing::info!(path = %event.path.display(), kind = %event.kind, "change detected");
        upload_file(self.store.as_ref(), &self.settings, &event.path).await
    }
}
