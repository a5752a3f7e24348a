//! Pipeline behaviour against in-memory stores: one store call per actionable
//! event, no calls for ignored or vanished files, serial ordering, failure
//! isolation, opt-in retry, and shutdown.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use s3drop_core::{ChangeEvent, ChangeKind, ObjectKey, Outcome, SourceError};
use s3drop_sync::{
    ObjectStore, Pipeline, RetryPolicy, StoreError, SyncSettings, SyncStats, UploadBody,
};
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

const BUCKET: &str = "test-bucket";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct PutCall {
    bucket: String,
    key: String,
    content: Vec<u8>,
}

/// Records every put, answers from a scripted queue (default `Ok`), and keeps a
/// start/end journal to check that calls never overlap.
#[derive(Default)]
struct RecordingStore {
    calls: Mutex<Vec<PutCall>>,
    journal: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<Result<(), StoreError>>>,
    delay: Duration,
}

impl RecordingStore {
    fn with_responses(responses: Vec<Result<(), StoreError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<PutCall> {
        self.calls.lock().unwrap().clone()
    }

    fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put(&self, bucket: &str, key: &ObjectKey, body: UploadBody) -> Result<(), StoreError> {
        self.journal.lock().unwrap().push(format!("start {key}"));
        let content = body.read_to_end().await.expect("read body");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(PutCall {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content,
        });
        self.journal.lock().unwrap().push(format!("end {key}"));
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Never completes; signals when a put has started.
#[derive(Default)]
struct HangingStore {
    started: Notify,
}

#[async_trait]
impl ObjectStore for HangingStore {
    async fn put(&self, _bucket: &str, _key: &ObjectKey, _body: UploadBody) -> Result<(), StoreError> {
        self.started.notify_one();
        std::future::pending::<()>().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write file");
    path
}

fn pipeline(store: Arc<dyn ObjectStore>) -> Pipeline {
    Pipeline::new(store, SyncSettings::new(BUCKET))
}

fn pipeline_with_retry(store: Arc<dyn ObjectStore>, max_attempts: u32) -> Pipeline {
    let settings = SyncSettings {
        bucket: BUCKET.to_string(),
        retry: RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        },
    };
    Pipeline::new(store, settings)
}

/// Feed `events` through a closed channel pair and run the pipeline to completion.
async fn run_events(pipeline: &Pipeline, events: Vec<ChangeEvent>) -> SyncStats {
    let (event_tx, event_rx) = mpsc::channel(events.len().max(1));
    let (error_tx, error_rx) = mpsc::channel::<SourceError>(1);
    for event in events {
        event_tx.send(event).await.expect("queue event");
    }
    drop(event_tx);
    drop(error_tx);
    pipeline
        .run(event_rx, error_rx, CancellationToken::new())
        .await
}

// ---------------------------------------------------------------------------
// 1. Actionable events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn each_actionable_event_issues_one_store_call_with_base_name_key() {
    let dir = TempDir::new().expect("tempdir");
    let a = write_file(&dir, "a.txt", b"alpha");
    let b = write_file(&dir, "b.bin", &[0u8, 1, 2, 255]);
    let store = Arc::new(RecordingStore::default());

    let stats = run_events(
        &pipeline(store.clone()),
        vec![ChangeEvent::created(&a), ChangeEvent::modified(&b)],
    )
    .await;

    assert_eq!(stats.uploaded, 2);
    assert_eq!(
        store.calls(),
        vec![
            PutCall {
                bucket: BUCKET.to_string(),
                key: "a.txt".to_string(),
                content: b"alpha".to_vec(),
            },
            PutCall {
                bucket: BUCKET.to_string(),
                key: "b.bin".to_string(),
                content: vec![0, 1, 2, 255],
            },
        ]
    );
}

#[tokio::test]
async fn modified_report_in_watch_folder_is_stored_under_its_file_name() {
    let root = TempDir::new().expect("tempdir");
    let watch = root.path().join("watchfolder");
    fs::create_dir_all(&watch).expect("mkdir");
    let report = watch.join("report.csv");
    fs::write(&report, "id,total\n1,42\n").expect("write report");
    let store = Arc::new(RecordingStore::default());

    let outcome = pipeline(store.clone())
        .handle_event(&ChangeEvent::modified(&report))
        .await;

    assert!(outcome.is_success(), "got {outcome:?}");
    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].key, "report.csv");
    assert_eq!(calls[0].bucket, BUCKET);
    assert_eq!(calls[0].content, b"id,total\n1,42\n");
}

#[tokio::test]
async fn content_reflects_file_bytes_at_processing_time() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "notes.md", b"draft");
    fs::write(&path, b"final").expect("rewrite");
    let store = Arc::new(RecordingStore::default());

    run_events(&pipeline(store.clone()), vec![ChangeEvent::modified(&path)]).await;

    assert_eq!(store.calls()[0].content, b"final");
}

#[tokio::test]
async fn duplicate_events_are_not_deduplicated() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "same.txt", b"unchanged");
    let store = Arc::new(RecordingStore::default());

    let stats = run_events(
        &pipeline(store.clone()),
        vec![ChangeEvent::modified(&path), ChangeEvent::modified(&path)],
    )
    .await;

    assert_eq!(stats.uploaded, 2);
    let calls = store.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

// ---------------------------------------------------------------------------
// 2. Ignored and failing events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_actionable_events_issue_no_store_call() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "renamed.txt", b"x");
    let store = Arc::new(RecordingStore::default());

    let stats = run_events(
        &pipeline(store.clone()),
        vec![
            ChangeEvent::new(&path, ChangeKind::Other),
            ChangeEvent::new(dir.path().join("gone.txt"), ChangeKind::Other),
        ],
    )
    .await;

    assert!(store.calls().is_empty());
    assert_eq!(stats.ignored, 2);
    assert_eq!(stats.uploaded, 0);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn missing_file_fails_without_store_call_and_pipeline_continues() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("missing.txt");
    let present = write_file(&dir, "present.txt", b"here");
    let store = Arc::new(RecordingStore::default());

    let stats = run_events(
        &pipeline(store.clone()),
        vec![ChangeEvent::created(&missing), ChangeEvent::created(&present)],
    )
    .await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.uploaded, 1);
    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].key, "present.txt");
}

#[tokio::test]
async fn file_deleted_before_open_yields_open_failure() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "ephemeral.tmp", b"soon gone");
    let event = ChangeEvent::created(&path);
    fs::remove_file(&path).expect("delete");
    let store = Arc::new(RecordingStore::default());

    let outcome = pipeline(store.clone()).handle_event(&event).await;

    match outcome {
        Outcome::Failure { path: failed, reason } => {
            assert_eq!(failed, path);
            assert!(reason.contains("failed to open"), "reason: {reason}");
            assert!(reason.contains("ephemeral.tmp"), "reason: {reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn directory_paths_are_rejected_before_the_store() {
    let dir = TempDir::new().expect("tempdir");
    let sub = dir.path().join("nested");
    fs::create_dir_all(&sub).expect("mkdir");
    let store = Arc::new(RecordingStore::default());

    let outcome = pipeline(store.clone())
        .handle_event(&ChangeEvent::created(&sub))
        .await;

    assert!(matches!(outcome, Outcome::Failure { .. }), "got {outcome:?}");
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn store_failure_is_not_retried_and_next_event_proceeds() {
    let dir = TempDir::new().expect("tempdir");
    let first = write_file(&dir, "first.txt", b"1");
    let second = write_file(&dir, "second.txt", b"2");
    let store = Arc::new(RecordingStore::with_responses(vec![Err(
        StoreError::Transient("connection reset".into()),
    )]));

    let stats = run_events(
        &pipeline(store.clone()),
        vec![ChangeEvent::modified(&first), ChangeEvent::created(&second)],
    )
    .await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.uploaded, 1);
    let keys: Vec<String> = store.calls().into_iter().map(|c| c.key).collect();
    assert_eq!(keys, vec!["first.txt", "second.txt"], "no retry of first.txt");
}

// ---------------------------------------------------------------------------
// 3. Ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn uploads_run_serially_in_event_order() {
    let dir = TempDir::new().expect("tempdir");
    let a = write_file(&dir, "a.txt", b"a");
    let b = write_file(&dir, "b.txt", b"b");
    let store = Arc::new(RecordingStore::with_delay(Duration::from_millis(20)));

    run_events(
        &pipeline(store.clone()),
        vec![ChangeEvent::modified(&a), ChangeEvent::created(&b)],
    )
    .await;

    assert_eq!(
        store.journal(),
        vec!["start a.txt", "end a.txt", "start b.txt", "end b.txt"]
    );
}

// ---------------------------------------------------------------------------
// 4. Retry (opt-in)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_failures_are_retried_when_enabled() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "flaky.txt", b"payload");
    let store = Arc::new(RecordingStore::with_responses(vec![
        Err(StoreError::Transient("503 SlowDown".into())),
        Err(StoreError::Transient("timeout".into())),
    ]));

    let stats = run_events(
        &pipeline_with_retry(store.clone(), 3),
        vec![ChangeEvent::modified(&path)],
    )
    .await;

    assert_eq!(stats.uploaded, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(store.calls().len(), 3);
}

#[tokio::test]
async fn permanent_failures_are_attempted_once_even_with_retry() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "denied.txt", b"payload");
    let store = Arc::new(RecordingStore::with_responses(vec![Err(
        StoreError::Permanent("AccessDenied".into()),
    )]));

    let stats = run_events(
        &pipeline_with_retry(store.clone(), 5),
        vec![ChangeEvent::modified(&path)],
    )
    .await;

    assert_eq!(stats.failed, 1);
    assert_eq!(store.calls().len(), 1);
}

#[tokio::test]
async fn missing_files_are_never_retried() {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(RecordingStore::default());

    let stats = run_events(
        &pipeline_with_retry(store.clone(), 5),
        vec![ChangeEvent::created(dir.path().join("nope.txt"))],
    )
    .await;

    assert_eq!(stats.failed, 1);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn exhausted_retries_report_failure() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "down.txt", b"payload");
    let store = Arc::new(RecordingStore::with_responses(vec![
        Err(StoreError::Transient("a".into())),
        Err(StoreError::Transient("b".into())),
    ]));

    let outcome = pipeline_with_retry(store.clone(), 2)
        .handle_event(&ChangeEvent::modified(&path))
        .await;

    match outcome {
        Outcome::Failure { reason, .. } => assert!(reason.contains("down.txt"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(store.calls().len(), 2);
}

// ---------------------------------------------------------------------------
// 5. Channels and shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn source_errors_are_counted_and_do_not_stop_the_loop() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "after-error.txt", b"ok");
    let store = Arc::new(RecordingStore::default());
    let (event_tx, event_rx) = mpsc::channel(4);
    let (error_tx, error_rx) = mpsc::channel(4);

    error_tx
        .send(SourceError::new("inotify queue overflow"))
        .await
        .expect("send error");
    drop(error_tx);
    event_tx
        .send(ChangeEvent::modified(&path))
        .await
        .expect("send event");
    drop(event_tx);

    let stats = pipeline(store.clone())
        .run(event_rx, error_rx, CancellationToken::new())
        .await;

    assert_eq!(stats.source_errors, 1);
    assert_eq!(stats.uploaded, 1);
}

#[tokio::test]
async fn closing_only_the_error_channel_keeps_the_loop_running() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "late.txt", b"late");
    let store = Arc::new(RecordingStore::default());
    let (event_tx, event_rx) = mpsc::channel(4);
    let (error_tx, error_rx) = mpsc::channel::<SourceError>(4);
    drop(error_tx);

    let pipeline = pipeline(store.clone());
    let handle = tokio::spawn(async move {
        pipeline
            .run(event_rx, error_rx, CancellationToken::new())
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_finished(), "loop must outlive the error channel");

    event_tx
        .send(ChangeEvent::created(&path))
        .await
        .expect("send event");
    drop(event_tx);

    let stats = handle.await.expect("join");
    assert_eq!(stats.uploaded, 1);
    assert_eq!(store.calls()[0].key, "late.txt");
}

#[tokio::test]
async fn cancellation_stops_the_loop_while_events_remain_open() {
    let store = Arc::new(RecordingStore::default());
    let (_event_tx, event_rx) = mpsc::channel::<ChangeEvent>(4);
    let (_error_tx, error_rx) = mpsc::channel::<SourceError>(4);
    let shutdown = CancellationToken::new();

    let pipeline = pipeline(store);
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { pipeline.run(event_rx, error_rx, token).await });

    shutdown.cancel();
    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pipeline stops after cancel")
        .expect("join");
    assert_eq!(stats, SyncStats::default());
}

#[tokio::test]
async fn cancellation_abandons_in_flight_upload() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "big.iso", b"pretend this is large");
    let store = Arc::new(HangingStore::default());
    let (event_tx, event_rx) = mpsc::channel(4);
    let (_error_tx, error_rx) = mpsc::channel::<SourceError>(4);
    let shutdown = CancellationToken::new();

    let pipeline = Pipeline::new(store.clone(), SyncSettings::new(BUCKET));
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { pipeline.run(event_rx, error_rx, token).await });

    event_tx
        .send(ChangeEvent::modified(&path))
        .await
        .expect("send event");
    store.started.notified().await;
    shutdown.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pipeline stops after cancel")
        .expect("join");
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.uploaded, 0);
}

#[tokio::test]
async fn upload_file_reports_size_on_success() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_file(&dir, "sized.dat", &[7u8; 1234]);
    let store = RecordingStore::default();

    let outcome = s3drop_sync::upload_file(&store, &SyncSettings::new(BUCKET), &path).await;

    assert_eq!(
        outcome,
        Outcome::Success {
            key: ObjectKey::from_path(Path::new("sized.dat")).expect("key"),
            bytes: 1234,
        }
    );
}
