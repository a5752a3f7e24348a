use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use s3drop_core::{Config, Outcome};
use s3drop_sync::{upload_file, ObjectStore, Pipeline, S3Store, SyncSettings, SyncStats};

use crate::error::{io_err, DaemonError};
use crate::source::ChangeSource;

/// Validate `config`, connect to S3, and watch until SIGINT/SIGTERM.
///
/// Blocks the current thread. Setup failures are returned before any event
/// is consumed.
pub fn start_blocking(config: Config) -> Result<SyncStats, DaemonError> {
    init_tracing();
    let dir = prepare(&config)?;

    let runtime = build_runtime()?;
    runtime.block_on(async move {
        let store = S3Store::connect(&config).await;
        if config.verify_bucket {
            verify_bucket(&store, &config.bucket).await?;
        }

        let shutdown = CancellationToken::new();
        spawn_signal_listener(shutdown.clone());
        watch(config, &dir, Arc::new(store), shutdown).await
    })
}

/// Upload a single file once, outside the watch loop.
pub fn upload_blocking(config: Config, path: &Path) -> Result<Outcome, DaemonError> {
    init_tracing();
    config.validate()?;

    let runtime = build_runtime()?;
    runtime.block_on(async move {
        let store = S3Store::connect(&config).await;
        let settings = SyncSettings::from_config(&config);
        Ok(upload_file(&store, &settings, path).await)
    })
}

/// Watch `config.watch_dir` and feed the sync pipeline until `shutdown` is
/// cancelled or the change source closes.
pub async fn run(
    config: Config,
    store: Arc<dyn ObjectStore>,
    shutdown: CancellationToken,
) -> Result<SyncStats, DaemonError> {
    let dir = prepare(&config)?;
    watch(config, &dir, store, shutdown).await
}

/// Validate `config` and resolve its watch directory.
fn prepare(config: &Config) -> Result<PathBuf, DaemonError> {
    config.validate()?;
    resolve_watch_dir(&config.watch_dir)
}

async fn watch(
    config: Config,
    dir: &Path,
    store: Arc<dyn ObjectStore>,
    shutdown: CancellationToken,
) -> Result<SyncStats, DaemonError> {
    let (source, events, errors) = ChangeSource::watch(dir, config.queue)?;
    tracing::info!(
        dir = %dir.display(),
        bucket = %config.bucket,
        region = %config.region,
        "watching directory",
    );
    tracing::info!("press Ctrl+C to stop");

    let pipeline = Pipeline::new(store, SyncSettings::from_config(&config));
    let stats = pipeline.run(events, errors, shutdown).await;

    let dropped = source.dropped_events();
    drop(source);

    tracing::info!(
        uploaded = stats.uploaded,
        failed = stats.failed,
        ignored = stats.ignored,
        source_errors = stats.source_errors,
        abandoned = stats.abandoned,
        dropped,
        "sync pipeline stopped",
    );
    Ok(stats)
}

/// Check that `dir` exists and is a directory; return its canonical form.
pub fn resolve_watch_dir(dir: &Path) -> Result<PathBuf, DaemonError> {
    let metadata = match fs::metadata(dir) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(DaemonError::WatchDirMissing {
                path: dir.to_path_buf(),
            });
        }
        Err(err) => return Err(io_err(dir, err)),
    };
    if !metadata.is_dir() {
        return Err(DaemonError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }
    fs::canonicalize(dir).map_err(|e| io_err(dir, e))
}

async fn verify_bucket(store: &S3Store, bucket: &str) -> Result<(), DaemonError> {
    store
        .check_bucket(bucket)
        .await
        .map_err(|source| DaemonError::BucketCheck {
            bucket: bucket.to_string(),
            source,
        })?;
    tracing::info!(bucket, "bucket reachable");
    Ok(())
}

fn build_runtime() -> Result<tokio::runtime::Runtime, DaemonError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(error = %err, "cannot listen for SIGTERM; only Ctrl+C will stop");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
