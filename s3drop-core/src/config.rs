//! Process configuration and its YAML persistence.
//!
//! # Storage layout
//!
//! ```text
//! ~/.s3drop/
//!   config.yaml   (mode 0600, written by `s3drop config init`)
//! ```
//!
//! # API pattern
//!
//! Functions that touch the default location come in two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! The resolved [`Config`] is built once at startup and passed by value into
//! the pipeline and runtime. Nothing reads configuration from globals.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

pub const CONFIG_DIR: &str = ".s3drop";
pub const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_WATCH_DIR: &str = "./watchfolder";
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// 1. Model
// ---------------------------------------------------------------------------

/// Fully resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory watched for new and modified files (non-recursive).
    pub watch_dir: PathBuf,
    /// Destination bucket. Required.
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    /// Issue a `HeadBucket` at startup and abort if it fails.
    pub verify_bucket: bool,
    pub queue: QueueSettings,
    pub retry: RetrySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from(DEFAULT_WATCH_DIR),
            bucket: String::new(),
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            force_path_style: false,
            verify_bucket: false,
            queue: QueueSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

/// What the change source does when the event queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// The producer waits until the pipeline frees a slot.
    #[default]
    Block,
    /// The incoming event is discarded and a warning is logged.
    DropNewest,
}

/// Bounded event queue between the change source and the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::Block,
        }
    }
}

/// Retry of transient store failures. `max_attempts = 1` disables retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Values supplied on the command line or via environment variables.
///
/// `None` / `false` leaves the file (or default) value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub watch_dir: Option<PathBuf>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub verify_bucket: bool,
}

impl Config {
    /// Layer `overrides` on top of this config.
    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(dir) = overrides.watch_dir {
            self.watch_dir = dir;
        }
        if let Some(bucket) = overrides.bucket {
            self.bucket = bucket;
        }
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(endpoint) = overrides.endpoint_url {
            self.endpoint_url = Some(endpoint);
        }
        if overrides.verify_bucket {
            self.verify_bucket = true;
        }
        self
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "bucket is not set (use --bucket, S3DROP_BUCKET, or the config file)".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("region must not be empty".to_string()));
        }
        if self.watch_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "watch_dir must not be empty".to_string(),
            ));
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue.capacity must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 2. Paths
// ---------------------------------------------------------------------------

/// `<home>/.s3drop/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load a config file that must exist.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load `<home>/.s3drop/config.yaml`, falling back to defaults when it does not exist.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    load_from(&path)
}

/// Load from `explicit` if given, otherwise from the default location.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => load_from(path),
        None => load_at(&home()?),
    }
}

// ---------------------------------------------------------------------------
// 4. Save
// ---------------------------------------------------------------------------

/// Write `config` to `path` (mode `0600`), creating parent directories.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn save_to(path: &Path, config: &Config, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml).map_err(|e| io_err(path, e))?;
    set_file_permissions(path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 5. Internal helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
