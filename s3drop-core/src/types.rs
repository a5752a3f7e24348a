//! Domain types shared by the change source and the sync pipeline.
//!
//! All path fields use `PathBuf`; object keys are a newtype so a raw path
//! string can never be handed to the store by accident.

use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

/// What happened to a watched entry, reduced to the cases the pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    /// Renames, removals, attribute-only changes, access events, directories.
    Other,
}

impl ChangeKind {
    /// `true` for the kinds that trigger an upload.
    pub fn is_actionable(self) -> bool {
        matches!(self, ChangeKind::Created | ChangeKind::Modified)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// One filesystem notification for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Created)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }
}

/// A non-fatal error reported by the change source, not tied to one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub message: String,
    /// Paths the error refers to, if the watcher reported any.
    pub paths: Vec<PathBuf>,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            paths: Vec::new(),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.paths.is_empty() {
            let paths: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
            write!(f, " (paths: {})", paths.join(", "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Object keys
// ---------------------------------------------------------------------------

/// Remote object key: the base name of the uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Derive the key from the final segment of `path`.
    ///
    /// Returns `None` when the path has no file name (`/`, `..`) or the name
    /// is not valid UTF-8.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .map(|name| Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of handling one change event. Logged and counted, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The object was stored.
    Success { key: ObjectKey, bytes: u64 },
    /// The task was abandoned; `reason` is the rendered error.
    Failure { path: PathBuf, reason: String },
    /// The event was not actionable.
    Skipped,
    /// Shutdown arrived while the upload was in flight.
    Abandoned { path: PathBuf },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}
