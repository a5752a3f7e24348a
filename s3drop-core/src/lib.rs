//! s3drop core library — domain types, configuration, errors.
//!
//! - [`types`] — change events, object keys, outcomes
//! - [`config`] — [`Config`] model, YAML load / save, overrides
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, OverflowPolicy, Overrides, QueueSettings, RetrySettings};
pub use error::ConfigError;
pub use types::{ChangeEvent, ChangeKind, ObjectKey, Outcome, SourceError};
