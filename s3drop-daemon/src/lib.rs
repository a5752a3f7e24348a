//! Watcher runtime: `notify` change source + sync pipeline + signal handling.

mod error;
mod runtime;
pub mod source;

pub use error::DaemonError;
pub use runtime::{resolve_watch_dir, run, start_blocking, upload_blocking};
pub use source::{classify, translate, ChangeSource};
