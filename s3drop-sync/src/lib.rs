//! # s3drop-sync
//!
//! The event-to-upload pipeline and the remote store it drives.
//!
//! [`Pipeline::run`] consumes change events one at a time and calls
//! [`upload_file`] for each created or modified file. [`S3Store`] is the
//! production [`ObjectStore`].

pub mod error;
pub mod pipeline;
pub mod retry;
pub mod s3;
pub mod store;
pub mod upload;

pub use error::{StoreError, SyncError};
pub use pipeline::{Pipeline, SyncStats};
pub use retry::RetryPolicy;
pub use s3::S3Store;
pub use store::{ObjectStore, UploadBody};
pub use upload::{upload_file, SyncSettings};
