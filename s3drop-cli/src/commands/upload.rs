//! `s3drop upload` — push one file without starting the watcher.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use s3drop_core::Outcome;

use super::ConfigArgs;

/// Arguments for `s3drop upload`.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// File to upload; the object key is its base name.
    pub file: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl UploadArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.resolve()?;
        let bucket = config.bucket.clone();
        let outcome = s3drop_daemon::upload_blocking(config, &self.file)
            .with_context(|| format!("failed to upload {}", self.file.display()))?;

        match outcome {
            Outcome::Success { key, bytes } => {
                println!("uploaded {key} ({bytes} bytes) to s3://{bucket}/{key}");
                Ok(())
            }
            Outcome::Failure { path, reason } => {
                bail!("upload of {} failed: {reason}", path.display())
            }
            Outcome::Skipped | Outcome::Abandoned { .. } => {
                bail!("upload of {} did not complete", self.file.display())
            }
        }
    }
}
