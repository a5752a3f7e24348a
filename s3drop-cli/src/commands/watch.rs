//! `s3drop watch` — run the change source and sync pipeline in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use super::ConfigArgs;

/// Arguments for `s3drop watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.resolve()?;
        let dir = config.watch_dir.display().to_string();
        s3drop_daemon::start_blocking(config)
            .with_context(|| format!("watcher for '{dir}' exited with error"))?;
        Ok(())
    }
}
