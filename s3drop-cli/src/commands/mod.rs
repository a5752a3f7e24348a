pub mod config;
pub mod upload;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use s3drop_core::{config as core_config, Config, Overrides};

/// Config file selection and per-invocation overrides shared by all commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file to read instead of `~/.s3drop/config.yaml`.
    #[arg(long, value_name = "PATH", env = "S3DROP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory to watch (non-recursive).
    #[arg(long, value_name = "PATH", env = "S3DROP_WATCH_DIR")]
    pub dir: Option<PathBuf>,

    /// Destination bucket.
    #[arg(long, env = "S3DROP_BUCKET")]
    pub bucket: Option<String>,

    /// AWS region of the bucket.
    #[arg(long, env = "S3DROP_REGION")]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint, e.g. `http://localhost:9000`.
    #[arg(long, value_name = "URL", env = "S3DROP_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Check that the bucket is reachable before starting.
    #[arg(long)]
    pub verify_bucket: bool,
}

impl ConfigArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            watch_dir: self.dir.clone(),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            verify_bucket: self.verify_bucket,
        }
    }

    /// Load the config file (or defaults) and layer the overrides on top.
    pub fn resolve(&self) -> Result<Config> {
        let base = core_config::load(self.config.as_deref()).context("failed to load config")?;
        Ok(base.apply(self.overrides()))
    }
}
