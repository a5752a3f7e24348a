//! `s3drop config` — print the resolved configuration or write a new file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use s3drop_core::{config as core_config, Config, Overrides};

use super::ConfigArgs;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the configuration `watch` would run with, as YAML.
    Show(ConfigArgs),
    /// Write a config file (default `~/.s3drop/config.yaml`).
    Init(InitArgs),
}

/// Arguments for `s3drop config init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Destination bucket.
    #[arg(long)]
    pub bucket: String,

    /// Directory to watch.
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// AWS region of the bucket.
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint.
    #[arg(long, value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show(args) => {
            let config = args.resolve()?;
            if let Err(err) = config.validate() {
                eprintln!("warning: {err}");
            }
            print!(
                "{}",
                serde_yaml::to_string(&config).context("failed to render config YAML")?
            );
        }
        ConfigCommand::Init(args) => {
            let path = match args.config {
                Some(path) => path,
                None => core_config::config_path().context("could not determine config path")?,
            };
            let config = Config::default().apply(Overrides {
                watch_dir: args.dir,
                bucket: Some(args.bucket),
                region: args.region,
                endpoint_url: args.endpoint_url,
                verify_bucket: false,
            });
            config.validate().context("refusing to write invalid config")?;
            core_config::save_to(&path, &config, args.force)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}
