//! s3drop — mirror files dropped into a directory to an S3 bucket.
//!
//! # Usage
//!
//! ```text
//! s3drop watch [--dir <path>] [--bucket <name>] [--region <r>] [--endpoint-url <url>] [--verify-bucket]
//! s3drop upload <file> [overrides]
//! s3drop config show [overrides]
//! s3drop config init --bucket <name> [--dir <path>] [--force]
//! ```
//!
//! Every command accepts `--config <path>`; without it `~/.s3drop/config.yaml`
//! is used when present.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigCommand, upload::UploadArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "s3drop",
    version,
    about = "Watch a directory and upload new or modified files to S3",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the configured directory and upload every created or modified file.
    Watch(WatchArgs),

    /// Upload one file immediately, using the same key rules as `watch`.
    Upload(UploadArgs),

    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Watch(args) => args.run(),
        Commands::Upload(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
    }
}
