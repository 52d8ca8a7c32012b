//! CLI definitions for CronSentry.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CronSentry CLI.
#[derive(Parser)]
#[command(name = "cronsentry")]
#[command(about = "Dead-man's-switch monitor for cron jobs")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config/default.toml",
        env = "CRONSENTRY_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub(crate) enum Commands {
    /// Run the API server, detector and dispatcher in the foreground (default)
    Run {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,

        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run {
            host: None,
            port: None,
        }
    }
}
