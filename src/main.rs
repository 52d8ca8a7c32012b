//! CronSentry - dead-man's-switch monitoring for scheduled jobs.
//!
//! Main entry point for the CronSentry service.

mod cli;
mod server;
mod signal;

use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use server::{check_config, init_tracing, load_config, run_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or_default() {
        Commands::CheckConfig => check_config(&cli.config),
        Commands::Run { host, port } => {
            let (mut config, loaded) = load_config(&cli.config)?;
            init_tracing(&config.logging)?;
            if !loaded {
                info!(
                    "No configuration at {}, using defaults",
                    cli.config.display()
                );
            }

            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            run_server(config).await
        }
    }
}
