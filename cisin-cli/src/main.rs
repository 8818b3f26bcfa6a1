//! cisin-cli -- Command-line interface for CISIN
//!
//! Provides one-shot trace analysis (`analyze list`, `analyze sbom`)
//! and configuration validation against the same cisin.toml the
//! daemon uses.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod error;
mod output;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Minimal subscriber for interactive use: compact format, logs to
    // stderr so stdout stays parseable.
    let log_level = cli.log_level.as_deref().unwrap_or("warn");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let writer = OutputWriter::new(cli.output);

    match run(cli, &writer).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli, writer: &OutputWriter) -> Result<(), CliError> {
    match cli.command {
        Commands::Analyze(args) => {
            let config = commands::load_config(&cli.config).await?;
            commands::analyze::run(args.command, &config, writer).await
        }
        Commands::Config(args) => commands::config::run(args.command, &cli.config, writer).await,
    }
}
