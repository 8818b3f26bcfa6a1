//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's
//! derive macros. It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// CISIN -- cluster infrastructure SBOM inventory.
///
/// Use `cisin <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "cisin", version, about, long_about = None)]
pub struct Cli {
    /// Path to the cisin.toml configuration file.
    #[arg(short, long, default_value = cisin_core::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyse traces emitted by the CISIN server.
    Analyze(AnalyzeArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- analyze ----

/// Analyse traces.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub command: AnalyzeCommands,
}

#[derive(Subcommand, Debug)]
pub enum AnalyzeCommands {
    /// List recent trace ids for the configured service.
    List,

    /// Scan the SBOMs referenced by one trace for vulnerabilities.
    Sbom(SbomArgs),
}

/// Scan SBOMs referenced by a trace.
#[derive(Args, Debug)]
pub struct SbomArgs {
    /// Trace id as reported by `analyze list`.
    pub trace_id: String,
}

// ---- config ----

/// Manage configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate the configuration file and print the result.
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_analyze_list() {
        let cli = Cli::parse_from(["cisin", "analyze", "list"]);
        assert!(matches!(
            cli.command,
            Commands::Analyze(AnalyzeArgs {
                command: AnalyzeCommands::List
            })
        ));
    }

    #[test]
    fn parses_analyze_sbom_with_trace_id() {
        let cli = Cli::parse_from(["cisin", "analyze", "sbom", "deadbeef"]);
        match cli.command {
            Commands::Analyze(AnalyzeArgs {
                command: AnalyzeCommands::Sbom(args),
            }) => assert_eq!(args.trace_id, "deadbeef"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_config_validate_with_json_output() {
        let cli = Cli::parse_from(["cisin", "--output", "json", "config", "validate"]);
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs {
                command: ConfigCommands::Validate
            })
        ));
    }
}
