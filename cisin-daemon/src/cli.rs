//! CLI argument definitions for cisin-daemon.
//!
//! Uses `clap` v4 derive macros. The daemon runs exactly one role per
//! process: `agent` on every node, `server` once per cluster, and
//! `metrics` wherever the tracing backend is reachable.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CISIN daemon.
///
/// Observes service-mesh flows, correlates them into a workload
/// call-graph, enriches workloads with SBOM references, and exposes
/// per-workload CVE metrics.
#[derive(Parser, Debug)]
#[command(name = "cisin-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the cisin.toml configuration file.
    ///
    /// If the default path does not exist, built-in defaults plus
    /// `CISIN_*` environment variables are used.
    #[arg(short, long, default_value = cisin_core::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Role to run.
    #[command(subcommand)]
    pub role: Role,
}

/// Daemon role.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Run the per-node agent (flow pipeline + SBOM scheduler).
    Agent,
    /// Run the correlation server.
    Server,
    /// Run the vulnerability metrics service.
    Metrics,
}

impl Role {
    /// Role name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Server => "server",
            Self::Metrics => "metrics",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_agent_role() {
        let cli = DaemonCli::parse_from(["cisin-daemon", "agent"]);
        assert_eq!(cli.role, Role::Agent);
        assert!(!cli.validate);
    }

    #[test]
    fn parses_overrides() {
        let cli = DaemonCli::parse_from([
            "cisin-daemon",
            "--config",
            "/tmp/cisin.toml",
            "--log-level",
            "debug",
            "--validate",
            "server",
        ]);

        assert_eq!(cli.role, Role::Server);
        assert_eq!(cli.config, PathBuf::from("/tmp/cisin.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.validate);
    }

    #[test]
    fn role_names() {
        assert_eq!(Role::Agent.name(), "agent");
        assert_eq!(Role::Server.name(), "server");
        assert_eq!(Role::Metrics.name(), "metrics");
    }
}
