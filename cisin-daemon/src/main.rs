//! cisin-daemon entry point.
//!
//! Loads configuration, initializes logging and the metrics recorder,
//! and runs exactly one role: `agent`, `server`, or `metrics`. A
//! SIGINT cancels the root context; every module watches it and the
//! daemon exits 0 after an orderly stop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use cisin_core::cluster::{ClusterLookup, StaticClusterLookup};
use cisin_core::config::{CisinConfig, DEFAULT_CONFIG_PATH};
use cisin_core::types::{Connection, Sbom};
use cisin_correlation::{LogSink, TraceSink};
use cisin_flow_agent::ChannelFlowSource;
use cisin_sbom::{ContainerDaemon, StaticContainerDaemon};

use cisin_daemon::cli::{DaemonCli, Role};
use cisin_daemon::health::aggregate_status;
use cisin_daemon::modules::{self, ModuleRegistry};
use cisin_daemon::{logging, metrics_server};

/// Interval between aggregated health log lines.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = load_config(&cli.config).await?;

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(role = cli.role.name(), "cisin-daemon starting");

    match cli.role {
        Role::Agent => run_agent(config).await,
        Role::Server => run_server(config).await,
        Role::Metrics => run_metrics(config).await,
    }
}

/// Load the configuration file, falling back to built-in defaults
/// plus environment overrides when the default path does not exist.
async fn load_config(path: &Path) -> Result<CisinConfig> {
    if path.exists() {
        return CisinConfig::load(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e));
    }

    if path == Path::new(DEFAULT_CONFIG_PATH) {
        return Ok(CisinConfig::from_env());
    }

    Err(anyhow::anyhow!(
        "config file not found: {}",
        path.display()
    ))
}

async fn run_agent(config: CisinConfig) -> Result<()> {
    if config.telemetry.enabled {
        metrics_server::install_metrics_recorder(&config.telemetry)?;
    }

    let node_name = modules::resolve_node_name(&config.agent.node_name)?;

    let connection_bus = modules::build_bus::<Connection>(&config.bus)?;
    let sbom_bus = modules::build_bus::<Sbom>(&config.bus)?;

    // The flow transport, Kubernetes client, and container daemon
    // client are deployment-provided implementations behind the
    // FlowSource / ClusterLookup / ContainerDaemon traits.
    let (source, _flow_injector) = ChannelFlowSource::new();
    let lookup: Arc<dyn ClusterLookup> = Arc::new(StaticClusterLookup::new());
    let container_daemon: Arc<dyn ContainerDaemon> = Arc::new(StaticContainerDaemon::new());

    let mut registry = ModuleRegistry::new();

    registry.register(modules::flow_agent::init(
        &config,
        &node_name,
        Arc::new(source),
        connection_bus,
        lookup,
    )?);

    if let Some(handle) =
        modules::sbom::init(&config, &node_name, sbom_bus, container_daemon, None)?
    {
        registry.register(handle);
    }

    run_until_interrupt(registry).await
}

async fn run_server(config: CisinConfig) -> Result<()> {
    if config.telemetry.enabled {
        metrics_server::install_metrics_recorder(&config.telemetry)?;
    }

    let connection_bus = modules::build_bus::<Connection>(&config.bus)?;
    let sbom_bus = modules::build_bus::<Sbom>(&config.bus)?;
    let lookup: Arc<dyn ClusterLookup> = Arc::new(StaticClusterLookup::new());
    let sink: Arc<dyn TraceSink> = Arc::new(LogSink::new(config.server.service_name.clone()));

    let mut registry = ModuleRegistry::new();
    registry.register(modules::correlation::init(
        &config,
        connection_bus,
        sbom_bus,
        lookup,
        sink,
    )?);

    run_until_interrupt(registry).await
}

async fn run_metrics(config: CisinConfig) -> Result<()> {
    // The CVE gauges are served by the service's own registry; the
    // shared recorder is not installed for this role.
    let mut registry = ModuleRegistry::new();
    registry.register(modules::cve_metrics::init(&config, None)?);

    run_until_interrupt(registry).await
}

/// Start all modules, wait for SIGINT, stop in reverse order.
async fn run_until_interrupt(mut registry: ModuleRegistry) -> Result<()> {
    registry.start_all().await?;

    tracing::info!(modules = registry.enabled_count(), "cisin-daemon running");

    let registry = Arc::new(tokio::sync::Mutex::new(registry));

    let health_registry = Arc::clone(&registry);
    let health_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEALTH_LOG_INTERVAL);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let statuses = health_registry.lock().await.health_statuses().await;
            let status = aggregate_status(&statuses);

            if status.is_healthy() {
                tracing::debug!(status = %status, "daemon health");
            } else {
                tracing::warn!(status = %status, "daemon health");
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    health_task.abort();

    if let Err(e) = registry.lock().await.stop_all().await {
        tracing::error!(error = %e, "errors during shutdown");
    }

    tracing::info!("cisin-daemon shut down");
    Ok(())
}
