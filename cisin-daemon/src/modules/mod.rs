//! Module registry and initialization.
//!
//! Each cisin crate's pipeline is wrapped as a [`ModuleHandle`] that
//! provides uniform lifecycle management via the [`DynPipeline`]
//! trait. The [`ModuleRegistry`] tracks all registered modules and
//! supports ordered start/stop operations.
//!
//! The per-role `init` functions live in the submodules:
//! flow agent + SBOM scheduler for `agent`, the correlation engine
//! for `server`, and the CVE metrics service for `metrics`.

pub mod correlation;
pub mod cve_metrics;
pub mod flow_agent;
pub mod sbom;

use std::sync::Arc;

use cisin_core::bus::{MemoryBus, MessageBus, NoopBus};
use cisin_core::config::BusConfig;
use cisin_core::pipeline::{DynPipeline, HealthStatus};
use cisin_core::wire::WireMessage;

use crate::health::ModuleHealth;

/// A handle to a registered module.
///
/// Wraps a `Box<dyn DynPipeline>` with metadata (name, enabled flag).
pub struct ModuleHandle {
    /// Module name for logging and health reporting.
    pub name: String,
    /// Whether this module is enabled in configuration.
    pub enabled: bool,
    /// The module's pipeline implementation (start/stop/health_check).
    pub pipeline: Box<dyn DynPipeline>,
}

impl ModuleHandle {
    /// Create a new module handle.
    pub fn new(name: impl Into<String>, enabled: bool, pipeline: Box<dyn DynPipeline>) -> Self {
        Self {
            name: name.into(),
            enabled,
            pipeline,
        }
    }

    /// Check the module's health status.
    ///
    /// Disabled modules always report `Healthy` (they are not expected to run).
    pub async fn health_check(&self) -> HealthStatus {
        if !self.enabled {
            return HealthStatus::Healthy;
        }
        self.pipeline.health_check().await
    }
}

/// Registry of all cisin modules in one daemon process.
///
/// Provides ordered start/stop and health check aggregation.
pub struct ModuleRegistry {
    /// Modules in registration order (producers before consumers).
    modules: Vec<ModuleHandle>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module.
    ///
    /// Modules should be registered in dependency order:
    /// producers first, consumers last.
    pub fn register(&mut self, handle: ModuleHandle) {
        self.modules.push(handle);
    }

    /// Start all enabled modules in registration order.
    ///
    /// Returns an error on the first module that fails to start.
    /// Already-started modules are NOT rolled back; the caller should
    /// invoke `stop_all` if partial startup is unacceptable.
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        for handle in &mut self.modules {
            if !handle.enabled {
                tracing::debug!(module = %handle.name, "skipping disabled module");
                continue;
            }

            tracing::info!(module = %handle.name, "starting module");
            handle
                .pipeline
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start module '{}': {}", handle.name, e))?;
            tracing::info!(module = %handle.name, "module started");
        }
        Ok(())
    }

    /// Stop all enabled modules in reverse registration order.
    ///
    /// Logs errors but continues stopping remaining modules.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        for handle in self.modules.iter_mut().rev() {
            if !handle.enabled {
                continue;
            }

            tracing::info!(module = %handle.name, "stopping module");
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(module = %handle.name, error = %e, "failed to stop module");
                errors.push(format!("{}: {}", handle.name, e));
            } else {
                tracing::info!(module = %handle.name, "module stopped");
            }
        }

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping modules: {}",
                errors.join("; ")
            ));
        }

        Ok(())
    }

    /// Get health status for all modules.
    pub async fn health_statuses(&self) -> Vec<ModuleHealth> {
        let mut statuses = Vec::new();
        for handle in &self.modules {
            statuses.push(ModuleHealth {
                name: handle.name.clone(),
                enabled: handle.enabled,
                status: handle.health_check().await,
            });
        }
        statuses
    }

    /// Number of registered modules.
    pub fn count(&self) -> usize {
        self.modules.len()
    }

    /// Number of enabled modules.
    pub fn enabled_count(&self) -> usize {
        self.modules.iter().filter(|m| m.enabled).count()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a typed bus handle from the bus configuration.
///
/// The broker-backed adapter (NATS) lives behind the `MessageBus`
/// trait and is provided by the deployment; in-tree kinds are
/// `memory` (in-process broker) and `noop`.
pub fn build_bus<M: WireMessage>(config: &BusConfig) -> anyhow::Result<Arc<dyn MessageBus<M>>> {
    match config.kind.as_str() {
        "memory" => Ok(Arc::new(MemoryBus::new())),
        "noop" => Ok(Arc::new(NoopBus::new())),
        other => Err(anyhow::anyhow!("unknown bus kind '{}'", other)),
    }
}

/// Resolve the node name: configuration wins, otherwise the kernel
/// hostname.
pub fn resolve_node_name(configured: &str) -> anyhow::Result<String> {
    if !configured.is_empty() {
        return Ok(configured.to_owned());
    }

    let hostname = std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|name| name.trim().to_owned())
        .or_else(|_| std::env::var("HOSTNAME"))
        .map_err(|_| anyhow::anyhow!("could not determine node name; set agent.node_name"))?;

    if hostname.is_empty() {
        return Err(anyhow::anyhow!(
            "could not determine node name; set agent.node_name"
        ));
    }

    Ok(hostname)
}
