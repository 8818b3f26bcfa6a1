//! Correlation engine module initialization.
//!
//! Builds the `CorrelationEngine` against the provided buses, cluster
//! lookup, and trace sink, and wraps it in a `ModuleHandle`.

use std::sync::Arc;

use anyhow::Result;

use cisin_core::bus::MessageBus;
use cisin_core::cluster::ClusterLookup;
use cisin_core::config::CisinConfig;
use cisin_core::types::{Connection, Sbom};
use cisin_correlation::{CorrelationConfig, CorrelationEngineBuilder, TraceSink};

use super::ModuleHandle;

/// Initialize the correlation engine module.
pub fn init(
    config: &CisinConfig,
    connection_bus: Arc<dyn MessageBus<Connection>>,
    sbom_bus: Arc<dyn MessageBus<Sbom>>,
    lookup: Arc<dyn ClusterLookup>,
    sink: Arc<dyn TraceSink>,
) -> Result<ModuleHandle> {
    tracing::info!("initializing correlation engine");

    let engine = CorrelationEngineBuilder::new()
        .config(CorrelationConfig::from_core(&config.server))
        .connection_bus(connection_bus)
        .sbom_bus(sbom_bus)
        .cluster_lookup(lookup)
        .trace_sink(sink)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build correlation engine: {}", e))?;

    Ok(ModuleHandle::new(
        "correlation-engine",
        true,
        Box::new(engine),
    ))
}
