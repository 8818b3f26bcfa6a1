//! Flow pipeline module initialization.
//!
//! Converts `CisinConfig.agent` into a `FlowAgentConfig`, builds the
//! `FlowPipeline` against the provided flow source, bus, and cluster
//! lookup, and wraps it in a `ModuleHandle`.

use std::sync::Arc;

use anyhow::Result;

use cisin_core::bus::MessageBus;
use cisin_core::cluster::ClusterLookup;
use cisin_core::config::CisinConfig;
use cisin_core::types::Connection;
use cisin_flow_agent::{FlowAgentConfig, FlowPipelineBuilder, FlowSource};

use super::ModuleHandle;

/// Initialize the flow pipeline module.
///
/// `node_name` must already be resolved (configuration or hostname).
pub fn init(
    config: &CisinConfig,
    node_name: &str,
    source: Arc<dyn FlowSource>,
    bus: Arc<dyn MessageBus<Connection>>,
    lookup: Arc<dyn ClusterLookup>,
) -> Result<ModuleHandle> {
    tracing::info!("initializing flow pipeline");

    let mut agent_config = FlowAgentConfig::from_core(&config.agent);
    agent_config.node_name = node_name.to_owned();

    let pipeline = FlowPipelineBuilder::new()
        .config(agent_config)
        .source(source)
        .bus(bus)
        .cluster_lookup(lookup)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build flow pipeline: {}", e))?;

    Ok(ModuleHandle::new("flow-pipeline", true, Box::new(pipeline)))
}
