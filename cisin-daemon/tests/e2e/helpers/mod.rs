//! Shared e2e test harness.

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use cisin_core::bus::MemoryBus;
use cisin_core::cluster::StaticClusterLookup;
use cisin_core::config::{AgentConfig, ServerConfig};
use cisin_core::pipeline::Pipeline;
use cisin_correlation::{
    CollectingSink, CorrelationConfig, CorrelationEngine, CorrelationEngineBuilder, TraceEmitter,
};
use cisin_flow_agent::{
    ChannelFlowSource, FlowAgentConfig, FlowInjector, FlowPipeline, FlowPipelineBuilder,
};

/// The cluster and node identity every e2e flow uses.
pub const CLUSTER_NAME: &str = "cA";
/// Node name of the agent under test.
pub const NODE_NAME: &str = "nA";

/// A fully wired agent + server pair sharing one in-process bus.
pub struct TestCluster {
    pub bus: Arc<MemoryBus>,
    pub injector: FlowInjector,
    pub pipeline: FlowPipeline,
    pub engine: CorrelationEngine,
    pub sink: CollectingSink,
    pub lookup: StaticClusterLookup,
}

impl TestCluster {
    /// Build the cluster with default agent modules disabled.
    ///
    /// Most scenarios classify endpoints purely from flow metadata;
    /// scenarios that need module output enable them explicitly via
    /// [`TestCluster::with_modules`].
    pub fn new() -> Self {
        Self::build(Vec::new())
    }

    /// Build the cluster with the given agent modules on both the
    /// source and destination side.
    pub fn with_modules(modules: Vec<String>) -> Self {
        Self::build(modules)
    }

    fn build(modules: Vec<String>) -> Self {
        let bus = Arc::new(MemoryBus::new());
        let lookup = StaticClusterLookup::new();
        let sink = CollectingSink::new();

        let (source, injector) = ChannelFlowSource::new();

        let agent_config = FlowAgentConfig {
            cluster_name: CLUSTER_NAME.to_owned(),
            node_name: NODE_NAME.to_owned(),
            src_modules: modules.clone(),
            dest_modules: modules,
            ..FlowAgentConfig::from_core(&AgentConfig::default())
        };

        let pipeline = FlowPipelineBuilder::new()
            .config(agent_config)
            .source(Arc::new(source))
            .bus(bus.clone())
            .cluster_lookup(Arc::new(lookup.clone()))
            .build()
            .expect("build flow pipeline");

        let server_config = CorrelationConfig {
            wp_size: 2,
            // trace emission is triggered manually via emit_traces()
            trace_interval: Duration::from_secs(3600),
            ..CorrelationConfig::from_core(&ServerConfig::default())
        };

        let engine = CorrelationEngineBuilder::new()
            .config(server_config)
            .connection_bus(bus.clone())
            .sbom_bus(bus.clone())
            .cluster_lookup(Arc::new(lookup.clone()))
            .trace_sink(Arc::new(sink.clone()))
            .build()
            .expect("build correlation engine");

        Self {
            bus,
            injector,
            pipeline,
            engine,
            sink,
            lookup,
        }
    }

    /// Start both sides.
    pub async fn start(&mut self) {
        self.engine.start().await.expect("start engine");
        self.pipeline.start().await.expect("start pipeline");
    }

    /// Stop both sides.
    pub async fn stop(&mut self) {
        self.pipeline.stop().await.expect("stop pipeline");
        self.engine.stop().await.expect("stop engine");
    }

    /// Give the async pipeline time to drain.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    /// Run one trace emission cycle against the engine's graph.
    pub fn emit_traces(&self) -> usize {
        let emitter = TraceEmitter::new(Arc::new(self.sink.clone()), false);
        emitter.build_traces(&self.engine.graph())
    }
}
