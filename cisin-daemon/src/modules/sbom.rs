//! SBOM scheduler module initialization.
//!
//! Selects the scheduler variant by `agent.node_type`: the k8s
//! variant walks the local container daemon's running images, the
//! host variant targets the configured filesystem root. Both publish
//! `Sbom` messages on the configured subject.

use std::sync::Arc;

use anyhow::Result;

use cisin_core::bus::MessageBus;
use cisin_core::config::CisinConfig;
use cisin_core::types::Sbom;
use cisin_sbom::{
    CommandSbomSynth, ContainerDaemon, HostSbomGenerator, HostSbomScheduler, ImageSbomGenerator,
    K8sSbomScheduler, MemoryRegistry, Registry, SbomSchedulerConfig, SbomSynth,
};

use super::ModuleHandle;

/// Initialize the SBOM scheduler module.
///
/// Returns `None` if SBOM generation is disabled in configuration.
/// The OCI registry client is a trait boundary; in-tree deployments
/// use the in-memory registry unless one is provided.
pub fn init(
    config: &CisinConfig,
    node_name: &str,
    bus: Arc<dyn MessageBus<Sbom>>,
    container_daemon: Arc<dyn ContainerDaemon>,
    registry: Option<Arc<dyn Registry>>,
) -> Result<Option<ModuleHandle>> {
    if !config.sbom.generate {
        tracing::info!("SBOM generation disabled in configuration");
        return Ok(None);
    }

    tracing::info!(node_type = %config.agent.node_type, "initializing SBOM scheduler");

    let registry =
        registry.unwrap_or_else(|| Arc::new(MemoryRegistry::new(config.sbom.registry_url.clone())));

    let synth: Arc<dyn SbomSynth> = Arc::new(CommandSbomSynth::new(
        config.sbom.synth_command.clone(),
        CommandSbomSynth::output_format_for_media_type(&config.sbom.media_type),
    ));

    let scheduler_config = SbomSchedulerConfig {
        subject: config.sbom.subject.clone(),
        generation_interval: config.sbom.generation_interval(),
        node_name: node_name.to_owned(),
        fs_root: config.sbom.fs_root.clone(),
    };

    let handle = match config.agent.node_type.as_str() {
        "k8s" => {
            let generator = Arc::new(ImageSbomGenerator::new(
                Arc::clone(&container_daemon),
                registry,
                synth,
                config.sbom.media_type.clone(),
            ));

            let scheduler =
                K8sSbomScheduler::new(scheduler_config, bus, container_daemon, generator);

            ModuleHandle::new("sbom-scheduler", true, Box::new(scheduler))
        }
        "host" => {
            let generator = Arc::new(HostSbomGenerator::new(
                node_name,
                registry,
                synth,
                config.sbom.media_type.clone(),
            ));

            let scheduler = HostSbomScheduler::new(scheduler_config, bus, generator);

            ModuleHandle::new("sbom-scheduler", true, Box::new(scheduler))
        }
        other => {
            return Err(anyhow::anyhow!("node type '{}' is unknown", other));
        }
    };

    Ok(Some(handle))
}
