//! CVE metrics service module initialization.
//!
//! Wires the trace API client, registry client, and vulnerability
//! scanner into a `CveMetricsService` and wraps it in a
//! `ModuleHandle`.

use std::sync::Arc;

use anyhow::Result;

use cisin_core::config::CisinConfig;
use cisin_cve_metrics::{
    CommandVulnScanner, CveMetricsConfig, CveMetricsService, HttpTraceApi, TraceApi, VulnScanner,
};
use cisin_sbom::{MemoryRegistry, Registry};

use super::ModuleHandle;

/// Build the metrics service from configuration.
///
/// Exposed separately from [`init`] so the CLI can reuse the service
/// for one-shot trace analysis without starting the pipeline.
pub fn build_service(
    config: &CisinConfig,
    registry: Option<Arc<dyn Registry>>,
) -> Result<CveMetricsService> {
    let mut metrics_config = CveMetricsConfig::from_core(&config.metrics);
    metrics_config.media_type = config.sbom.media_type.clone();

    let trace_api: Arc<dyn TraceApi> = Arc::new(HttpTraceApi::new(
        metrics_config.trace_api_url.clone(),
        metrics_config.service_name.clone(),
        metrics_config.history_limit,
    ));

    let registry =
        registry.unwrap_or_else(|| Arc::new(MemoryRegistry::new(config.sbom.registry_url.clone())));

    let scanner: Arc<dyn VulnScanner> = Arc::new(CommandVulnScanner::new(
        metrics_config.scanner_command.clone(),
    ));

    CveMetricsService::new(metrics_config, trace_api, registry, scanner)
        .map_err(|e| anyhow::anyhow!("failed to build cve metrics service: {}", e))
}

/// Initialize the CVE metrics module.
pub fn init(config: &CisinConfig, registry: Option<Arc<dyn Registry>>) -> Result<ModuleHandle> {
    tracing::info!("initializing cve metrics service");

    let service = build_service(config, registry)?;

    Ok(ModuleHandle::new("cve-metrics", true, Box::new(service)))
}
