//! Prometheus metrics recorder for the agent and server roles.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`
//! to expose operational counters and gauges. The per-workload CVE
//! gauges of the metrics role are NOT served here; they live in the
//! metrics service's own registry because their series need deletion.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

use cisin_core::config::TelemetryConfig;

/// Install the global metrics recorder and start the HTTP listener.
///
/// This function should be called once per process. After calling it,
/// all `metrics::counter!()` / `metrics::gauge!()` macros record to
/// the Prometheus format.
///
/// # Errors
///
/// - Socket binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &TelemetryConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid telemetry listen address: {}", e))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "telemetry endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    tracing::info!(listen_addr = %addr, "installing Prometheus metrics recorder");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    // Register metric descriptions
    cisin_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");

    Ok(())
}
