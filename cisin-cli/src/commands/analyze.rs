//! `analyze` subcommand: list traces and scan their SBOMs.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;

use cisin_core::config::CisinConfig;
use cisin_cve_metrics::{
    CommandVulnScanner, CveMetricsConfig, CveMetricsService, HttpTraceApi, TraceApi, VulnScanner,
};
use cisin_sbom::{MemoryRegistry, Registry};

use crate::cli::{AnalyzeCommands, SbomArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Run an `analyze` subcommand.
pub async fn run(
    command: AnalyzeCommands,
    config: &CisinConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let service = build_service(config)?;

    match command {
        AnalyzeCommands::List => list(&service, writer).await,
        AnalyzeCommands::Sbom(args) => sbom(&service, &args, writer).await,
    }
}

/// Build the metrics service for one-shot analysis.
///
/// The registry client behind the trait boundary is deployment
/// provided; the in-tree in-memory registry only serves artifacts
/// pushed within this process.
fn build_service(config: &CisinConfig) -> Result<CveMetricsService, CliError> {
    let mut metrics_config = CveMetricsConfig::from_core(&config.metrics);
    metrics_config.media_type = config.sbom.media_type.clone();

    let trace_api: Arc<dyn TraceApi> = Arc::new(HttpTraceApi::new(
        metrics_config.trace_api_url.clone(),
        metrics_config.service_name.clone(),
        metrics_config.history_limit,
    ));

    let registry: Arc<dyn Registry> =
        Arc::new(MemoryRegistry::new(config.sbom.registry_url.clone()));

    let scanner: Arc<dyn VulnScanner> = Arc::new(CommandVulnScanner::new(
        metrics_config.scanner_command.clone(),
    ));

    CveMetricsService::new(metrics_config, trace_api, registry, scanner)
        .map_err(|e| CliError::Command(e.to_string()))
}

// ---- analyze list ----

#[derive(Debug, Serialize)]
struct TraceList {
    trace_ids: Vec<String>,
}

impl Render for TraceList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.trace_ids.is_empty() {
            return writeln!(w, "no traces found");
        }

        writeln!(w, "TRACE ID")?;
        for trace_id in &self.trace_ids {
            writeln!(w, "{trace_id}")?;
        }

        Ok(())
    }
}

async fn list(service: &CveMetricsService, writer: &OutputWriter) -> Result<(), CliError> {
    let trace_ids = service
        .list_trace_ids()
        .await
        .map_err(|e| CliError::TraceApiUnavailable(e.to_string()))?;

    writer.render(&TraceList { trace_ids })
}

// ---- analyze sbom ----

#[derive(Debug, Serialize)]
struct SbomScanOutput {
    trace_id: String,
    entries: Vec<SbomScanEntry>,
}

#[derive(Debug, Serialize)]
struct SbomScanEntry {
    url: String,
    findings: Vec<SbomFinding>,
}

#[derive(Debug, Serialize)]
struct SbomFinding {
    id: String,
    severity: String,
}

impl Render for SbomScanOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.entries.is_empty() {
            return writeln!(w, "trace {} references no SBOMs", self.trace_id);
        }

        for entry in &self.entries {
            writeln!(w, "SBOM: {}", entry.url)?;

            if entry.findings.is_empty() {
                writeln!(w, "  no known vulnerabilities")?;
                continue;
            }

            for finding in &entry.findings {
                writeln!(w, "  {:<18} {}", finding.id, finding.severity)?;
            }
        }

        Ok(())
    }
}

async fn sbom(
    service: &CveMetricsService,
    args: &SbomArgs,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let urls = service
        .trace_sbom_urls(&args.trace_id)
        .await
        .map_err(|e| CliError::TraceApiUnavailable(e.to_string()))?;

    let mut entries = Vec::with_capacity(urls.len());

    for url in urls {
        let report = service
            .scan_sbom_url(&url)
            .await
            .map_err(|e| CliError::Command(format!("scan {url}: {e}")))?;

        let findings = report
            .matches
            .into_iter()
            .map(|m| SbomFinding {
                id: m.vulnerability.id,
                severity: m.vulnerability.severity,
            })
            .collect();

        entries.push(SbomScanEntry { url, findings });
    }

    writer.render(&SbomScanOutput {
        trace_id: args.trace_id.clone(),
        entries,
    })
}
