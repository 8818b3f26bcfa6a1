//! 취약점 메트릭 서비스 — 트레이스와 SBOM을 결합한 CVE 게이지
//!
//! 주기마다:
//!
//! 1. 트레이스 API에서 설정된 서비스의 최근 트레이스를 나열
//! 2. 모든 span의 `sboms` 태그에서 SBOM URL 수집
//! 3. 고유 URL마다 아티팩트를 풀하고 SBOM 레이어를 임시 파일로
//!    풀어 스캐너 실행
//! 4. 발견된 취약점을 그 URL을 참조한 모든 워크로드에 귀속
//! 5. `cisin_workload_cve{...} = 1` 게이지 설정
//! 6. 더 이상 존재하지 않는 워크로드의 게이지 삭제
//!
//! 게이지 시리즈 삭제가 필요하므로 이 서비스는 자체 Prometheus
//! 레지스트리를 유지하고 HTTP로 직접 노출합니다. 서버 종료에는
//! 5초의 유예가 있습니다.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio_util::sync::CancellationToken;

use cisin_core::error::{CisinError, PipelineError};
use cisin_core::id;
use cisin_core::pipeline::{HealthStatus, Pipeline};
use cisin_sbom::Registry;

use crate::config::CveMetricsConfig;
use crate::error::CveMetricsError;
use crate::scan::{ScanReport, VulnScanner};
use crate::trace_api::{TraceApi, TraceDocument};

/// HTTP 서버 종료 유예
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// CVE 게이지 이름
pub const WORKLOAD_CVE_GAUGE: &str = "cisin_workload_cve";

/// CVE 게이지 레이블
const GAUGE_LABELS: &[&str] = &["namespace", "kind", "name", "workload_id", "severity", "cve"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ServiceState {
    Initialized,
    Running,
    Stopped,
}

/// SBOM URL 하나에 대한 취약점과 참조 워크로드
#[derive(Debug, Default)]
struct TraceResult {
    workload_ids: Vec<String>,
    vulnerabilities: Vec<(String, String)>, // (severity, cve id)
}

/// 취약점 메트릭 서비스
pub struct CveMetricsService {
    state: ServiceState,
    inner: Arc<ServiceInner>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

struct ServiceInner {
    config: CveMetricsConfig,
    trace_api: Arc<dyn TraceApi>,
    registry: Arc<dyn Registry>,
    scanner: Arc<dyn VulnScanner>,
    prom: prometheus::Registry,
    cve_gauge: prometheus::GaugeVec,
    // workload id → 설정한 레이블 값 집합. 사라진 워크로드의 시리즈 삭제에 사용
    workload_series: Mutex<HashMap<String, HashSet<Vec<String>>>>,
}

impl CveMetricsService {
    /// 새 서비스를 생성합니다.
    pub fn new(
        config: CveMetricsConfig,
        trace_api: Arc<dyn TraceApi>,
        registry: Arc<dyn Registry>,
        scanner: Arc<dyn VulnScanner>,
    ) -> Result<Self, CveMetricsError> {
        config.validate()?;

        let prom = prometheus::Registry::new();

        let cve_gauge = prometheus::GaugeVec::new(
            prometheus::Opts::new(WORKLOAD_CVE_GAUGE, "Describes a CVE present in the cluster"),
            GAUGE_LABELS,
        )
        .map_err(|e| CveMetricsError::Gauge(e.to_string()))?;

        prom.register(Box::new(cve_gauge.clone()))
            .map_err(|e| CveMetricsError::Gauge(e.to_string()))?;

        Ok(Self {
            state: ServiceState::Initialized,
            inner: Arc::new(ServiceInner {
                config,
                trace_api,
                registry,
                scanner,
                prom,
                cve_gauge,
                workload_series: Mutex::new(HashMap::new()),
            }),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }

    /// 최근 트레이스 ID 목록을 반환합니다.
    pub async fn list_trace_ids(&self) -> Result<Vec<String>, CveMetricsError> {
        let document = self.inner.trace_api.list().await?;

        Ok(document
            .data
            .into_iter()
            .map(|trace| trace.trace_id)
            .collect())
    }

    /// 트레이스 하나에서 참조된 SBOM URL 목록을 반환합니다.
    ///
    /// 빈 문자열(미해석 SBOM)은 제외됩니다.
    pub async fn trace_sbom_urls(&self, trace_id: &str) -> Result<Vec<String>, CveMetricsError> {
        let document = self.inner.trace_api.get(trace_id).await?;

        let mut urls = Vec::new();

        for trace in &document.data {
            for span in &trace.spans {
                for url in span.sbom_urls()? {
                    if url.is_empty() || urls.contains(&url) {
                        continue;
                    }

                    urls.push(url);
                }
            }
        }

        Ok(urls)
    }

    /// SBOM URL 하나를 스캔하여 통합 보고서를 반환합니다.
    pub async fn scan_sbom_url(&self, url: &str) -> Result<ScanReport, CveMetricsError> {
        self.inner.scan_sbom_report(url).await
    }

    /// 한 번의 갱신 주기를 수행합니다. (주기 태스크와 테스트 공용)
    pub async fn update_metrics(&self) -> Result<(), CveMetricsError> {
        self.inner.update_metrics().await
    }

    /// 현재 레지스트리의 메트릭 패밀리를 수집합니다.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.inner.prom.gather()
    }
}

impl ServiceInner {
    async fn update_metrics(&self) -> Result<(), CveMetricsError> {
        let document = self.trace_api.list().await?;
        let results = self.collect_trace_results(&document).await?;

        let mut current_workloads: HashSet<String> = HashSet::new();

        for result in results.values() {
            for workload_id in &result.workload_ids {
                current_workloads.insert(workload_id.clone());

                let Ok((namespace, kind, name)) = id::parse(workload_id) else {
                    // 연산 이름이 워크로드 ID가 아니면 귀속 불가
                    continue;
                };

                for (severity, cve) in &result.vulnerabilities {
                    let labels = [namespace, kind, name, workload_id, severity, cve];

                    self.cve_gauge.with_label_values(&labels).set(1.0);

                    self.workload_series
                        .lock()
                        .expect("workload series lock poisoned")
                        .entry(workload_id.clone())
                        .or_default()
                        .insert(labels.iter().map(|l| (*l).to_owned()).collect());
                }
            }
        }

        self.delete_stale_workloads(&current_workloads);

        Ok(())
    }

    /// 문서의 모든 span에서 SBOM URL → 결과 매핑을 만듭니다.
    ///
    /// 각 고유 URL은 한 번만 스캔되고, 발견된 취약점은 그 URL을
    /// 참조한 모든 워크로드(= span 연산 이름)에 귀속됩니다.
    async fn collect_trace_results(
        &self,
        document: &TraceDocument,
    ) -> Result<HashMap<String, TraceResult>, CveMetricsError> {
        let mut results: HashMap<String, TraceResult> = HashMap::new();

        for trace in &document.data {
            for span in &trace.spans {
                for url in span.sbom_urls()? {
                    // 미해석 SBOM 자리는 빈 문자열
                    if url.is_empty() {
                        continue;
                    }

                    if let Some(result) = results.get_mut(&url) {
                        if !result.workload_ids.contains(&span.operation_name) {
                            result.workload_ids.push(span.operation_name.clone());
                        }
                        continue;
                    }

                    let report = self.scan_sbom_report(&url).await?;

                    let vulnerabilities = report
                        .matches
                        .into_iter()
                        .map(|m| (m.vulnerability.severity, m.vulnerability.id))
                        .collect();

                    results.insert(
                        url.clone(),
                        TraceResult {
                            workload_ids: vec![span.operation_name.clone()],
                            vulnerabilities,
                        },
                    );
                }
            }
        }

        Ok(results)
    }

    /// 아티팩트를 풀하고 SBOM 레이어들을 스캔하여 보고서를
    /// 통합합니다.
    async fn scan_sbom_report(&self, url: &str) -> Result<ScanReport, CveMetricsError> {
        let artifact = self.registry.pull(url).await?;

        let mut combined = ScanReport::default();

        for layer in artifact.layers_with_media_type(&self.config.media_type) {
            // 스캐너는 파일 경로를 받으므로 레이어를 임시 파일로 풀어냄
            let mut file = tempfile::Builder::new()
                .prefix("cisin-")
                .suffix(".json")
                .tempfile()?;

            file.write_all(&layer.data)?;
            file.flush()?;

            let path = file.path().to_string_lossy().into_owned();
            let report = self.scanner.scan(&path).await?;

            combined.matches.extend(report.matches);
        }

        Ok(combined)
    }

    /// 이번 주기에 보이지 않은 워크로드의 시리즈를 삭제합니다.
    fn delete_stale_workloads(&self, current: &HashSet<String>) {
        let mut series = self
            .workload_series
            .lock()
            .expect("workload series lock poisoned");

        let stale: Vec<String> = series
            .keys()
            .filter(|workload_id| !current.contains(*workload_id))
            .cloned()
            .collect();

        for workload_id in stale {
            if let Some(label_sets) = series.remove(&workload_id) {
                for labels in label_sets {
                    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
                    let _ = self.cve_gauge.remove_label_values(&label_refs);
                }
            }

            tracing::debug!(workload = %workload_id, "removed cve gauges for vanished workload");
        }
    }
}

impl Pipeline for CveMetricsService {
    async fn start(&mut self) -> Result<(), CisinError> {
        if self.state == ServiceState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(address = %self.inner.config.address, "starting cve metrics service");

        self.cancel = CancellationToken::new();

        // 게이지 노출 HTTP 서버 — 바인드 실패는 시작 에러
        let listener = tokio::net::TcpListener::bind(&self.inner.config.address)
            .await
            .map_err(|e| {
                CisinError::Pipeline(PipelineError::InitFailed(format!(
                    "bind {}: {e}",
                    self.inner.config.address
                )))
            })?;

        let prom = self.inner.prom.clone();
        let app = Router::new().route(
            "/metrics",
            get(move || {
                let prom = prom.clone();
                async move { render_metrics(&prom) }
            }),
        );

        let cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            let shutdown = cancel.cancelled_owned();

            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "metrics http server failed");
            }
        }));

        // 갱신 주기
        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        let interval = self.inner.config.update_interval;

        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        if let Err(e) = inner.update_metrics().await {
                            tracing::error!(error = %e, "update metrics failed");
                        }
                    }
                }
            }
        }));

        self.state = ServiceState::Running;
        tracing::info!("cve metrics service started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CisinError> {
        if self.state != ServiceState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping cve metrics service");

        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            // 종료 유예를 넘기면 태스크를 중단
            let abort = task.abort_handle();

            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                tracing::warn!("task did not stop within the shutdown grace");
                abort.abort();
            }
        }

        self.state = ServiceState::Stopped;
        tracing::info!("cve metrics service stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            ServiceState::Running => HealthStatus::Healthy,
            ServiceState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            ServiceState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

fn render_metrics(prom: &prometheus::Registry) -> (StatusCode, String) {
    let encoder = prometheus::TextEncoder::new();

    match encoder.encode_to_string(&prom.gather()) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::StaticVulnScanner;
    use crate::trace_api::{StaticTraceApi, TraceData, TraceSpan, TraceTag};
    use cisin_sbom::{MemoryRegistry, SPDX_JSON_MEDIA_TYPE, SbomArtifact};

    fn span(operation: &str, sbom_urls: &[&str]) -> TraceSpan {
        let encoded = serde_json::to_string(sbom_urls).unwrap();

        TraceSpan {
            operation_name: operation.to_owned(),
            tags: vec![TraceTag {
                key: "sboms".to_owned(),
                tag_type: "string".to_owned(),
                value: serde_json::Value::String(encoded),
            }],
            ..Default::default()
        }
    }

    fn document(spans: Vec<TraceSpan>) -> TraceDocument {
        TraceDocument {
            data: vec![TraceData {
                trace_id: "t1".to_owned(),
                spans,
                ..Default::default()
            }],
        }
    }

    async fn service_with(
        document: TraceDocument,
        findings: &[(&str, &str)],
    ) -> (CveMetricsService, StaticTraceApi, MemoryRegistry) {
        let api = StaticTraceApi::new(document);
        let registry = MemoryRegistry::new("registry.local/cisin");

        // 참조되는 모든 URL에 아티팩트를 준비
        registry
            .push(
                "registry.local/cisin/web:abc",
                &SbomArtifact::single_layer(b"{}".as_slice(), SPDX_JSON_MEDIA_TYPE),
            )
            .await
            .unwrap();

        let config = CveMetricsConfig {
            address: "127.0.0.1:0".to_owned(),
            ..Default::default()
        };

        let service = CveMetricsService::new(
            config,
            Arc::new(api.clone()),
            Arc::new(registry.clone()),
            Arc::new(StaticVulnScanner::with_findings(findings)),
        )
        .unwrap();

        (service, api, registry)
    }

    fn gauge_series(service: &CveMetricsService) -> Vec<HashMap<String, String>> {
        service
            .gather()
            .into_iter()
            .filter(|family| family.get_name() == WORKLOAD_CVE_GAUGE)
            .flat_map(|family| {
                family
                    .get_metric()
                    .iter()
                    .map(|metric| {
                        metric
                            .get_label()
                            .iter()
                            .map(|pair| (pair.get_name().to_owned(), pair.get_value().to_owned()))
                            .collect::<HashMap<_, _>>()
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[tokio::test]
    async fn update_sets_gauges_for_findings() {
        let (service, _api, _registry) = service_with(
            document(vec![span("app/Deployment/web", &["registry.local/cisin/web:abc"])]),
            &[("CVE-2024-0001", "High")],
        )
        .await;

        service.update_metrics().await.unwrap();

        let series = gauge_series(&service);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0]["namespace"], "app");
        assert_eq!(series[0]["kind"], "Deployment");
        assert_eq!(series[0]["name"], "web");
        assert_eq!(series[0]["workload_id"], "app/Deployment/web");
        assert_eq!(series[0]["severity"], "High");
        assert_eq!(series[0]["cve"], "CVE-2024-0001");
    }

    #[tokio::test]
    async fn findings_attributed_to_all_referencing_workloads() {
        let (service, _api, _registry) = service_with(
            document(vec![
                span("app/Deployment/web", &["registry.local/cisin/web:abc"]),
                span("app/Deployment/api", &["registry.local/cisin/web:abc"]),
            ]),
            &[("CVE-2024-0001", "High")],
        )
        .await;

        service.update_metrics().await.unwrap();

        let series = gauge_series(&service);
        let workloads: HashSet<String> = series
            .iter()
            .map(|labels| labels["workload_id"].clone())
            .collect();

        assert_eq!(series.len(), 2);
        assert!(workloads.contains("app/Deployment/web"));
        assert!(workloads.contains("app/Deployment/api"));
    }

    #[tokio::test]
    async fn vanished_workloads_lose_their_gauges() {
        let (service, api, _registry) = service_with(
            document(vec![span("app/Deployment/web", &["registry.local/cisin/web:abc"])]),
            &[("CVE-2024-0001", "High")],
        )
        .await;

        service.update_metrics().await.unwrap();
        assert_eq!(gauge_series(&service).len(), 1);

        // 다음 주기에는 워크로드가 사라짐
        api.set_document(TraceDocument::default());
        service.update_metrics().await.unwrap();

        assert!(gauge_series(&service).is_empty());
    }

    #[tokio::test]
    async fn empty_sbom_urls_are_skipped() {
        let (service, _api, _registry) = service_with(
            document(vec![span("app/Deployment/web", &[""])]),
            &[("CVE-2024-0001", "High")],
        )
        .await;

        service.update_metrics().await.unwrap();
        assert!(gauge_series(&service).is_empty());
    }

    #[tokio::test]
    async fn trace_sbom_urls_dedupes_and_skips_empty() {
        let (service, _api, _registry) = service_with(
            document(vec![
                span("app/Deployment/web", &["registry.local/cisin/web:abc", ""]),
                span("app/Deployment/api", &["registry.local/cisin/web:abc"]),
            ]),
            &[],
        )
        .await;

        let urls = service.trace_sbom_urls("t1").await.unwrap();
        assert_eq!(urls, vec!["registry.local/cisin/web:abc".to_owned()]);
    }

    #[tokio::test]
    async fn service_lifecycle_with_http_server() {
        let (mut service, _api, _registry) = service_with(document(Vec::new()), &[]).await;

        assert!(service.health_check().await.is_unhealthy());
        service.start().await.unwrap();
        assert!(service.health_check().await.is_healthy());
        assert!(service.start().await.is_err());
        service.stop().await.unwrap();
        assert!(service.stop().await.is_err());
    }
}
