//! 플로우 파이프라인 — 수집/필터/중복 제거/분석/발행의 전체 흐름
//!
//! [`FlowPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `cisin-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! FlowSource -> filter -> dedup cache -> classify + modules -> bus publish
//! ```
//!
//! 단일 소비자 태스크가 플로우 채널을 읽습니다. 분류와 모듈 호출은
//! 그 태스크 위에서 순차 실행됩니다 — 노드별 배포가 자연스러운
//! 병렬성을 제공하므로 에이전트 내부 병렬화는 하지 않습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use cisin_core::bus::MessageBus;
use cisin_core::cluster::ClusterLookup;
use cisin_core::error::{CisinError, PipelineError};
use cisin_core::metrics::{
    FLOW_AGENT_CONNECTIONS_PUBLISHED_TOTAL, FLOW_AGENT_FLOWS_DEDUPLICATED_TOTAL,
    FLOW_AGENT_FLOWS_SKIPPED_TOTAL, FLOW_AGENT_FLOWS_TOTAL, FLOW_AGENT_MODULE_ERRORS_TOTAL,
    LABEL_MODULE, LABEL_REASON,
};
use cisin_core::pipeline::{HealthStatus, Pipeline};
use cisin_core::safemap::SafeMapTtl;
use cisin_core::types::{Connection, Flow, FlowEndpoint, Workload};

use crate::classify::classify_endpoint;
use crate::config::FlowAgentConfig;
use crate::error::FlowAgentError;
use crate::module::{AgentModule, build_modules};
use crate::source::FlowSource;

/// 임시 포트 범위의 시작
///
/// 외부 워크로드에서는 응답 플로우가 항상 응답으로 표시되지는
/// 않습니다. 요청은 임시 포트를 출발지 포트로 쓴다고 가정하여
/// 잘못 표시된 응답을 걸러냅니다.
pub const EPHEMERAL_PORT_START: u16 = 32768;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 플로우 파이프라인
///
/// # 사용 예시
/// ```ignore
/// let (pipeline, _) = FlowPipelineBuilder::new()
///     .config(config)
///     .source(source)
///     .bus(bus)
///     .cluster_lookup(lookup)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct FlowPipeline {
    state: PipelineState,
    worker: Arc<FlowWorker>,
    source: Arc<dyn FlowSource>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

/// 소비자 태스크가 공유하는 처리 상태
struct FlowWorker {
    config: FlowAgentConfig,
    bus: Arc<dyn MessageBus<Connection>>,
    src_modules: Vec<Arc<dyn AgentModule>>,
    dest_modules: Vec<Arc<dyn AgentModule>>,
    cache: SafeMapTtl<String, Instant>,
    received: AtomicU64,
    published: AtomicU64,
}

impl FlowPipeline {
    /// 수신한 플로우 수를 반환합니다.
    pub fn received_count(&self) -> u64 {
        self.worker.received.load(Ordering::Relaxed)
    }

    /// 발행한 연결 메시지 수를 반환합니다.
    pub fn published_count(&self) -> u64 {
        self.worker.published.load(Ordering::Relaxed)
    }

    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }
}

impl Pipeline for FlowPipeline {
    async fn start(&mut self) -> Result<(), CisinError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(
            node = %self.worker.config.qualified_node_name(),
            "starting flow pipeline"
        );

        self.cancel = CancellationToken::new();

        // 중복 제거 캐시 스위퍼
        self.worker.cache.spawn_sweeper(
            self.worker.config.cache_sweep_interval,
            self.cancel.clone(),
        );

        let (mut flow_rx, mut error_rx) = self.source.stream(self.cancel.clone());

        let worker = Arc::clone(&self.worker);
        let cancel = self.cancel.clone();

        let consumer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    flow = flow_rx.recv() => {
                        let Some(flow) = flow else {
                            tracing::info!("flow stream closed");
                            return;
                        };

                        if let Err(e) = worker.process(flow).await {
                            tracing::error!(error = %e, "failed to process flow");
                        }
                    }
                    error = error_rx.recv() => {
                        // 스트림 에러는 치명적이지 않음
                        if let Some(error) = error {
                            tracing::error!(error = %error, "flow source error");
                        }
                    }
                }
            }
        });

        self.tasks.push(consumer);
        self.state = PipelineState::Running;

        tracing::info!("flow pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CisinError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping flow pipeline");

        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        self.state = PipelineState::Stopped;
        tracing::info!("flow pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => HealthStatus::Healthy,
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

impl FlowWorker {
    /// 플로우 하나를 처리합니다: 필터 → 캐시 → 분석 → 발행.
    async fn process(&self, flow: Flow) -> Result<(), FlowAgentError> {
        self.received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(FLOW_AGENT_FLOWS_TOTAL).increment(1);

        if let Some(reason) = self.skip_reason(&flow) {
            metrics::counter!(FLOW_AGENT_FLOWS_SKIPPED_TOTAL, LABEL_REASON => reason).increment(1);
            tracing::trace!(id = %flow.uuid, reason, "skip flow");
            return Ok(());
        }

        // 필터를 통과한 플로우는 소스/목적지/L3/L4가 모두 존재
        let source = flow.source.as_ref().expect("source checked by filter");
        let destination = flow
            .destination
            .as_ref()
            .expect("destination checked by filter");
        let ip = flow.ip.as_ref().expect("ip checked by filter");
        let tcp = flow.tcp.as_ref().expect("tcp checked by filter");

        let cache_key = format!("{}-{}", source.identity, destination.identity);

        tracing::trace!(id = %flow.uuid, key = %cache_key, "analyze flow");

        if let Some(last_sent) = self.cache.get(&cache_key) {
            if last_sent.elapsed() < self.config.cache_ttl {
                metrics::counter!(FLOW_AGENT_FLOWS_DEDUPLICATED_TOTAL).increment(1);
                tracing::trace!(id = %flow.uuid, key = %cache_key, "skip cached flow");
                return Ok(());
            }
        }

        let src_workload = self
            .analyse_endpoint(&flow.uuid, &ip.source, tcp.source_port, source, &self.src_modules)
            .await?;

        // 목적지는 보통 이 노드에 없으므로 분석이 더 단순함
        let dest_workload = self
            .analyse_endpoint(
                &flow.uuid,
                &ip.destination,
                tcp.destination_port,
                destination,
                &self.dest_modules,
            )
            .await?;

        tracing::trace!(id = %flow.uuid, key = %cache_key, "publish analyzed flow");

        self.bus
            .publish(
                &self.config.connection_subject,
                &Connection {
                    source: src_workload,
                    destination: dest_workload,
                    host: self.config.node_name.clone(),
                },
            )
            .await?;

        self.cache.set(cache_key, Instant::now());
        self.published.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(FLOW_AGENT_CONNECTIONS_PUBLISHED_TOTAL).increment(1);

        Ok(())
    }

    /// 플로우를 건너뛸 사유를 반환합니다. `None`이면 분석 대상입니다.
    fn skip_reason(&self, flow: &Flow) -> Option<&'static str> {
        // 다른 노드에 속한 플로우
        if flow.node_name != self.config.qualified_node_name() {
            return Some("node_name_mismatch");
        }

        if flow.is_reply {
            return Some("is_reply");
        }

        let Some(tcp) = &flow.tcp else {
            return Some("no_tcp");
        };

        if flow.ip.is_none() {
            return Some("no_ip");
        }

        if flow.source.is_none() {
            return Some("no_source");
        }

        // 임시 포트 휴리스틱: 요청의 출발지 포트는 임시 범위에 있음
        if tcp.source_port < EPHEMERAL_PORT_START {
            return Some("source_port");
        }

        if flow.destination.is_none() {
            return Some("no_destination");
        }

        None
    }

    /// 엔드포인트 하나를 분류하고 모듈로 보강합니다.
    ///
    /// 모듈 실패는 메시지를 중단하지 않습니다 — 성공한 모듈의
    /// 결과만 결과 맵에 남습니다.
    async fn analyse_endpoint(
        &self,
        uuid: &str,
        ip: &str,
        port: u16,
        endpoint: &FlowEndpoint,
        modules: &[Arc<dyn AgentModule>],
    ) -> Result<Workload, FlowAgentError> {
        let mut workload =
            classify_endpoint(endpoint, &self.config.cluster_name, &self.config.node_name)?;

        for module in modules {
            match module.analyze(ip, port, endpoint).await {
                Ok(Some(analyse)) => {
                    workload.results.insert(module.name().to_owned(), analyse);
                }
                Ok(None) => {}
                Err(e) => {
                    metrics::counter!(
                        FLOW_AGENT_MODULE_ERRORS_TOTAL,
                        LABEL_MODULE => module.name().to_owned()
                    )
                    .increment(1);
                    tracing::error!(id = %uuid, module = %module.name(), error = %e, "module failed");
                }
            }
        }

        Ok(workload)
    }
}

/// 플로우 파이프라인 빌더
pub struct FlowPipelineBuilder {
    config: FlowAgentConfig,
    source: Option<Arc<dyn FlowSource>>,
    bus: Option<Arc<dyn MessageBus<Connection>>>,
    cluster_lookup: Option<Arc<dyn ClusterLookup>>,
}

impl FlowPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: FlowAgentConfig::default(),
            source: None,
            bus: None,
            cluster_lookup: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: FlowAgentConfig) -> Self {
        self.config = config;
        self
    }

    /// 플로우 소스를 지정합니다.
    pub fn source(mut self, source: Arc<dyn FlowSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// 연결 메시지를 발행할 버스를 지정합니다.
    pub fn bus(mut self, bus: Arc<dyn MessageBus<Connection>>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// 모듈이 사용할 클러스터 조회를 지정합니다.
    pub fn cluster_lookup(mut self, lookup: Arc<dyn ClusterLookup>) -> Self {
        self.cluster_lookup = Some(lookup);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<FlowPipeline, FlowAgentError> {
        self.config.validate()?;

        let source = self.source.ok_or_else(|| FlowAgentError::Config {
            field: "source".to_owned(),
            reason: "flow source is required".to_owned(),
        })?;

        let bus = self.bus.ok_or_else(|| FlowAgentError::Config {
            field: "bus".to_owned(),
            reason: "message bus is required".to_owned(),
        })?;

        let lookup = self.cluster_lookup.ok_or_else(|| FlowAgentError::Config {
            field: "cluster_lookup".to_owned(),
            reason: "cluster lookup is required".to_owned(),
        })?;

        let src_modules = build_modules(&self.config.src_modules, Arc::clone(&lookup))?;
        let dest_modules = build_modules(&self.config.dest_modules, lookup)?;

        let cache = SafeMapTtl::new(self.config.cache_ttl);

        let worker = Arc::new(FlowWorker {
            config: self.config,
            bus,
            src_modules,
            dest_modules,
            cache,
            received: AtomicU64::new(0),
            published: AtomicU64::new(0),
        });

        Ok(FlowPipeline {
            state: PipelineState::Initialized,
            worker,
            source,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

impl Default for FlowPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ChannelFlowSource;
    use cisin_core::bus::MemoryBus;
    use cisin_core::cluster::StaticClusterLookup;
    use cisin_core::types::{IpPair, TcpPair, WorkloadRef};
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> FlowAgentConfig {
        FlowAgentConfig {
            cluster_name: "prod".to_owned(),
            node_name: "node-a".to_owned(),
            src_modules: Vec::new(),
            dest_modules: Vec::new(),
            ..Default::default()
        }
    }

    fn worker_with_config(config: FlowAgentConfig) -> Arc<FlowWorker> {
        let cache_ttl = config.cache_ttl;
        Arc::new(FlowWorker {
            config,
            bus: Arc::new(MemoryBus::new()),
            src_modules: Vec::new(),
            dest_modules: Vec::new(),
            cache: SafeMapTtl::new(cache_ttl),
            received: AtomicU64::new(0),
            published: AtomicU64::new(0),
        })
    }

    fn k8s_endpoint(identity: u64, namespace: &str, kind: &str, name: &str) -> FlowEndpoint {
        FlowEndpoint {
            identity,
            namespace: namespace.to_owned(),
            workloads: vec![WorkloadRef {
                kind: kind.to_owned(),
                name: name.to_owned(),
            }],
            ..Default::default()
        }
    }

    fn valid_flow() -> Flow {
        Flow {
            uuid: "flow-1".to_owned(),
            node_name: "prod/node-a".to_owned(),
            is_reply: false,
            ip: Some(IpPair {
                source: "10.0.0.1".to_owned(),
                destination: "10.0.0.2".to_owned(),
            }),
            tcp: Some(TcpPair {
                source_port: 40000,
                destination_port: 80,
            }),
            source: Some(k8s_endpoint(11, "app", "Deployment", "web")),
            destination: Some(k8s_endpoint(22, "app", "Deployment", "db")),
        }
    }

    #[test]
    fn builder_requires_source_and_bus() {
        let result = FlowPipelineBuilder::new().config(test_config()).build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let (source, _injector) = ChannelFlowSource::new();
        let result = FlowPipelineBuilder::new()
            .config(FlowAgentConfig {
                cluster_name: String::new(),
                ..test_config()
            })
            .source(Arc::new(source))
            .bus(Arc::new(MemoryBus::new()))
            .cluster_lookup(Arc::new(StaticClusterLookup::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn skip_reason_covers_every_filter_rule() {
        let worker = worker_with_config(test_config());

        let flow = Flow {
            node_name: "prod/node-b".to_owned(),
            ..valid_flow()
        };
        assert_eq!(worker.skip_reason(&flow), Some("node_name_mismatch"));

        let flow = Flow {
            is_reply: true,
            ..valid_flow()
        };
        assert_eq!(worker.skip_reason(&flow), Some("is_reply"));

        let flow = Flow {
            tcp: None,
            ..valid_flow()
        };
        assert_eq!(worker.skip_reason(&flow), Some("no_tcp"));

        let flow = Flow {
            ip: None,
            ..valid_flow()
        };
        assert_eq!(worker.skip_reason(&flow), Some("no_ip"));

        let flow = Flow {
            source: None,
            ..valid_flow()
        };
        assert_eq!(worker.skip_reason(&flow), Some("no_source"));

        let flow = Flow {
            tcp: Some(TcpPair {
                source_port: 32767,
                destination_port: 80,
            }),
            ..valid_flow()
        };
        assert_eq!(worker.skip_reason(&flow), Some("source_port"));

        let flow = Flow {
            destination: None,
            ..valid_flow()
        };
        assert_eq!(worker.skip_reason(&flow), Some("no_destination"));

        assert_eq!(worker.skip_reason(&valid_flow()), None);
    }

    #[test]
    fn skip_reason_boundary_port_is_accepted() {
        let worker = worker_with_config(test_config());
        let flow = Flow {
            tcp: Some(TcpPair {
                source_port: EPHEMERAL_PORT_START,
                destination_port: 80,
            }),
            ..valid_flow()
        };
        assert_eq!(worker.skip_reason(&flow), None);
    }

    #[tokio::test]
    async fn process_publishes_connection() {
        let bus = Arc::new(MemoryBus::new());
        let cancel = CancellationToken::new();
        let mut rx: tokio::sync::mpsc::Receiver<Connection> = bus
            .subscribe("hubble", "hubble", cancel.clone())
            .await
            .unwrap();

        let config = test_config();
        let cache_ttl = config.cache_ttl;
        let worker = Arc::new(FlowWorker {
            config,
            bus: bus.clone(),
            src_modules: Vec::new(),
            dest_modules: Vec::new(),
            cache: SafeMapTtl::new(cache_ttl),
            received: AtomicU64::new(0),
            published: AtomicU64::new(0),
        });

        worker.process(valid_flow()).await.unwrap();

        let connection = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(connection.source.id, "app/Deployment/web");
        assert_eq!(connection.destination.id, "app/Deployment/db");
        assert_eq!(connection.host, "node-a");

        cancel.cancel();
    }

    #[tokio::test]
    async fn process_deduplicates_within_ttl() {
        let worker = worker_with_config(test_config());

        worker.process(valid_flow()).await.unwrap();
        worker.process(valid_flow()).await.unwrap();

        assert_eq!(worker.published.load(Ordering::Relaxed), 1);
        assert_eq!(worker.received.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn process_republishes_after_ttl() {
        let config = FlowAgentConfig {
            cache_ttl: Duration::from_millis(10),
            ..test_config()
        };
        let worker = worker_with_config(config);

        worker.process(valid_flow()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        worker.process(valid_flow()).await.unwrap();

        assert_eq!(worker.published.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn distinct_identity_pairs_are_not_deduplicated() {
        let worker = worker_with_config(test_config());

        worker.process(valid_flow()).await.unwrap();

        let mut other = valid_flow();
        other.destination = Some(k8s_endpoint(33, "app", "Deployment", "cache"));
        worker.process(other).await.unwrap();

        assert_eq!(worker.published.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn pipeline_lifecycle() {
        let (source, _injector) = ChannelFlowSource::new();
        let mut pipeline = FlowPipelineBuilder::new()
            .config(test_config())
            .source(Arc::new(source))
            .bus(Arc::new(MemoryBus::new()))
            .cluster_lookup(Arc::new(StaticClusterLookup::new()))
            .build()
            .unwrap();

        assert_eq!(pipeline.state_name(), "initialized");
        assert!(pipeline.health_check().await.is_unhealthy());

        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state_name(), "running");
        assert!(pipeline.health_check().await.is_healthy());

        // 중복 시작 거부
        assert!(pipeline.start().await.is_err());

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.stop().await.is_err());
    }

    #[tokio::test]
    async fn end_to_end_flow_through_pipeline() {
        let bus = Arc::new(MemoryBus::new());
        let cancel = CancellationToken::new();
        let mut rx: tokio::sync::mpsc::Receiver<Connection> = bus
            .subscribe("hubble", "hubble", cancel.clone())
            .await
            .unwrap();

        let (source, injector) = ChannelFlowSource::new();
        let mut pipeline = FlowPipelineBuilder::new()
            .config(test_config())
            .source(Arc::new(source))
            .bus(bus)
            .cluster_lookup(Arc::new(StaticClusterLookup::new()))
            .build()
            .unwrap();

        pipeline.start().await.unwrap();

        injector.send(valid_flow()).await.unwrap();

        let connection = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(connection.source.id, "app/Deployment/web");

        pipeline.stop().await.unwrap();
        cancel.cancel();
    }
}
