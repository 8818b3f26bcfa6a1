//! 상관관계 엔진 — 버스 소비, 그래프 갱신, 트레이스 주기
//!
//! [`CorrelationEngine`]은 core의 [`Pipeline`] trait을 구현하여
//! `cisin-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! bus(connection) x WpSize ──> WorkerPool ──> translate ──> graph
//! bus(sbom)       x WpSize ──────────────────────────────> sbom index
//! ticker(trace_interval) ──> TraceEmitter ──> TraceSink
//! ```
//!
//! subject별로 `WpSize`개의 구독이 같은 큐 그룹에 참여하여 브로커가
//! 부하를 분산합니다. 시작 시 구독 생성 실패는 치명적이고, 실행 중
//! 메시지 단위 실패는 로그만 남깁니다.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cisin_core::bus::MessageBus;
use cisin_core::cluster::ClusterLookup;
use cisin_core::error::{CisinError, PipelineError};
use cisin_core::id;
use cisin_core::metrics::{
    CORRELATION_CONNECTIONS_DROPPED_TOTAL, CORRELATION_CONNECTIONS_TOTAL,
    CORRELATION_GRAPH_NODES, CORRELATION_SBOM_MESSAGES_TOTAL, CORRELATION_TRACES_EMITTED_TOTAL,
    LABEL_REASON,
};
use cisin_core::pipeline::{HealthStatus, Pipeline};
use cisin_core::types::{Connection, Sbom};

use crate::config::CorrelationConfig;
use crate::error::CorrelationError;
use crate::graph::{EdgeOutcome, NeighbourhoodGraph};
use crate::sink::TraceSink;
use crate::trace::TraceEmitter;
use crate::translate::translate_workload_id;
use crate::worker::WorkerPool;

#[derive(Debug, Clone, PartialEq, Eq)]
enum EngineState {
    Initialized,
    Running,
    Stopped,
}

/// 상관관계 엔진
pub struct CorrelationEngine {
    config: CorrelationConfig,
    state: EngineState,
    graph: NeighbourhoodGraph,
    connection_bus: Arc<dyn MessageBus<Connection>>,
    sbom_bus: Arc<dyn MessageBus<Sbom>>,
    processor: Arc<ConnectionProcessor>,
    sink: Arc<dyn TraceSink>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

/// 연결 메시지 처리기 — 워커 태스크가 공유
struct ConnectionProcessor {
    graph: NeighbourhoodGraph,
    lookup: Arc<dyn ClusterLookup>,
    exclude_workloads: Vec<String>,
}

impl ConnectionProcessor {
    /// 연결 메시지 하나를 그래프에 반영합니다.
    async fn process(&self, connection: Connection) -> Result<(), CorrelationError> {
        metrics::counter!(CORRELATION_CONNECTIONS_TOTAL).increment(1);

        tracing::trace!(connection = %connection, "connection message received");

        let src_id =
            translate_workload_id(self.lookup.as_ref(), &connection.source.id).await?;
        let dest_id =
            translate_workload_id(self.lookup.as_ref(), &connection.destination.id).await?;

        // world에 대해서는 SBOM을 만들 수 없으므로 관심 없음
        if src_id == id::WORLD_ID || dest_id == id::WORLD_ID {
            metrics::counter!(CORRELATION_CONNECTIONS_DROPPED_TOTAL, LABEL_REASON => "world")
                .increment(1);
            tracing::trace!(src = %src_id, dest = %dest_id, "ignore world id");
            return Ok(());
        }

        // 설정으로 제외된 워크로드
        if self.exclude_workloads.contains(&src_id) || self.exclude_workloads.contains(&dest_id) {
            metrics::counter!(CORRELATION_CONNECTIONS_DROPPED_TOTAL, LABEL_REASON => "excluded")
                .increment(1);
            tracing::trace!(src = %src_id, dest = %dest_id, "excluded workload");
            return Ok(());
        }

        let outcome = self.graph.observe_connection(
            &src_id,
            &connection.source.results,
            &dest_id,
            &connection.destination.results,
        );

        if outcome == EdgeOutcome::ReverseSuppressed {
            metrics::counter!(
                CORRELATION_CONNECTIONS_DROPPED_TOTAL,
                LABEL_REASON => "reverse_edge"
            )
            .increment(1);
            tracing::trace!(src = %src_id, dest = %dest_id, "already in destination neighbourhood");
            return Ok(());
        }

        metrics::gauge!(CORRELATION_GRAPH_NODES).set(self.graph.participant_count() as f64);

        tracing::trace!(src = %src_id, dest = %dest_id, "connection processed");

        Ok(())
    }
}

impl CorrelationEngine {
    /// 엔진이 사용하는 그래프의 핸들을 반환합니다.
    ///
    /// 검사와 테스트에 사용합니다.
    pub fn graph(&self) -> NeighbourhoodGraph {
        self.graph.clone()
    }

    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            EngineState::Initialized => "initialized",
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
        }
    }

    /// SBOM 구독 소비자들을 시작합니다.
    async fn start_sbom_consumers(&mut self) -> Result<(), CorrelationError> {
        for _ in 0..self.config.wp_size {
            let mut sbom_rx = self
                .sbom_bus
                .subscribe(
                    &self.config.sbom_subject,
                    &self.config.sbom_queue,
                    self.cancel.clone(),
                )
                .await?;

            let graph = self.graph.clone();

            self.tasks.push(tokio::spawn(async move {
                while let Some(sbom) = sbom_rx.recv().await {
                    metrics::counter!(CORRELATION_SBOM_MESSAGES_TOTAL).increment(1);
                    graph.record_sbom(&sbom);
                }
            }));
        }

        Ok(())
    }

    /// 연결 구독 소비자들과 워커 풀을 시작합니다.
    async fn start_connection_consumers(&mut self) -> Result<(), CorrelationError> {
        let pool = Arc::new(WorkerPool::new(
            self.config.wp_size,
            self.config.wp_max_queue_size,
            self.cancel.clone(),
        ));

        for _ in 0..self.config.wp_size {
            let mut connection_rx = self
                .connection_bus
                .subscribe(
                    &self.config.connection_subject,
                    &self.config.connection_queue,
                    self.cancel.clone(),
                )
                .await?;

            let pool = Arc::clone(&pool);
            let processor = Arc::clone(&self.processor);

            self.tasks.push(tokio::spawn(async move {
                while let Some(connection) = connection_rx.recv().await {
                    let processor = Arc::clone(&processor);

                    pool.submit(async move {
                        if let Err(e) = processor.process(connection).await {
                            tracing::error!(error = %e, "failed to process connection");
                        }
                    })
                    .await;

                    tracing::trace!(size = pool.queue_len(), "wp queue size");
                }
            }));
        }

        Ok(())
    }

    /// 트레이스 방출 주기를 시작합니다.
    fn start_trace_ticker(&mut self) {
        let emitter = TraceEmitter::new(Arc::clone(&self.sink), self.config.world_root);
        let graph = self.graph.clone();
        let cancel = self.cancel.clone();
        let interval = self.config.trace_interval;

        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        let emitted = emitter.build_traces(&graph);
                        metrics::counter!(CORRELATION_TRACES_EMITTED_TOTAL)
                            .increment(emitted as u64);
                    }
                }
            }
        }));
    }
}

impl Pipeline for CorrelationEngine {
    async fn start(&mut self) -> Result<(), CisinError> {
        if self.state == EngineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(
            workers = self.config.wp_size,
            connection_subject = %self.config.connection_subject,
            sbom_subject = %self.config.sbom_subject,
            "starting correlation engine"
        );

        self.cancel = CancellationToken::new();

        self.start_sbom_consumers().await.map_err(CisinError::from)?;
        self.start_connection_consumers()
            .await
            .map_err(CisinError::from)?;
        self.start_trace_ticker();

        self.state = EngineState::Running;

        tracing::info!("correlation engine started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CisinError> {
        if self.state != EngineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping correlation engine");

        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        self.state = EngineState::Stopped;
        tracing::info!("correlation engine stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            EngineState::Running => HealthStatus::Healthy,
            EngineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            EngineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 상관관계 엔진 빌더
pub struct CorrelationEngineBuilder {
    config: CorrelationConfig,
    connection_bus: Option<Arc<dyn MessageBus<Connection>>>,
    sbom_bus: Option<Arc<dyn MessageBus<Sbom>>>,
    lookup: Option<Arc<dyn ClusterLookup>>,
    sink: Option<Arc<dyn TraceSink>>,
}

impl CorrelationEngineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: CorrelationConfig::default(),
            connection_bus: None,
            sbom_bus: None,
            lookup: None,
            sink: None,
        }
    }

    /// 엔진 설정을 지정합니다.
    pub fn config(mut self, config: CorrelationConfig) -> Self {
        self.config = config;
        self
    }

    /// 연결 메시지 버스를 지정합니다.
    pub fn connection_bus(mut self, bus: Arc<dyn MessageBus<Connection>>) -> Self {
        self.connection_bus = Some(bus);
        self
    }

    /// SBOM 메시지 버스를 지정합니다.
    pub fn sbom_bus(mut self, bus: Arc<dyn MessageBus<Sbom>>) -> Self {
        self.sbom_bus = Some(bus);
        self
    }

    /// 클러스터 조회를 지정합니다.
    pub fn cluster_lookup(mut self, lookup: Arc<dyn ClusterLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// 트레이스 싱크를 지정합니다.
    pub fn trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 엔진을 빌드합니다.
    pub fn build(self) -> Result<CorrelationEngine, CorrelationError> {
        self.config.validate()?;

        let connection_bus = self.connection_bus.ok_or(CorrelationError::Config {
            field: "connection_bus".to_owned(),
            reason: "connection bus is required".to_owned(),
        })?;

        let sbom_bus = self.sbom_bus.ok_or(CorrelationError::Config {
            field: "sbom_bus".to_owned(),
            reason: "sbom bus is required".to_owned(),
        })?;

        let lookup = self.lookup.ok_or(CorrelationError::Config {
            field: "cluster_lookup".to_owned(),
            reason: "cluster lookup is required".to_owned(),
        })?;

        let sink = self.sink.ok_or(CorrelationError::Config {
            field: "trace_sink".to_owned(),
            reason: "trace sink is required".to_owned(),
        })?;

        let graph = NeighbourhoodGraph::new();

        let processor = Arc::new(ConnectionProcessor {
            graph: graph.clone(),
            lookup,
            exclude_workloads: self.config.exclude_workloads.clone(),
        });

        Ok(CorrelationEngine {
            config: self.config,
            state: EngineState::Initialized,
            graph,
            connection_bus,
            sbom_bus,
            processor,
            sink,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

impl Default for CorrelationEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
