//! SBOM 스케줄러 — 주기적으로 생성 서비스를 구동하고 결과를 발행
//!
//! [`K8sSbomScheduler`]는 로컬 컨테이너 데몬의 모든 이미지를,
//! [`HostSbomScheduler`]는 설정된 파일시스템 루트 하나를 대상으로
//! 합니다. 완료된 생성마다 `Sbom` 메시지를 버스에 발행합니다.
//! 대상별 에러는 로그만 남기고 다음 대상/다음 주기를 막지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cisin_core::bus::MessageBus;
use cisin_core::error::{CisinError, PipelineError};
use cisin_core::metrics::{LABEL_RESULT, SBOM_GENERATIONS_TOTAL, SBOM_PUBLISHED_TOTAL};
use cisin_core::pipeline::{HealthStatus, Pipeline};
use cisin_core::types::Sbom;

use crate::container::ContainerDaemon;
use crate::error::SbomServiceError;
use crate::generator::SbomGenerator;

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct SbomSchedulerConfig {
    /// SBOM 메시지를 발행할 subject
    pub subject: String,
    /// 생성 주기
    pub generation_interval: Duration,
    /// 이 노드의 이름 (호스트 SBOM 메시지에 사용)
    pub node_name: String,
    /// 호스트 SBOM 생성 대상 파일시스템 루트
    pub fs_root: String,
}

impl Default for SbomSchedulerConfig {
    fn default() -> Self {
        Self {
            subject: "sbom".to_owned(),
            generation_interval: Duration::from_secs(30),
            node_name: String::new(),
            fs_root: "/host".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SchedulerState {
    Initialized,
    Running,
    Stopped,
}

/// Kubernetes 노드용 SBOM 스케줄러
///
/// 주기마다 실행 중인 컨테이너 이미지를 나열하고 각 이미지에 대해
/// 생성 서비스를 호출합니다.
pub struct K8sSbomScheduler {
    config: SbomSchedulerConfig,
    state: SchedulerState,
    worker: Arc<K8sSbomWorker>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

struct K8sSbomWorker {
    config: SbomSchedulerConfig,
    bus: Arc<dyn MessageBus<Sbom>>,
    container_daemon: Arc<dyn ContainerDaemon>,
    generator: Arc<dyn SbomGenerator>,
}

impl K8sSbomScheduler {
    /// 새 스케줄러를 생성합니다.
    pub fn new(
        config: SbomSchedulerConfig,
        bus: Arc<dyn MessageBus<Sbom>>,
        container_daemon: Arc<dyn ContainerDaemon>,
        generator: Arc<dyn SbomGenerator>,
    ) -> Self {
        let worker = Arc::new(K8sSbomWorker {
            config: config.clone(),
            bus,
            container_daemon,
            generator,
        });

        Self {
            config,
            state: SchedulerState::Initialized,
            worker,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }
}

impl K8sSbomWorker {
    /// 한 주기를 수행합니다: 이미지 나열 → 생성 → 발행.
    async fn run_once(&self) -> Result<(), SbomServiceError> {
        let images = self.container_daemon.list_container_images().await?;

        for image in images {
            tracing::debug!(image = %image.image, "analyze");

            let url = match self.generator.generate(&image.image).await {
                Ok(url) => {
                    metrics::counter!(SBOM_GENERATIONS_TOTAL, LABEL_RESULT => "success")
                        .increment(1);
                    url
                }
                Err(e) => {
                    metrics::counter!(SBOM_GENERATIONS_TOTAL, LABEL_RESULT => "failure")
                        .increment(1);
                    tracing::error!(image = %image.image, error = %e, "sbom generation failed");
                    continue;
                }
            };

            tracing::debug!(image = %image.image, url = %url, "sbom generated");

            let message = Sbom::for_image(image.image.clone(), image.digest.clone(), url);

            if let Err(e) = self.bus.publish(&self.config.subject, &message).await {
                tracing::error!(image = %image.image, error = %e, "failed to publish sbom message");
                continue;
            }

            metrics::counter!(SBOM_PUBLISHED_TOTAL).increment(1);
        }

        Ok(())
    }
}

impl Pipeline for K8sSbomScheduler {
    async fn start(&mut self) -> Result<(), CisinError> {
        if self.state == SchedulerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(subject = %self.config.subject, "starting k8s sbom scheduler");

        self.cancel = CancellationToken::new();

        let worker = Arc::clone(&self.worker);
        let cancel = self.cancel.clone();
        let interval = self.config.generation_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // interval의 첫 tick은 즉시 발화하므로 소비 — 주기 후 첫 실행
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        if let Err(e) = worker.run_once().await {
                            tracing::error!(error = %e, "sbom generation cycle failed");
                        }
                    }
                }
            }
        });

        self.tasks.push(task);
        self.state = SchedulerState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CisinError> {
        if self.state != SchedulerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        self.state = SchedulerState::Stopped;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            SchedulerState::Running => HealthStatus::Healthy,
            SchedulerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            SchedulerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 호스트 노드용 SBOM 스케줄러
///
/// 시작 시 한 번, 이후 주기마다 파일시스템 루트에서 SBOM을
/// 생성하고 발행합니다.
pub struct HostSbomScheduler {
    config: SbomSchedulerConfig,
    state: SchedulerState,
    worker: Arc<HostSbomWorker>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

struct HostSbomWorker {
    config: SbomSchedulerConfig,
    bus: Arc<dyn MessageBus<Sbom>>,
    generator: Arc<dyn SbomGenerator>,
}

impl HostSbomScheduler {
    /// 새 스케줄러를 생성합니다.
    pub fn new(
        config: SbomSchedulerConfig,
        bus: Arc<dyn MessageBus<Sbom>>,
        generator: Arc<dyn SbomGenerator>,
    ) -> Self {
        let worker = Arc::new(HostSbomWorker {
            config: config.clone(),
            bus,
            generator,
        });

        Self {
            config,
            state: SchedulerState::Initialized,
            worker,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }
}

impl HostSbomWorker {
    async fn run_once(&self) -> Result<(), SbomServiceError> {
        tracing::debug!(host = %self.config.node_name, "analyze");

        let url = match self.generator.generate(&self.config.fs_root).await {
            Ok(url) => {
                metrics::counter!(SBOM_GENERATIONS_TOTAL, LABEL_RESULT => "success").increment(1);
                url
            }
            Err(e) => {
                metrics::counter!(SBOM_GENERATIONS_TOTAL, LABEL_RESULT => "failure").increment(1);
                return Err(e);
            }
        };

        tracing::debug!(host = %self.config.node_name, url = %url, "sbom generated");

        self.bus
            .publish(
                &self.config.subject,
                &Sbom::for_host(self.config.node_name.clone(), url),
            )
            .await?;

        metrics::counter!(SBOM_PUBLISHED_TOTAL).increment(1);

        Ok(())
    }
}

impl Pipeline for HostSbomScheduler {
    async fn start(&mut self) -> Result<(), CisinError> {
        if self.state == SchedulerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(subject = %self.config.subject, "starting host sbom scheduler");

        self.cancel = CancellationToken::new();

        let worker = Arc::clone(&self.worker);
        let cancel = self.cancel.clone();
        let interval = self.config.generation_interval;

        let task = tokio::spawn(async move {
            // 주기를 기다리지 않고 시작 직후 한 번 생성
            if let Err(e) = worker.run_once().await {
                tracing::error!(error = %e, "host sbom generation failed");
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        if let Err(e) = worker.run_once().await {
                            tracing::error!(error = %e, "host sbom generation failed");
                        }
                    }
                }
            }
        });

        self.tasks.push(task);
        self.state = SchedulerState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CisinError> {
        if self.state != SchedulerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        self.state = SchedulerState::Stopped;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            SchedulerState::Running => HealthStatus::Healthy,
            SchedulerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            SchedulerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::SPDX_JSON_MEDIA_TYPE;
    use crate::container::StaticContainerDaemon;
    use crate::generator::{HostSbomGenerator, ImageSbomGenerator};
    use crate::registry::MemoryRegistry;
    use crate::synth::StaticSbomSynth;
    use cisin_core::bus::MemoryBus;
    use tokio::time::timeout;

    fn test_config() -> SbomSchedulerConfig {
        SbomSchedulerConfig {
            generation_interval: Duration::from_millis(20),
            node_name: "node-a".to_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn k8s_scheduler_publishes_image_sboms() {
        let bus = Arc::new(MemoryBus::new());
        let cancel = CancellationToken::new();
        let mut rx: tokio::sync::mpsc::Receiver<Sbom> =
            bus.subscribe("sbom", "sbom", cancel.clone()).await.unwrap();

        let daemon = StaticContainerDaemon::new();
        daemon.add_image("docker.io/library/nginx:latest", "sha256:abc");
        let daemon = Arc::new(daemon);

        let generator = Arc::new(ImageSbomGenerator::new(
            Arc::clone(&daemon) as Arc<dyn ContainerDaemon>,
            Arc::new(MemoryRegistry::new("registry.local/cisin")),
            Arc::new(StaticSbomSynth::new(b"{}".as_slice())),
            SPDX_JSON_MEDIA_TYPE,
        ));

        let mut scheduler = K8sSbomScheduler::new(test_config(), bus, daemon, generator);
        scheduler.start().await.unwrap();

        let message = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();

        let image = message.image.expect("image sbom message");
        assert_eq!(image.digest, "sha256:abc");
        assert_eq!(message.url, "registry.local/cisin/docker.io/library/nginx:abc");

        scheduler.stop().await.unwrap();
        cancel.cancel();
    }

    #[tokio::test]
    async fn host_scheduler_publishes_on_start() {
        let bus = Arc::new(MemoryBus::new());
        let cancel = CancellationToken::new();
        let mut rx: tokio::sync::mpsc::Receiver<Sbom> =
            bus.subscribe("sbom", "sbom", cancel.clone()).await.unwrap();

        let generator = Arc::new(HostSbomGenerator::new(
            "node-a",
            Arc::new(MemoryRegistry::new("registry.local/cisin")),
            Arc::new(StaticSbomSynth::new(b"{}".as_slice())),
            SPDX_JSON_MEDIA_TYPE,
        ));

        let mut scheduler = HostSbomScheduler::new(test_config(), bus, generator);
        scheduler.start().await.unwrap();

        let message = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();

        let host = message.host.expect("host sbom message");
        assert_eq!(host.hostname, "node-a");
        assert_eq!(message.url, "registry.local/cisin/node-a");

        scheduler.stop().await.unwrap();
        cancel.cancel();
    }

    #[tokio::test]
    async fn scheduler_lifecycle() {
        let bus = Arc::new(MemoryBus::new());
        let generator = Arc::new(HostSbomGenerator::new(
            "node-a",
            Arc::new(MemoryRegistry::new("registry.local/cisin")),
            Arc::new(StaticSbomSynth::new(b"{}".as_slice())),
            SPDX_JSON_MEDIA_TYPE,
        ));

        let mut scheduler = HostSbomScheduler::new(test_config(), bus, generator);

        assert!(scheduler.health_check().await.is_unhealthy());
        scheduler.start().await.unwrap();
        assert!(scheduler.health_check().await.is_healthy());
        assert!(scheduler.start().await.is_err());
        scheduler.stop().await.unwrap();
        assert!(scheduler.stop().await.is_err());
    }
}
