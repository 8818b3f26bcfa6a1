//! 파이프라인 trait — 모듈 생명주기 정의
//!
//! [`Pipeline`] trait은 모든 모듈(플로우 파이프라인, SBOM 스케줄러,
//! 상관관계 엔진, 메트릭 서비스)이 구현하는 생명주기 인터페이스입니다.
//! `cisin-daemon`이 각 모듈을 시작/정지하고 상태를 확인하는 데 사용합니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::CisinError;

/// dyn-compatible Future 타입 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모든 모듈이 구현하는 생명주기 trait
///
/// # 구현 예시
/// ```ignore
/// struct FlowPipeline { /* ... */ }
///
/// impl Pipeline for FlowPipeline {
///     async fn start(&mut self) -> Result<(), CisinError> {
///         // 스트림 연결, 워커 스폰, 채널 연결 등
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> Result<(), CisinError> {
///         // 태스크 정리
///         Ok(())
///     }
///
///     async fn health_check(&self) -> HealthStatus {
///         HealthStatus::Healthy
///     }
/// }
/// ```
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다.
    ///
    /// 이미 실행 중인 경우 `PipelineError::AlreadyRunning`을 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), CisinError>> + Send;

    /// 모듈을 정지합니다. Graceful shutdown을 수행합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), CisinError>> + Send;

    /// 모듈의 현재 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 파이프라인 trait
///
/// `Pipeline` trait은 RPITIT를 사용하므로 `dyn Pipeline`이 불가합니다.
/// `DynPipeline`은 `BoxFuture`를 반환하여 `Vec<Box<dyn DynPipeline>>`으로
/// 모듈을 동적 관리할 수 있게 합니다. `Pipeline` 구현 타입은 blanket
/// impl으로 자동으로 `DynPipeline`도 구현합니다.
pub trait DynPipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), CisinError>>;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), CisinError>>;

    /// 모듈의 현재 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), CisinError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), CisinError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 성능 저하 또는 부분적 장애 (서비스는 계속 동작)
    Degraded(String),
    /// 비정상 — 서비스 불가 상태
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Healthy.is_unhealthy());

        let degraded = HealthStatus::Degraded("queue backlog".to_owned());
        assert!(!degraded.is_healthy());
        assert!(!degraded.is_unhealthy());

        let unhealthy = HealthStatus::Unhealthy("stream lost".to_owned());
        assert!(unhealthy.is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert!(
            HealthStatus::Degraded("slow".to_owned())
                .to_string()
                .contains("slow")
        );
    }

    struct MockPipeline {
        running: bool,
    }

    impl Pipeline for MockPipeline {
        async fn start(&mut self) -> Result<(), CisinError> {
            if self.running {
                return Err(PipelineError::AlreadyRunning.into());
            }
            self.running = true;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), CisinError> {
            if !self.running {
                return Err(PipelineError::NotRunning.into());
            }
            self.running = false;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("not running".to_owned())
            }
        }
    }

    #[tokio::test]
    async fn mock_pipeline_lifecycle() {
        let mut pipeline = MockPipeline { running: false };

        assert!(Pipeline::health_check(&pipeline).await.is_unhealthy());

        Pipeline::start(&mut pipeline).await.unwrap();
        assert!(Pipeline::health_check(&pipeline).await.is_healthy());

        // 중복 시작 시 에러
        assert!(Pipeline::start(&mut pipeline).await.is_err());

        Pipeline::stop(&mut pipeline).await.unwrap();
        assert!(Pipeline::stop(&mut pipeline).await.is_err());
    }

    #[tokio::test]
    async fn dyn_pipeline_can_be_boxed() {
        let mut pipeline: Box<dyn DynPipeline> = Box::new(MockPipeline { running: false });

        assert!(pipeline.health_check().await.is_unhealthy());
        pipeline.start().await.unwrap();
        assert!(pipeline.health_check().await.is_healthy());
        pipeline.stop().await.unwrap();
    }
}
