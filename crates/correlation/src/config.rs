//! 상관관계 엔진 설정

use std::time::Duration;

use cisin_core::config::ServerConfig;

use crate::error::CorrelationError;

/// 상관관계 엔진 설정
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// 메시지 처리 워커 수 — subject당 구독 수이기도 함
    pub wp_size: usize,
    /// 처리 대기열 최대 크기 (초과 시 경고만)
    pub wp_max_queue_size: usize,
    /// 연결 메시지 subject
    pub connection_subject: String,
    /// SBOM 메시지 subject
    pub sbom_subject: String,
    /// 연결 메시지 큐 그룹
    pub connection_queue: String,
    /// SBOM 메시지 큐 그룹
    pub sbom_queue: String,
    /// 처리에서 제외할 워크로드 ID
    pub exclude_workloads: Vec<String>,
    /// 트레이스 생성 주기
    pub trace_interval: Duration,
    /// 합성된 world 부모 span으로 루트를 감쌀지 여부
    pub world_root: bool,
    /// 트레이스 서비스 이름
    pub service_name: String,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self::from_core(&ServerConfig::default())
    }
}

impl CorrelationConfig {
    /// core의 `ServerConfig`에서 설정을 생성합니다.
    pub fn from_core(core: &ServerConfig) -> Self {
        Self {
            wp_size: core.wp_size,
            wp_max_queue_size: core.wp_max_queue_size,
            connection_subject: core.connection_subject.clone(),
            sbom_subject: core.sbom_subject.clone(),
            connection_queue: core.connection_queue.clone(),
            sbom_queue: core.sbom_queue.clone(),
            exclude_workloads: core.exclude_workloads.clone(),
            trace_interval: core.trace_interval(),
            world_root: core.world_root,
            service_name: core.service_name.clone(),
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CorrelationError> {
        if self.wp_size == 0 {
            return Err(CorrelationError::Config {
                field: "wp_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.wp_max_queue_size == 0 {
            return Err(CorrelationError::Config {
                field: "wp_max_queue_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.connection_subject.is_empty() || self.sbom_subject.is_empty() {
            return Err(CorrelationError::Config {
                field: "subjects".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.trace_interval.is_zero() {
            return Err(CorrelationError::Config {
                field: "trace_interval".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}
