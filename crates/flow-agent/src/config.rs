//! 플로우 에이전트 설정
//!
//! [`FlowAgentConfig`]는 core의 [`AgentConfig`](cisin_core::config::AgentConfig)에서
//! 파생되며, 파이프라인이 사용하는 형태로 정규화된 값을 담습니다.

use std::time::Duration;

use cisin_core::config::AgentConfig;

use crate::error::FlowAgentError;

/// 플로우 에이전트 설정
#[derive(Debug, Clone)]
pub struct FlowAgentConfig {
    /// Kubernetes 클러스터 이름
    pub cluster_name: String,
    /// 이 에이전트가 실행 중인 노드 이름
    pub node_name: String,
    /// 연결 메시지를 발행할 subject
    pub connection_subject: String,
    /// 플로우 재전송 억제 시간
    pub cache_ttl: Duration,
    /// 중복 제거 캐시 스위퍼 주기
    pub cache_sweep_interval: Duration,
    /// 플로우 출발지에 적용할 모듈 이름
    pub src_modules: Vec<String>,
    /// 플로우 목적지에 적용할 모듈 이름
    pub dest_modules: Vec<String>,
}

impl Default for FlowAgentConfig {
    fn default() -> Self {
        Self::from_core(&AgentConfig::default())
    }
}

impl FlowAgentConfig {
    /// core의 `AgentConfig`에서 설정을 생성합니다.
    ///
    /// `node_name`이 비어 있으면 호출자가 호스트명으로 채워야 합니다.
    pub fn from_core(core: &AgentConfig) -> Self {
        Self {
            cluster_name: core.cluster_name.clone(),
            node_name: core.node_name.clone(),
            connection_subject: core.connection_subject.clone(),
            cache_ttl: core.cache_ttl(),
            cache_sweep_interval: core.cache_sweep_interval(),
            src_modules: core.src_modules.clone(),
            dest_modules: core.dest_modules.clone(),
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FlowAgentError> {
        if self.cluster_name.is_empty() {
            return Err(FlowAgentError::Config {
                field: "cluster_name".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.node_name.is_empty() {
            return Err(FlowAgentError::Config {
                field: "node_name".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.connection_subject.is_empty() {
            return Err(FlowAgentError::Config {
                field: "connection_subject".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.cache_ttl.is_zero() {
            return Err(FlowAgentError::Config {
                field: "cache_ttl".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }

    /// 이 에이전트가 담당하는 플로우의 노드 이름 (`cluster/node`)을
    /// 반환합니다.
    pub fn qualified_node_name(&self) -> String {
        format!("{}/{}", self.cluster_name, self.node_name)
    }
}
