//! 플로우 에이전트 에러 타입
//!
//! [`FlowAgentError`]는 에이전트 파이프라인 내에서 발생할 수 있는
//! 에러를 나타냅니다. `From<FlowAgentError> for CisinError` 구현으로
//! `?` 연산자를 통해 상위 에러 타입으로 전파됩니다.

use cisin_core::error::{
    AgentError, BusError, CisinError, ConfigError, IdError, LookupError, PipelineError,
};

/// 플로우 에이전트 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum FlowAgentError {
    /// 플로우 스트림에서 보고된 에러
    #[error("flow source error: {0}")]
    Source(String),

    /// 에이전트 모듈 실행 실패
    #[error("module '{module}' failed: {reason}")]
    Module {
        /// 모듈 이름
        module: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정에 알 수 없는 모듈 이름
    #[error("unknown agent module: {0}")]
    UnknownModule(String),

    /// 워크로드 ID 유도 실패
    #[error("id error: {0}")]
    Id(#[from] IdError),

    /// 클러스터 조회 실패
    #[error("cluster lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// 연결 메시지 발행 실패
    #[error("publish error: {0}")]
    Publish(#[from] BusError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

impl From<FlowAgentError> for CisinError {
    fn from(err: FlowAgentError) -> Self {
        match err {
            FlowAgentError::Source(msg) => CisinError::Agent(AgentError::Source(msg)),
            FlowAgentError::Module { module, reason } => {
                CisinError::Agent(AgentError::Module { module, reason })
            }
            FlowAgentError::UnknownModule(name) => {
                CisinError::Agent(AgentError::UnknownModule(name))
            }
            FlowAgentError::Id(err) => CisinError::Id(err),
            FlowAgentError::Lookup(err) => CisinError::Lookup(err),
            FlowAgentError::Publish(err) => CisinError::Bus(err),
            FlowAgentError::Config { field, reason } => {
                CisinError::Config(ConfigError::InvalidValue { field, reason })
            }
            FlowAgentError::Pipeline(err) => CisinError::Pipeline(err),
        }
    }
}
