//! 상관관계 엔진 에러 타입

use cisin_core::error::{
    BusError, CisinError, ConfigError, IdError, LookupError, PipelineError,
};

/// 상관관계 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    /// 워크로드 ID 파싱 실패
    #[error("id error: {0}")]
    Id(#[from] IdError),

    /// 클러스터 조회 실패
    #[error("cluster lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// ID 번역 실패 (외부 워크로드 폴백 포함)
    #[error("translate workload id {id}: {reason}")]
    Translate {
        /// 번역 대상 ID
        id: String,
        /// 실패 사유
        reason: String,
    },

    /// 구독 생성 실패 — 시작 시점에 치명적
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

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

impl From<CorrelationError> for CisinError {
    fn from(err: CorrelationError) -> Self {
        match err {
            CorrelationError::Id(err) => CisinError::Id(err),
            CorrelationError::Lookup(err) => CisinError::Lookup(err),
            CorrelationError::Translate { id, reason } => {
                CisinError::Lookup(LookupError::Api(format!("translate {id}: {reason}")))
            }
            CorrelationError::Bus(err) => CisinError::Bus(err),
            CorrelationError::Config { field, reason } => {
                CisinError::Config(ConfigError::InvalidValue { field, reason })
            }
            CorrelationError::Pipeline(err) => CisinError::Pipeline(err),
        }
    }
}
