//! SBOM 서비스 에러 타입
//!
//! [`SbomServiceError`]는 SBOM 생성/저장 경로에서 발생할 수 있는
//! 에러를 나타냅니다. `From<SbomServiceError> for CisinError` 구현으로
//! `?` 연산자를 통해 상위 에러 타입으로 전파됩니다.

use cisin_core::error::{BusError, CisinError, ConfigError, PipelineError, SbomError};

/// SBOM 서비스 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SbomServiceError {
    /// 레지스트리 요청 실패
    #[error("registry error: {0}")]
    Registry(String),

    /// SBOM 합성 도구 실패
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// 원격 SBOM 탐색 실패 — 생성 경로가 합성으로 폴백
    #[error("remote sbom unavailable: {0}")]
    RemoteSbom(String),

    /// 아티팩트 이름을 유도할 수 없음
    #[error("invalid artifact reference: {0}")]
    InvalidReference(String),

    /// 컨테이너 데몬 요청 실패
    #[error("container daemon error: {0}")]
    ContainerDaemon(String),

    /// SBOM 메시지 발행 실패
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

    /// 파일 I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SbomServiceError> for CisinError {
    fn from(err: SbomServiceError) -> Self {
        match err {
            SbomServiceError::Registry(msg) => CisinError::Sbom(SbomError::Registry(msg)),
            SbomServiceError::Synthesis(msg) => CisinError::Sbom(SbomError::Synthesis(msg)),
            SbomServiceError::RemoteSbom(msg) => CisinError::Sbom(SbomError::Synthesis(msg)),
            SbomServiceError::InvalidReference(msg) => {
                CisinError::Sbom(SbomError::InvalidReference(msg))
            }
            SbomServiceError::ContainerDaemon(msg) => {
                CisinError::Sbom(SbomError::ContainerDaemon(msg))
            }
            SbomServiceError::Publish(err) => CisinError::Bus(err),
            SbomServiceError::Config { field, reason } => {
                CisinError::Config(ConfigError::InvalidValue { field, reason })
            }
            SbomServiceError::Pipeline(err) => CisinError::Pipeline(err),
            SbomServiceError::Io(err) => CisinError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_display() {
        let err = SbomServiceError::Registry("connection refused".to_owned());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn converts_to_cisin_error() {
        let err: CisinError = SbomServiceError::InvalidReference("bad digest".to_owned()).into();
        assert!(matches!(
            err,
            CisinError::Sbom(SbomError::InvalidReference(_))
        ));

        let err: CisinError = SbomServiceError::Publish(BusError::Publish("closed".to_owned())).into();
        assert!(matches!(err, CisinError::Bus(_)));
    }
}
